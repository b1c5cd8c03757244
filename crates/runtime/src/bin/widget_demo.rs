use std::env;
use std::path::PathBuf;
use std::time::Duration;

use snafu::{OptionExt, ResultExt, Snafu};
use tokio::sync::broadcast::{self, error::RecvError};

use chatsaas_widget::{
    DEFAULT_SCRIPT_URL, DispatchResult, PreChatForm, WidgetChange, WidgetConfig, WidgetError,
    WidgetEvent, render_snippet,
};
use chatsaas_widget_runtime::{RuntimeError, WidgetHandle};

#[derive(Debug, Clone)]
struct DemoArgs {
    config_path: PathBuf,
    script_url: String,
    visitor_name: String,
    visitor_email: String,
}

#[derive(Debug, Snafu)]
enum DemoError {
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("widget runtime failed: {source}"))]
    Runtime {
        stage: &'static str,
        source: RuntimeError,
    },
    #[snafu(display("widget configuration failed: {source}"))]
    Widget {
        stage: &'static str,
        source: WidgetError,
    },
    #[snafu(display("failed to serialize snapshot: {source}"))]
    SerializeSnapshot {
        stage: &'static str,
        source: serde_json::Error,
    },
}

type DemoResult<T> = Result<T, DemoError>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = run().await {
        eprintln!("widget_demo_error={error}");
        std::process::exit(1);
    }
}

async fn run() -> DemoResult<()> {
    let args = parse_args(env::args().skip(1))?;
    let config = WidgetConfig::load_or_default(&args.config_path);
    println!("config_path={}", args.config_path.display());

    let mut widget = WidgetHandle::spawn(config.clone());
    let changes = widget.subscribe();
    let change_logger = tokio::spawn(log_changes(changes));

    step(&widget, "open", WidgetEvent::BubbleClicked).await?;
    step(
        &widget,
        "pre-chat",
        WidgetEvent::PreChatSubmitted(
            PreChatForm::new(&args.visitor_name, &args.visitor_email)
                .with_message("Quero conhecer os planos"),
        ),
    )
    .await?;
    step(
        &widget,
        "type",
        WidgetEvent::ComposerChanged("Oi".to_string()),
    )
    .await?;
    step(&widget, "send", WidgetEvent::EnterPressed { shift: false }).await?;

    let reply_after = config.timings.reply_after();
    tokio::time::sleep(reply_after + Duration::from_millis(100)).await;

    step(
        &widget,
        "type",
        WidgetEvent::ComposerChanged("Vocês têm plano anual?".to_string()),
    )
    .await?;
    step(&widget, "send", WidgetEvent::SendClicked).await?;
    step(&widget, "close", WidgetEvent::CloseClicked).await?;
    tokio::time::sleep(reply_after + Duration::from_millis(100)).await;

    if let Some(preview) = widget.preview().await.context(RuntimeSnafu {
        stage: "read-preview",
    })? {
        println!(
            "preview unread={} text={:?}",
            preview.unread_count, preview.last_agent_text
        );
    }
    step(&widget, "reopen", WidgetEvent::BubbleClicked).await?;

    let snapshot = widget.snapshot().await.context(RuntimeSnafu {
        stage: "read-snapshot",
    })?;
    let rendered = serde_json::to_string_pretty(&snapshot).context(SerializeSnapshotSnafu {
        stage: "render-snapshot",
    })?;
    println!("{rendered}");

    let snippet = render_snippet(&config, &args.script_url).context(WidgetSnafu {
        stage: "render-embed-snippet",
    })?;
    println!("{snippet}");

    let cancelled = widget.unmount().await.context(RuntimeSnafu {
        stage: "unmount-widget",
    })?;
    println!("unmounted cancelled_tasks={cancelled}");

    drop(widget);
    if let Err(error) = change_logger.await {
        tracing::warn!(%error, "change logger task failed");
    }
    Ok(())
}

async fn step(widget: &WidgetHandle, label: &str, event: WidgetEvent) -> DemoResult<()> {
    let outcome: DispatchResult = widget.dispatch(event).await.context(RuntimeSnafu {
        stage: "dispatch-demo-event",
    })?;
    match outcome {
        Ok(applied) => println!("{label}: {applied:?}"),
        Err(rejection) => println!("{label}: declined {rejection:?}"),
    }
    Ok(())
}

async fn log_changes(mut changes: broadcast::Receiver<WidgetChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => tracing::info!(?change, "widget change"),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "change log fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> DemoResult<DemoArgs> {
    let mut parsed = DemoArgs {
        config_path: WidgetConfig::default_config_path(),
        script_url: DEFAULT_SCRIPT_URL.to_string(),
        visitor_name: "Ana".to_string(),
        visitor_email: "ana@x.com".to_string(),
    };
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--config" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-config-value",
                    arg: "--config",
                })?;
                parsed.config_path = PathBuf::from(value);
            }
            "--script-url" => {
                parsed.script_url = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-script-url-value",
                    arg: "--script-url",
                })?;
            }
            "--name" => {
                parsed.visitor_name = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-name-value",
                    arg: "--name",
                })?;
            }
            "--email" => {
                parsed.visitor_email = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-email-value",
                    arg: "--email",
                })?;
            }
            _ => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: argument,
                }
                .fail();
            }
        }
    }

    Ok(parsed)
}
