use serde::Serialize;
use snafu::ResultExt;

use crate::config::WidgetConfig;
use crate::error::{SerializeConfigSnafu, WidgetResult};

pub const DEFAULT_SCRIPT_URL: &str = "https://widget.chatsaas.com/widget.js";
/// Name of the global loader function the snippet installs on `window`.
pub const LOADER_GLOBAL: &str = "chatsaas";

/// Options passed to the loader's `init` call, in the shape the browser script expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedOptions<'a> {
    pub company_name: &'a str,
    pub primary_color: &'a str,
    pub welcome_message: &'a str,
    pub position: &'static str,
}

impl<'a> From<&'a WidgetConfig> for EmbedOptions<'a> {
    fn from(config: &'a WidgetConfig) -> Self {
        Self {
            company_name: &config.company_name,
            primary_color: &config.primary_color,
            welcome_message: &config.welcome_message,
            position: config.position.as_str(),
        }
    }
}

/// Renders the `<script>` block a site owner pastes into their page.
///
/// Option values and the script URL are JSON encoded, so quotes cannot break out of the call,
/// and `</` is escaped so no value can close the surrounding script element.
pub fn render_snippet(config: &WidgetConfig, script_url: &str) -> WidgetResult<String> {
    let options = serde_json::to_string_pretty(&EmbedOptions::from(config)).context(
        SerializeConfigSnafu {
            stage: "serialize-embed-options",
        },
    )?;
    let script_url = serde_json::to_string(script_url).context(SerializeConfigSnafu {
        stage: "serialize-embed-script-url",
    })?;
    let script_url = escape_script_close(&script_url);
    let options = escape_script_close(&options).replace('\n', "\n  ");

    Ok(format!(
        r#"<script>
  (function(w, d, s, o, f, js, fjs) {{
    w['ChatSaaS-Widget'] = o;
    w[o] = w[o] || function() {{
      (w[o].q = w[o].q || []).push(arguments);
    }};
    js = d.createElement(s);
    fjs = d.getElementsByTagName(s)[0];
    js.id = o;
    js.src = f;
    js.async = 1;
    fjs.parentNode.insertBefore(js, fjs);
  }})(window, document, 'script', '{LOADER_GLOBAL}', {script_url});

  {LOADER_GLOBAL}('init', {options});
</script>"#
    ))
}

// `</` inside a JSON string would still close the surrounding script element.
fn escape_script_close(json: &str) -> String {
    json.replace("</", "<\\/")
}
