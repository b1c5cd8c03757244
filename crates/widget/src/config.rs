use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{
    CreateConfigDirSnafu, ExtractConfigSnafu, RenameConfigSnafu, SerializeConfigSnafu,
    WidgetResult, WriteConfigSnafu,
};

pub const DEFAULT_COMPANY_NAME: &str = "ChatSaaS";
pub const DEFAULT_PRIMARY_COLOR: &str = "#3b82f6";
pub const DEFAULT_WELCOME_MESSAGE: &str = "Olá! Como podemos ajudar você hoje?";
pub const DEFAULT_REPLY_MESSAGE: &str =
    "Obrigado por sua mensagem! Um agente entrará em contato em breve.";
pub const DEFAULT_SENT_AFTER_MS: u64 = 500;
pub const DEFAULT_DELIVERED_AFTER_MS: u64 = 1_000;
pub const DEFAULT_REPLY_AFTER_MS: u64 = 2_000;

pub const CONFIG_DIRECTORY_NAME: &str = "chatsaas";
pub const CONFIG_FILE_NAME: &str = "widget.json";
pub const ENV_PREFIX: &str = "CHATSAAS_WIDGET_";

/// Screen corner the bubble and panel are anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    #[default]
    BottomRight,
    BottomLeft,
}

impl WidgetPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
        }
    }
}

/// Delays of the simulated agent side, relative to the user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetTimings {
    pub sent_after_ms: u64,
    pub delivered_after_ms: u64,
    pub reply_after_ms: u64,
}

impl Default for WidgetTimings {
    fn default() -> Self {
        Self {
            sent_after_ms: DEFAULT_SENT_AFTER_MS,
            delivered_after_ms: DEFAULT_DELIVERED_AFTER_MS,
            reply_after_ms: DEFAULT_REPLY_AFTER_MS,
        }
    }
}

impl WidgetTimings {
    pub fn sent_after(&self) -> Duration {
        Duration::from_millis(self.sent_after_ms)
    }

    pub fn delivered_after(&self) -> Duration {
        Duration::from_millis(self.delivered_after_ms)
    }

    pub fn reply_after(&self) -> Duration {
        Duration::from_millis(self.reply_after_ms)
    }

    fn normalized(mut self) -> Self {
        // Delivered can never be observed before sent.
        self.delivered_after_ms = self.delivered_after_ms.max(self.sent_after_ms);
        self
    }
}

/// Options supplied by the hosting page when mounting the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub company_name: String,
    pub primary_color: String,
    /// First agent message after the pre-chat gate; `{name}` is replaced by the visitor's name.
    pub welcome_message: String,
    pub position: WidgetPosition,
    pub reply_message: String,
    pub timings: WidgetTimings,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            position: WidgetPosition::default(),
            reply_message: DEFAULT_REPLY_MESSAGE.to_string(),
            timings: WidgetTimings::default(),
        }
    }
}

impl WidgetConfig {
    pub fn with_company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = company_name.into();
        self
    }

    pub fn with_primary_color(mut self, primary_color: impl Into<String>) -> Self {
        self.primary_color = primary_color.into();
        self
    }

    pub fn with_welcome_message(mut self, welcome_message: impl Into<String>) -> Self {
        self.welcome_message = welcome_message.into();
        self
    }

    pub fn with_position(mut self, position: WidgetPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_timings(mut self, timings: WidgetTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Trims text fields and restores defaults for anything left blank.
    pub fn normalized(mut self) -> Self {
        self.company_name = non_blank_or(self.company_name, DEFAULT_COMPANY_NAME);
        self.primary_color = non_blank_or(self.primary_color, DEFAULT_PRIMARY_COLOR);
        self.welcome_message = non_blank_or(self.welcome_message, DEFAULT_WELCOME_MESSAGE);
        self.reply_message = non_blank_or(self.reply_message, DEFAULT_REPLY_MESSAGE);
        self.timings = self.timings.normalized();
        self
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(CONFIG_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".chatsaas"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE_NAME)
    }

    /// Layers defaults, the JSON file at `path` (if present) and `CHATSAAS_WIDGET_*` env vars.
    ///
    /// Nested keys use a double underscore, e.g. `CHATSAAS_WIDGET_TIMINGS__REPLY_AFTER_MS`.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: &Path) -> WidgetResult<Self> {
        let config = Self::figment(path)
            .extract::<Self>()
            .context(ExtractConfigSnafu {
                stage: "extract-widget-config",
            })?;
        Ok(config.normalized())
    }

    /// Like [`WidgetConfig::load`], but a broken file never keeps the widget from mounting.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("widget config not found at {:?}, using defaults", path);
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!("{}. using default widget config", error);
                Self::default()
            }
        }
    }

    pub fn persist(&self, path: &Path) -> WidgetResult<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(CreateConfigDirSnafu {
                stage: "create-config-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(self).context(SerializeConfigSnafu {
            stage: "serialize-widget-config",
        })?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteConfigSnafu {
            stage: "write-temporary-config-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, path).context(RenameConfigSnafu {
            stage: "rename-temporary-config-file",
            from: temp_path,
            to: path.to_path_buf(),
        })?;

        tracing::info!("saved widget config to {:?}", path);
        Ok(())
    }
}

fn non_blank_or(value: String, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
