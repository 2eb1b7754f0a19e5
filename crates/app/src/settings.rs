use std::path::{Path, PathBuf};

use anonroom_llm::{DEFAULT_GEMINI_MODEL, ProviderConfig};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "anonroom";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Environment variable pointing at an alternative settings file.
pub const SETTINGS_PATH_ENV: &str = "ANONROOM_SETTINGS";
pub const ENV_PREFIX: &str = "ANONROOM_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default base URL when set.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: String::new(),
            model: default_model(),
            export_dir: None,
        }
    }
}

impl RoomSettings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".anonroom"))
    }

    pub fn default_config_path() -> PathBuf {
        std::env::var_os(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::default_config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn load() -> SettingsResult<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Layers defaults, the optional settings file and the environment.
    ///
    /// `ANONROOM_API_KEY` beats `GEMINI_API_KEY`, which beats `API_KEY`.
    pub fn load_from(path: &Path) -> SettingsResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(RoomSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!(path = ?path, "settings file not found, using defaults and environment");
        }

        let figment = figment
            .merge(Env::raw().only(&["API_KEY"]).map(|_| "api_key".into()))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "api_key".into()))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["SETTINGS"]));

        let settings = figment
            .extract::<RoomSettings>()
            .context(ExtractSnafu {
                stage: "extract-room-settings",
                path: path.to_path_buf(),
            })?
            .normalized();

        tracing::debug!(
            model = %settings.model,
            has_api_key = settings.is_configured(),
            "room settings loaded"
        );
        Ok(settings)
    }

    pub fn normalized(mut self) -> Self {
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = self.endpoint.trim().to_string();
        self.model = if self.model.trim().is_empty() {
            default_model()
        } else {
            self.model.trim().to_string()
        };
        self.export_dir = self
            .export_dir
            .filter(|path| !path.as_os_str().is_empty());
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(&self.api_key, &self.endpoint, &self.model)
    }

    /// Where `/save` writes when no directory is given.
    pub fn export_directory(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to load settings from {path:?} on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}
