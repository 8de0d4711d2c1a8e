use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub mod app;
pub mod validation;

pub use app::AppConfig;
pub use validation::{ConfigLoadResult, ConfigValidationError};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prefix of environment variables that override file values,
/// e.g. `TENANTSCOPE__LOGGING__LEVEL=debug`.
const ENV_PREFIX: &str = "TENANTSCOPE";

/// Loads the configuration from `path` (or [`DEFAULT_CONFIG_FILE`]) layered
/// with environment variables, then validates it.
///
/// An explicitly named file must exist; the default file is optional.
pub fn load_config(path: Option<&str>) -> ConfigLoadResult {
    dotenv::dotenv().ok();

    let file_source = File::new(path.unwrap_or(DEFAULT_CONFIG_FILE), FileFormat::Toml)
        .required(path.is_some());
    let env_source = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__");

    let config = match Config::builder()
        .add_source(file_source)
        .add_source(env_source) // environment entries override file values
        .build()
    {
        Ok(config) => config,
        Err(e) => {
            return ConfigLoadResult::LoadError(format!(
                "Configuration loading failed: {e}. Please check your config file and environment variables."
            ));
        }
    };

    let app_config = match config.try_deserialize::<AppConfig>() {
        Ok(app_config) => app_config,
        Err(e) => {
            return ConfigLoadResult::DeserializeError(format!("Failed to deserialize config: {e}"));
        }
    };

    if let Err(validation_errors) = app_config.validate() {
        let error_messages: Vec<String> =
            validation_errors.iter().map(|e| e.user_message()).collect();
        return ConfigLoadResult::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages.join("\n\n")
        ));
    }

    ConfigLoadResult::Success(Box::new(app_config))
}

/// Logging configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("warn")
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref().filter(|f| !f.trim().is_empty())
    }
}
