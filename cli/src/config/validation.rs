use super::app::AppConfig;
use uuid::Uuid;

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid client_id: {configured}")]
    ClientId { configured: String },
    #[error("Invalid {field} for environment {environment}: {configured}")]
    EnvironmentEndpoint {
        environment: String,
        field: &'static str,
        configured: String,
    },
    #[error("Environment {name} is defined more than once")]
    DuplicateEnvironment { name: String },
    #[error("Profile entry {subscription_id} refers to unknown environment {environment}")]
    ProfileEnvironment {
        subscription_id: Uuid,
        environment: String,
    },
    #[error("Invalid logging level: {configured}")]
    LogLevel { configured: String },
}

impl ConfigValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigValidationError::ClientId { configured } => {
                format!(
                    "Client id is not a GUID!\n\n\
                    Your configured value: {configured}\n\n\
                    Please set client_id to the application (client) id registered in Azure AD."
                )
            }
            ConfigValidationError::EnvironmentEndpoint {
                environment,
                field,
                configured,
            } => {
                format!(
                    "Environment endpoint is not an absolute URL!\n\n\
                    Environment: {environment}\n\
                    Field: {field}\n\
                    Your configured value: {configured}\n\n\
                    Please use an http:// or https:// URL."
                )
            }
            ConfigValidationError::DuplicateEnvironment { name } => {
                format!(
                    "Environment {name} is defined more than once!\n\n\
                    Please keep a single [[environments]] entry per name."
                )
            }
            ConfigValidationError::ProfileEnvironment {
                subscription_id,
                environment,
            } => {
                format!(
                    "Profile entry refers to an unknown environment!\n\n\
                    Subscription: {subscription_id}\n\
                    Environment: {environment}\n\n\
                    Please add the environment to [[environments]] or fix the profile entry."
                )
            }
            ConfigValidationError::LogLevel { configured } => {
                format!(
                    "Unknown logging level!\n\n\
                    Your configured value: {configured}\n\
                    Valid values: trace, debug, info, warn, error\n\n\
                    Please update [logging] level in your config file."
                )
            }
        }
    }
}

/// Configuration loading result
#[derive(Debug)]
pub enum ConfigLoadResult {
    Success(Box<AppConfig>),
    LoadError(String),
    DeserializeError(String),
    ValidationError(String),
}

impl ConfigLoadResult {
    pub fn into_result(self) -> anyhow::Result<AppConfig> {
        match self {
            ConfigLoadResult::Success(config) => Ok(*config),
            ConfigLoadResult::LoadError(message)
            | ConfigLoadResult::DeserializeError(message)
            | ConfigLoadResult::ValidationError(message) => Err(anyhow::anyhow!(message)),
        }
    }
}
