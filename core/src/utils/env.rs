//! Validated access to environment variables.
//!
//! Passwords and client secrets are never accepted on the command line; they
//! are read from the environment through [`EnvUtils::secret_from_var`].

use crate::auth::{Secret, SecretKind};
use thiserror::Error;

/// Failures reading an environment variable.
#[derive(Debug, Error)]
pub enum EnvVarError {
    /// Environment variable is not set
    #[error(
        "Environment variable '{name}' not found. Please set this variable in your .env file or environment."
    )]
    NotFound { name: String },

    /// Environment variable contains invalid UTF-8 characters
    #[error(
        "Environment variable '{name}' contains invalid UTF-8 characters. Please check the value."
    )]
    InvalidUtf8 { name: String },

    /// Environment variable is set but contains only whitespace or is empty
    #[error("Environment variable '{name}' is empty. Please provide a valid value.")]
    Empty { name: String },
}

/// Reads credentials from environment variables.
///
/// # Examples
///
/// ```no_run
/// use tenantscope::auth::SecretKind;
/// use tenantscope::utils::EnvUtils;
///
/// let secret = EnvUtils::secret_from_var("AZURE_CLIENT_SECRET", SecretKind::ClientSecret)?;
/// assert_eq!(secret.kind(), SecretKind::ClientSecret);
/// # Ok::<(), tenantscope::utils::EnvVarError>(())
/// ```
pub struct EnvUtils;

impl EnvUtils {
    /// Reads a password or client secret.
    ///
    /// The value is not trimmed, since leading or trailing spaces may be part
    /// of a password, but a blank value is rejected.
    pub fn secret_from_var(name: &str, kind: SecretKind) -> Result<Secret, EnvVarError> {
        let value = Self::read_non_blank_var(name)?;

        Ok(match kind {
            SecretKind::Password => Secret::password(value),
            SecretKind::ClientSecret => Secret::client_secret(value),
        })
    }

    fn read_non_blank_var(name: &str) -> Result<String, EnvVarError> {
        match std::env::var(name) {
            Ok(value) if value.trim().is_empty() => Err(EnvVarError::Empty {
                name: name.to_string(),
            }),
            Ok(value) => Ok(value),
            Err(std::env::VarError::NotPresent) => Err(EnvVarError::NotFound {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(EnvVarError::InvalidUtf8 {
                name: name.to_string(),
            }),
        }
    }
}
