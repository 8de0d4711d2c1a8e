use super::types::{AccessToken, DeviceCodeInfo, PromptMode, Secret};
use crate::environment::AdConfiguration;
use crate::error::AuthError;
use async_trait::async_trait;

/// Source of Azure AD access tokens.
///
/// Implementations exchange an identity endpoint configuration, an optional
/// user id and an optional secret for a token. Failures are never retried
/// internally; the caller decides what to do next.
///
/// # Examples
///
/// ```no_run
/// use tenantscope::auth::{AccessToken, LoginKind, PromptMode, Secret, TokenProvider};
/// use tenantscope::environment::AdConfiguration;
/// use tenantscope::AuthError;
/// use async_trait::async_trait;
///
/// struct FixedTokenProvider;
///
/// #[async_trait]
/// impl TokenProvider for FixedTokenProvider {
///     async fn acquire(
///         &self,
///         config: &AdConfiguration,
///         _user_id: Option<&str>,
///         _secret: Option<&Secret>,
///         _mode: PromptMode,
///     ) -> Result<AccessToken, AuthError> {
///         Ok(AccessToken::new(
///             "example_token",
///             "user@contoso.com",
///             LoginKind::OrgId,
///             config.ad_domain.clone(),
///             chrono::Utc::now() + chrono::Duration::hours(1),
///         ))
///     }
/// }
/// ```
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquires a token for the tenant named in `config`.
    ///
    /// With [`PromptMode::CachedOnly`] the provider must not prompt and must
    /// fail with [`AuthError::NoCachedCredential`] when it holds nothing
    /// usable for `(config, user_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthenticationFailed`] if the identity provider
    /// rejects the credentials or cannot be reached.
    async fn acquire(
        &self,
        config: &AdConfiguration,
        user_id: Option<&str>,
        secret: Option<&Secret>,
        mode: PromptMode,
    ) -> Result<AccessToken, AuthError>;
}

/// Presents device code instructions to the user.
pub trait DeviceCodePrompt: Send + Sync {
    fn prompt(&self, info: &DeviceCodeInfo);
}

/// Prompt that writes the device code message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPrompt;

impl DeviceCodePrompt for LogPrompt {
    fn prompt(&self, info: &DeviceCodeInfo) {
        log::warn!("{}", info.message);
    }
}
