use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Class of authenticated principal.
///
/// The two kinds differ in how far one token reaches: an organizational
/// token issued for the common tenant is accepted by every tenant of that
/// account, while a Microsoft account (Live ID) token has to be reissued for
/// each tenant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoginKind {
    /// Consumer Microsoft account; tokens are valid per tenant only
    LiveId,
    /// Work or school account, or a service principal
    OrgId,
}

/// Token that authorizes a subscription discovered for a principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenScope {
    /// A token issued for the subscription's own tenant
    Tenant,
    /// The common-tenant token obtained at sign-in
    Common,
}

impl LoginKind {
    pub fn cached_token_scope(self) -> TokenScope {
        match self {
            LoginKind::LiveId => TokenScope::Tenant,
            LoginKind::OrgId => TokenScope::Common,
        }
    }
}

/// Picks the token to cache for a subscription found with `tenant_token`.
///
/// Live ID principals keep the tenant-scoped token; organizational principals
/// reuse the common-tenant token, which already covers every tenant.
pub fn cached_token_for(
    common_token: &Arc<AccessToken>,
    tenant_token: &Arc<AccessToken>,
) -> Arc<AccessToken> {
    match common_token.login_kind.cached_token_scope() {
        TokenScope::Tenant => Arc::clone(tenant_token),
        TokenScope::Common => Arc::clone(common_token),
    }
}

/// Whether a token request may interact with the user.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// May prompt (device code) or use a supplied secret
    Interactive,
    /// Must not prompt; only previously obtained tokens are used
    CachedOnly,
}

/// Bearer token issued by Azure Active Directory.
///
/// The raw token string is wiped from memory on drop and never printed by
/// `Debug`.
#[derive(Clone)]
pub struct AccessToken {
    token: Zeroizing<String>,
    /// Signed-in user (UPN or e-mail), or application id for service principals
    pub user_id: String,
    pub login_kind: LoginKind,
    /// Tenant that issued the token
    pub tenant_id: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        login_kind: LoginKind,
        tenant_id: impl Into<String>,
        expires_on: DateTime<Utc>,
    ) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            user_id: user_id.into(),
            login_kind,
            tenant_id: tenant_id.into(),
            expires_on,
        }
    }

    /// The raw bearer token.
    pub fn secret(&self) -> &str {
        &self.token
    }

    /// Value for an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.secret())
    }

    /// Checks if the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_on
    }

    /// Checks if the token should be renewed soon.
    ///
    /// Uses a 5-minute buffer before expiration.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::minutes(5) >= self.expires_on
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        *self.token == *other.token
            && self.user_id == other.user_id
            && self.login_kind == other.login_kind
            && self.tenant_id == other.tenant_id
    }
}

impl Eq for AccessToken {}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("login_kind", &self.login_kind)
            .field("tenant_id", &self.tenant_id)
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// What a [`Secret`] authenticates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretKind {
    /// User password, exchanged with the resource owner password grant
    Password,
    /// Application secret, exchanged with the client credentials grant;
    /// the user id is then the application (client) id
    ClientSecret,
}

/// Password or client secret supplied for non-prompting interactive logins.
#[derive(Clone)]
pub struct Secret {
    kind: SecretKind,
    value: Zeroizing<String>,
}

impl Secret {
    pub fn password(value: impl Into<String>) -> Self {
        Self {
            kind: SecretKind::Password,
            value: Zeroizing::new(value.into()),
        }
    }

    pub fn client_secret(value: impl Into<String>) -> Self {
        Self {
            kind: SecretKind::ClientSecret,
            value: Zeroizing::new(value.into()),
        }
    }

    pub fn kind(&self) -> SecretKind {
        self.kind
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Information required for Azure AD Device Code Flow authentication.
///
/// Contains the user code and verification URL that the user needs to
/// complete the device code authentication flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceCodeInfo {
    /// The user code to be entered on the verification page
    pub user_code: String,
    /// The URL where the user should enter the code
    pub verification_uri: String,
    /// Human-readable message with authentication instructions
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str, kind: LoginKind, tenant: &str) -> Arc<AccessToken> {
        Arc::new(AccessToken::new(
            value,
            "user@contoso.com",
            kind,
            tenant,
            Utc::now() + Duration::hours(1),
        ))
    }

    #[test]
    fn test_cached_token_scope_by_login_kind() {
        assert_eq!(LoginKind::LiveId.cached_token_scope(), TokenScope::Tenant);
        assert_eq!(LoginKind::OrgId.cached_token_scope(), TokenScope::Common);
    }

    #[test]
    fn test_live_id_caches_tenant_token() {
        let common = token("common", LoginKind::LiveId, "common");
        let tenant = token("tenant", LoginKind::LiveId, "t1");
        assert_eq!(cached_token_for(&common, &tenant).secret(), "tenant");
    }

    #[test]
    fn test_org_id_caches_common_token() {
        let common = token("common", LoginKind::OrgId, "common");
        let tenant = token("tenant", LoginKind::OrgId, "t1");
        assert!(Arc::ptr_eq(&cached_token_for(&common, &tenant), &common));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let access = token("super-secret-token", LoginKind::OrgId, "t1");
        assert!(!format!("{access:?}").contains("super-secret-token"));

        let secret = Secret::password("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_refresh_buffer() {
        let soon = AccessToken::new(
            "t",
            "u",
            LoginKind::OrgId,
            "t1",
            Utc::now() + Duration::minutes(2),
        );
        assert!(!soon.is_expired());
        assert!(soon.needs_refresh());
    }
}
