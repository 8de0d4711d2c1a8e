use super::claims::IdentityClaims;
use super::provider::{DeviceCodePrompt, LogPrompt, TokenProvider};
use super::token_cache::{TokenKey, TokenStore};
use super::types::{AccessToken, DeviceCodeInfo, LoginKind, PromptMode, Secret, SecretKind};
use crate::environment::AdConfiguration;
use crate::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Well-known public client id of the Azure PowerShell application.
pub const DEFAULT_CLIENT_ID: &str = "1950a258-227b-4e31-a9cf-717495945fc2";

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Error codes meaning the stored session can no longer be renewed silently.
const SESSION_EXPIRED_ERRORS: [&str; 4] = [
    "invalid_grant",
    "interaction_required",
    "login_required",
    "consent_required",
];

#[derive(Clone, Debug)]
pub struct DeviceCodeFlowInfo {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
    pub message: String,
}

/// Token provider backed by the Azure AD v1 OAuth2 endpoints.
///
/// Interactive acquisition tries, in order: a stored token, the supplied
/// secret (password or client credentials grant), a stored refresh token and
/// finally the device code flow. Cached-only acquisition stops after the
/// refresh token and never calls the device code endpoint.
#[derive(Clone)]
pub struct AzureAdTokenProvider {
    client_id: String,
    service_principal_tenant: Option<String>,
    http_client: reqwest::Client,
    store: TokenStore,
    prompt: Arc<dyn DeviceCodePrompt>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in", deserialize_with = "seconds")]
    expires_in: u64,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    #[serde(alias = "verification_uri")]
    verification_url: String,
    #[serde(deserialize_with = "seconds")]
    expires_in: u64,
    #[serde(default = "default_interval", deserialize_with = "seconds")]
    interval: u64,
    message: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl ErrorResponse {
    fn session_expired(&self) -> bool {
        SESSION_EXPIRED_ERRORS.contains(&self.error.as_str())
    }

    fn into_auth_error(self) -> AuthError {
        let user_friendly_message = match self.error.as_str() {
            "invalid_grant" => {
                "The user name, password or refresh token is invalid or has expired."
            }
            "invalid_client" => {
                "Invalid client configuration. Please check the client id and secret."
            }
            "unauthorized_client" => {
                "This application is not authorized for the requested grant. Please check Azure AD configuration."
            }
            "interaction_required" => {
                "Interactive sign-in is required (multi-factor authentication or consent)."
            }
            "access_denied" => "Access denied. Please ensure you have the necessary permissions.",
            _ => self.error_description.as_deref().unwrap_or(&self.error),
        };

        AuthError::AuthenticationFailed(user_friendly_message.to_string())
    }
}

// v1 endpoints report durations as strings ("3599"), v2 as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

fn seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Seconds::deserialize(deserializer)? {
        Seconds::Number(value) => Ok(value),
        Seconds::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn default_expires_in() -> u64 {
    3600
}

fn default_interval() -> u64 {
    5
}

impl AzureAdTokenProvider {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            service_principal_tenant: None,
            http_client: reqwest::Client::new(),
            store: TokenStore::new(),
            prompt: Arc::new(LogPrompt),
        }
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn DeviceCodePrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Tenant used for client credentials requests aimed at the common tenant,
    /// which Azure AD does not accept for service principals.
    pub fn with_service_principal_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.service_principal_tenant = Some(tenant_id.into());
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Tokens issued so far; shared by clones of this provider.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    async fn acquire_with_secret(
        &self,
        config: &AdConfiguration,
        user_id: Option<&str>,
        secret: &Secret,
    ) -> Result<AccessToken, AuthError> {
        let user_id = user_id.ok_or_else(|| {
            AuthError::Configuration(
                "A user id (or application id) is required when a secret is supplied".to_string(),
            )
        })?;

        match secret.kind() {
            SecretKind::Password => {
                log::debug!("Requesting token with password grant for tenant {}", config.ad_domain);
                let params = [
                    ("grant_type", "password"),
                    ("client_id", self.client_id.as_str()),
                    ("resource", config.resource_client_uri.as_str()),
                    ("username", user_id),
                    ("password", secret.expose()),
                ];
                self.request_token(config, &params, Some(user_id)).await
            }
            SecretKind::ClientSecret => {
                let config = self.service_principal_config(config)?;
                log::debug!(
                    "Requesting token with client credentials grant for tenant {}",
                    config.ad_domain
                );
                let params = [
                    ("grant_type", "client_credentials"),
                    ("client_id", user_id),
                    ("client_secret", secret.expose()),
                    ("resource", config.resource_client_uri.as_str()),
                ];
                let mut token = self.request_token(&config, &params, Some(user_id)).await?;
                token.user_id = user_id.to_string();
                token.login_kind = LoginKind::OrgId;
                Ok(token)
            }
        }
    }

    fn service_principal_config(
        &self,
        config: &AdConfiguration,
    ) -> Result<AdConfiguration, AuthError> {
        if !config.is_common_tenant() {
            return Ok(config.clone());
        }
        let tenant = self.service_principal_tenant.as_deref().ok_or_else(|| {
            AuthError::Configuration(
                "Service principal login requires a tenant id; the common tenant is not accepted"
                    .to_string(),
            )
        })?;
        Ok(AdConfiguration {
            ad_domain: tenant.to_string(),
            ..config.clone()
        })
    }

    /// Redeems a stored refresh token for the requested tenant, if one exists.
    async fn redeem_refresh_token(
        &self,
        config: &AdConfiguration,
        user_id: Option<&str>,
    ) -> Result<Option<AccessToken>, AuthError> {
        let Some((stored_user, refresh_token)) =
            self.store.refresh_token(&config.ad_endpoint, user_id).await
        else {
            return Ok(None);
        };

        log::debug!("Redeeming refresh token for tenant {}", config.ad_domain);
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("resource", config.resource_client_uri.as_str()),
        ];
        let response = self.send_token_request(config, &params).await?;

        if !response.status().is_success() {
            let rejection = Self::read_error(response).await;
            if rejection.session_expired() {
                log::debug!(
                    "Refresh token rejected for tenant {}: {}",
                    config.ad_domain,
                    rejection.error
                );
                return Err(AuthError::NoCachedCredential {
                    tenant: config.ad_domain.clone(),
                    user: stored_user,
                });
            }
            return Err(rejection.into_auth_error());
        }

        self.store_token_response(config, response, Some(&stored_user))
            .await
            .map(Some)
    }

    async fn device_code_flow(&self, config: &AdConfiguration) -> Result<AccessToken, AuthError> {
        let device_info = self.start_device_code_flow(config).await?;

        self.prompt.prompt(&DeviceCodeInfo {
            user_code: device_info.user_code.clone(),
            verification_uri: device_info.verification_uri.clone(),
            message: device_info.message.clone(),
        });
        log::info!("Device code authentication initiated - awaiting user action");

        self.poll_device_code_token(config, &device_info).await
    }

    pub async fn start_device_code_flow(
        &self,
        config: &AdConfiguration,
    ) -> Result<DeviceCodeFlowInfo, AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("resource", config.resource_client_uri.as_str()),
        ];

        let device_response = self
            .http_client
            .post(config.device_code_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                AuthError::AuthenticationFailed(format!("Failed to initiate device code flow: {e}"))
            })?;

        if !device_response.status().is_success() {
            return Err(Self::error_from_response(device_response).await);
        }

        let device_code: DeviceCodeResponse = device_response.json().await.map_err(|e| {
            AuthError::AuthenticationFailed(format!("Failed to parse device code response: {e}"))
        })?;

        Ok(DeviceCodeFlowInfo {
            device_code: device_code.device_code,
            user_code: device_code.user_code,
            verification_uri: device_code.verification_url,
            expires_in: device_code.expires_in,
            interval: device_code.interval,
            message: device_code.message,
        })
    }

    pub async fn poll_device_code_token(
        &self,
        config: &AdConfiguration,
        device_info: &DeviceCodeFlowInfo,
    ) -> Result<AccessToken, AuthError> {
        let mut interval = poll_interval(device_info.interval);
        let timeout = Duration::from_secs(device_info.expires_in);
        let start = Instant::now();

        loop {
            if start.elapsed() > timeout {
                return Err(AuthError::AuthenticationFailed(
                    "Authentication timed out. The device code has expired.".to_string(),
                ));
            }

            tokio::time::sleep(interval).await;

            let params = [
                ("grant_type", "device_code"),
                ("client_id", self.client_id.as_str()),
                ("code", device_info.device_code.as_str()),
                ("resource", config.resource_client_uri.as_str()),
            ];

            let response = self
                .http_client
                .post(config.token_endpoint())
                .form(&params)
                .send()
                .await
                .map_err(|e| {
                    AuthError::AuthenticationFailed(format!("Failed to poll for token: {e}"))
                })?;

            if response.status().is_success() {
                return self.store_token_response(config, response, None).await;
            }

            let error_response: serde_json::Value = response.json().await.unwrap_or_default();

            match error_response["error"].as_str() {
                Some("authorization_pending") => {
                    log::debug!("Waiting for user to complete authentication");
                }
                Some("slow_down") => {
                    log::debug!("Polling too frequently, increasing interval");
                    interval += Duration::from_secs(5);
                }
                Some("expired_token") | Some("code_expired") => {
                    return Err(AuthError::AuthenticationFailed(
                        "The device code has expired. Please restart the authentication process."
                            .to_string(),
                    ));
                }
                Some("access_denied") | Some("authorization_declined") => {
                    return Err(AuthError::AuthenticationFailed(
                        "Access was denied by the user.".to_string(),
                    ));
                }
                Some(error) => {
                    let error_desc = error_response["error_description"]
                        .as_str()
                        .unwrap_or("Unknown error occurred");
                    return Err(AuthError::AuthenticationFailed(format!(
                        "{error} - {error_desc}"
                    )));
                }
                None => {
                    return Err(AuthError::AuthenticationFailed(
                        "Unexpected response while polling for device code token".to_string(),
                    ));
                }
            }
        }
    }

    async fn request_token(
        &self,
        config: &AdConfiguration,
        params: &[(&str, &str)],
        requested_user: Option<&str>,
    ) -> Result<AccessToken, AuthError> {
        let response = self.send_token_request(config, params).await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        self.store_token_response(config, response, requested_user)
            .await
    }

    async fn send_token_request(
        &self,
        config: &AdConfiguration,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, AuthError> {
        self.http_client
            .post(config.token_endpoint())
            .form(params)
            .send()
            .await
            .map_err(|e| {
                AuthError::AuthenticationFailed(format!(
                    "Token request to {} failed: {e}",
                    config.authority()
                ))
            })
    }

    async fn store_token_response(
        &self,
        config: &AdConfiguration,
        response: reqwest::Response,
        requested_user: Option<&str>,
    ) -> Result<AccessToken, AuthError> {
        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::AuthenticationFailed(format!("Failed to parse token response: {e}"))
        })?;

        let claims = token_response
            .id_token
            .as_deref()
            .and_then(IdentityClaims::decode)
            .or_else(|| IdentityClaims::decode(&token_response.access_token))
            .unwrap_or_default();

        let user_id = claims
            .user_id()
            .or_else(|| requested_user.map(str::to_string))
            .ok_or_else(|| {
                AuthError::AuthenticationFailed(
                    "Token response does not identify the signed-in user".to_string(),
                )
            })?;
        let tenant_id = claims.tid.clone().unwrap_or_else(|| config.ad_domain.clone());
        let expires_on = expires_at(Utc::now(), token_response.expires_in)?;

        let token = AccessToken::new(
            token_response.access_token,
            user_id.clone(),
            claims.login_kind(),
            tenant_id,
            expires_on,
        );

        self.store
            .insert(
                TokenKey {
                    authority: config.authority(),
                    resource: config.resource_client_uri.clone(),
                    user_id,
                },
                token.clone(),
                token_response.refresh_token,
            )
            .await;

        Ok(token)
    }

    async fn read_error(response: reqwest::Response) -> ErrorResponse {
        let status = response.status();
        response
            .json::<ErrorResponse>()
            .await
            .unwrap_or(ErrorResponse {
                error: "unknown_error".to_string(),
                error_description: Some(format!("HTTP {status} without error details")),
            })
    }

    async fn error_from_response(response: reqwest::Response) -> AuthError {
        Self::read_error(response).await.into_auth_error()
    }
}

/// Expiry instant for a token issued at `issued_at` and valid for `expires_in` seconds.
fn expires_at(issued_at: DateTime<Utc>, expires_in: u64) -> Result<DateTime<Utc>, AuthError> {
    i64::try_from(expires_in)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::AuthenticationFailed(format!(
                "Token lifetime of {expires_in} seconds is out of range"
            ))
        })
}

fn poll_interval(seconds: u64) -> Duration {
    Duration::from_secs(seconds).max(MIN_POLL_INTERVAL)
}

#[async_trait]
impl TokenProvider for AzureAdTokenProvider {
    async fn acquire(
        &self,
        config: &AdConfiguration,
        user_id: Option<&str>,
        secret: Option<&Secret>,
        mode: PromptMode,
    ) -> Result<AccessToken, AuthError> {
        if let Some(token) = self
            .store
            .get(&config.authority(), &config.resource_client_uri, user_id)
            .await
        {
            log::debug!("Using stored token for tenant {}", config.ad_domain);
            return Ok(token);
        }

        match mode {
            PromptMode::CachedOnly => self
                .redeem_refresh_token(config, user_id)
                .await?
                .ok_or_else(|| AuthError::NoCachedCredential {
                    tenant: config.ad_domain.clone(),
                    user: user_id.unwrap_or("<any>").to_string(),
                }),
            PromptMode::Interactive => {
                if let Some(secret) = secret {
                    return self.acquire_with_secret(config, user_id, secret).await;
                }
                match self.redeem_refresh_token(config, user_id).await {
                    Ok(Some(token)) => return Ok(token),
                    Ok(None) => {}
                    Err(e) => log::debug!("Silent token renewal failed, prompting instead: {e}"),
                }
                self.device_code_flow(config).await
            }
        }
    }
}
