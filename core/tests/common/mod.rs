//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tenantscope::AuthError;
use tenantscope::auth::{AccessToken, LoginKind, PromptMode, Secret, TokenProvider};
use tenantscope::environment::{AdConfiguration, AzureEnvironment};
use wiremock::MockServer;

pub const USER: &str = "user@contoso.com";
pub const TENANT_1: &str = "a1b2c3d4-0000-0000-0000-000000000001";
pub const TENANT_2: &str = "a1b2c3d4-0000-0000-0000-000000000002";
pub const SUB_1: &str = "6a3e5c6b-0d1f-4b4e-9a43-3a4d9c1e2f01";
pub const SUB_2: &str = "6a3e5c6b-0d1f-4b4e-9a43-3a4d9c1e2f02";
pub const SUB_3: &str = "6a3e5c6b-0d1f-4b4e-9a43-3a4d9c1e2f03";
pub const SUB_4: &str = "6a3e5c6b-0d1f-4b4e-9a43-3a4d9c1e2f04";
pub const MANAGEMENT_RESOURCE: &str = "https://management.core.windows.net/";

/// Environment whose endpoints all point at the mock server.
pub fn mock_environment(server: &MockServer) -> AzureEnvironment {
    AzureEnvironment {
        name: "MockCloud".to_string(),
        active_directory_endpoint: format!("{}/ad/", server.uri()),
        active_directory_service_endpoint_resource_id: MANAGEMENT_RESOURCE.to_string(),
        resource_manager_endpoint: format!("{}/arm/", server.uri()),
        service_endpoint: format!("{}/classic/", server.uri()),
    }
}

/// Unsigned JWT carrying `claims`.
pub fn fake_jwt(claims: serde_json::Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Bearer value issued by [`RecordingTokenProvider`] for a tenant.
pub fn bearer_for(tenant: &str) -> String {
    format!("Bearer token-{tenant}")
}

pub fn resource_manager_page(entries: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "value": entries })
}

pub fn classic_listing(entries: &[(&str, &str, Option<&str>)]) -> String {
    let mut body = String::from(
        r#"<Subscriptions xmlns="http://schemas.microsoft.com/windowsazure" xmlns:i="http://www.w3.org/2001/XMLSchema-instance">"#,
    );
    for (id, name, tenant) in entries {
        body.push_str(&format!(
            "<Subscription><SubscriptionID>{id}</SubscriptionID><SubscriptionName>{name}</SubscriptionName><SubscriptionStatus>Active</SubscriptionStatus><ActiveDirectoryTenantID>{}</ActiveDirectoryTenantID></Subscription>",
            tenant.unwrap_or_default()
        ));
    }
    body.push_str("</Subscriptions>");
    body
}

/// Token provider that issues `token-<tenant>` without touching the network
/// and records every request.
///
/// Cached-only requests fail until an interactive request has succeeded,
/// mimicking an empty token store.
pub struct RecordingTokenProvider {
    login_kind: LoginKind,
    user_id: String,
    signed_in: AtomicBool,
    calls: Mutex<Vec<(String, PromptMode)>>,
}

impl RecordingTokenProvider {
    pub fn new(login_kind: LoginKind) -> Self {
        Self {
            login_kind,
            user_id: USER.to_string(),
            signed_in: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider that already holds a session, as after an earlier login.
    pub fn signed_in(login_kind: LoginKind) -> Self {
        let provider = Self::new(login_kind);
        provider.signed_in.store(true, Ordering::SeqCst);
        provider
    }

    pub fn calls(&self) -> Vec<(String, PromptMode)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, tenant: &str, mode: PromptMode) -> usize {
        self.calls()
            .iter()
            .filter(|(t, m)| t == tenant && *m == mode)
            .count()
    }
}

#[async_trait]
impl TokenProvider for RecordingTokenProvider {
    async fn acquire(
        &self,
        config: &AdConfiguration,
        user_id: Option<&str>,
        _secret: Option<&Secret>,
        mode: PromptMode,
    ) -> Result<AccessToken, AuthError> {
        self.calls
            .lock()
            .unwrap()
            .push((config.ad_domain.clone(), mode));

        match mode {
            PromptMode::CachedOnly if !self.signed_in.load(Ordering::SeqCst) => {
                return Err(AuthError::NoCachedCredential {
                    tenant: config.ad_domain.clone(),
                    user: user_id.unwrap_or("<any>").to_string(),
                });
            }
            PromptMode::Interactive => self.signed_in.store(true, Ordering::SeqCst),
            PromptMode::CachedOnly => {}
        }

        Ok(AccessToken::new(
            format!("token-{}", config.ad_domain),
            user_id.unwrap_or(&self.user_id),
            self.login_kind,
            config.ad_domain.clone(),
            Utc::now() + Duration::hours(1),
        ))
    }
}
