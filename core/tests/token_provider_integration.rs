mod common;

use common::*;
use std::sync::{Arc, Mutex};
use tenantscope::AuthError;
use tenantscope::auth::{
    AzureAdTokenProvider, DEFAULT_CLIENT_ID, DeviceCodeInfo, DeviceCodePrompt, LoginKind,
    PromptMode, Secret, TokenProvider,
};
use tenantscope::environment::COMMON_TENANT;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Helper module for Azure AD token endpoint testing
mod token_helpers {
    use super::*;

    pub fn token_response(access_token: String, expires_in: &str) -> serde_json::Value {
        serde_json::json!({
            "token_type": "Bearer",
            "access_token": access_token,
            "refresh_token": "refresh-token-1",
            "expires_in": expires_in,
            "resource": MANAGEMENT_RESOURCE,
        })
    }

    pub fn org_token() -> String {
        fake_jwt(serde_json::json!({ "upn": USER, "tid": TENANT_1 }))
    }

    pub fn provider() -> AzureAdTokenProvider {
        AzureAdTokenProvider::new(DEFAULT_CLIENT_ID)
    }

    /// Prompt that remembers the last user code shown.
    #[derive(Default)]
    pub struct CapturingPrompt {
        pub user_code: Mutex<Option<String>>,
    }

    impl DeviceCodePrompt for CapturingPrompt {
        fn prompt(&self, info: &DeviceCodeInfo) {
            *self.user_code.lock().unwrap() = Some(info.user_code.clone());
        }
    }
}

use token_helpers::*;

mod password_grant {
    use super::*;

    #[tokio::test]
    async fn test_password_grant_resolves_user_and_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(org_token(), "3599")))
            .expect(1)
            .mount(&server)
            .await;
        let provider = provider();
        let config = mock_environment(&server).ad_configuration(COMMON_TENANT);

        let token = provider
            .acquire(
                &config,
                Some(USER),
                Some(&Secret::password("p@ss word")),
                PromptMode::Interactive,
            )
            .await
            .unwrap();

        assert_eq!(token.user_id, USER);
        assert_eq!(token.tenant_id, TENANT_1);
        assert_eq!(token.login_kind, LoginKind::OrgId);
        assert!(!token.needs_refresh());

        // The second request is served from the token store
        let again = provider
            .acquire(&config, Some(USER), None, PromptMode::CachedOnly)
            .await
            .unwrap();
        assert_eq!(again, token);
    }

    #[tokio::test]
    async fn test_live_id_principal_is_detected() {
        let server = MockServer::start().await;
        let jwt = fake_jwt(serde_json::json!({
            "unique_name": "live.com#someone@outlook.com",
            "idp": "live.com",
            "tid": TENANT_2,
        }));
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(jwt, "3599")))
            .mount(&server)
            .await;

        let token = provider()
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                Some("someone@outlook.com"),
                Some(&Secret::password("secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap();

        assert_eq!(token.login_kind, LoginKind::LiveId);
        assert_eq!(token.user_id, "someone@outlook.com");
    }

    #[tokio::test]
    async fn test_rejected_password_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "AADSTS50126: Invalid username or password."
            })))
            .mount(&server)
            .await;

        let error = provider()
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                Some(USER),
                Some(&Secret::password("wrong")),
                PromptMode::Interactive,
            )
            .await
            .unwrap_err();

        assert!(matches!(error, AuthError::AuthenticationFailed(_)));
        assert!(!error.requires_interaction());
    }

    #[tokio::test]
    async fn test_out_of_range_lifetime_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
                org_token(),
                "100000000000000000",
            )))
            .mount(&server)
            .await;
        let provider = provider();

        let error = provider
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                Some(USER),
                Some(&Secret::password("secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap_err();

        assert!(matches!(error, AuthError::AuthenticationFailed(_)));
        assert_eq!(provider.store().len().await, 0);
    }
}

mod cached_only {
    use super::*;

    #[tokio::test]
    async fn test_cached_only_never_prompts() {
        let server = MockServer::start().await;
        Mock::given(path("/ad/common/oauth2/devicecode"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(path("/ad/common/oauth2/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let error = provider()
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                Some(USER),
                None,
                PromptMode::CachedOnly,
            )
            .await
            .unwrap_err();

        match error {
            AuthError::NoCachedCredential { tenant, user } => {
                assert_eq!(tenant, COMMON_TENANT);
                assert_eq!(user, USER);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cached_only_redeems_refresh_token_for_other_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(org_token(), "3599")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/ad/{TENANT_2}/oauth2/token")))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
                fake_jwt(serde_json::json!({ "upn": USER, "tid": TENANT_2 })),
                "3599",
            )))
            .expect(1)
            .mount(&server)
            .await;
        let provider = provider();
        let environment = mock_environment(&server);

        provider
            .acquire(
                &environment.ad_configuration(COMMON_TENANT),
                Some(USER),
                Some(&Secret::password("secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap();

        let tenant_token = provider
            .acquire(
                &environment.ad_configuration(TENANT_2),
                Some(USER),
                None,
                PromptMode::CachedOnly,
            )
            .await
            .unwrap();

        assert_eq!(tenant_token.tenant_id, TENANT_2);
        assert_eq!(provider.store().len().await, 2);
    }

    #[tokio::test]
    async fn test_expired_token_is_renewed_with_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(org_token(), "0")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(org_token(), "3599")))
            .expect(1)
            .mount(&server)
            .await;
        let provider = provider();
        let config = mock_environment(&server).ad_configuration(COMMON_TENANT);

        let first = provider
            .acquire(
                &config,
                Some(USER),
                Some(&Secret::password("secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap();
        assert!(first.needs_refresh());

        let renewed = provider
            .acquire(&config, Some(USER), None, PromptMode::CachedOnly)
            .await
            .unwrap();
        assert!(!renewed.needs_refresh());
    }

    #[tokio::test]
    async fn test_cached_only_rejected_refresh_requires_interaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(org_token(), "3599")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/ad/{TENANT_2}/oauth2/token")))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "interaction_required",
                "error_description": "AADSTS50076: multi-factor authentication is required"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path(format!("/ad/{TENANT_2}/oauth2/devicecode")))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let provider = provider();
        let environment = mock_environment(&server);

        provider
            .acquire(
                &environment.ad_configuration(COMMON_TENANT),
                Some(USER),
                Some(&Secret::password("secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap();

        let error = provider
            .acquire(
                &environment.ad_configuration(TENANT_2),
                Some(USER),
                None,
                PromptMode::CachedOnly,
            )
            .await
            .unwrap_err();

        assert!(error.requires_interaction());
        match error {
            AuthError::NoCachedCredential { tenant, user } => {
                assert_eq!(tenant, TENANT_2);
                assert_eq!(user, USER);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cached_only_surfaces_misconfigured_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(org_token(), "3599")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/ad/{TENANT_2}/oauth2/token")))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client"
            })))
            .mount(&server)
            .await;
        let provider = provider();
        let environment = mock_environment(&server);

        provider
            .acquire(
                &environment.ad_configuration(COMMON_TENANT),
                Some(USER),
                Some(&Secret::password("secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap();

        let error = provider
            .acquire(
                &environment.ad_configuration(TENANT_2),
                Some(USER),
                None,
                PromptMode::CachedOnly,
            )
            .await
            .unwrap_err();

        assert!(matches!(error, AuthError::AuthenticationFailed(_)));
        assert!(!error.requires_interaction());
    }
}

mod device_code {
    use super::*;

    #[tokio::test]
    async fn test_device_code_flow_polls_until_authorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "device-code-1",
                "user_code": "ABCD-1234",
                "verification_url": "https://microsoft.com/devicelogin",
                "expires_in": "900",
                "interval": "0",
                "message": "To sign in, use a web browser to open https://microsoft.com/devicelogin and enter the code ABCD-1234."
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=device_code"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_pending"
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .and(body_string_contains("grant_type=device_code"))
            .and(body_string_contains("code=device-code-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(org_token(), "3599")))
            .mount(&server)
            .await;
        let prompt = Arc::new(CapturingPrompt::default());
        let provider = provider().with_prompt(prompt.clone());

        let token = provider
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                None,
                None,
                PromptMode::Interactive,
            )
            .await
            .unwrap();

        assert_eq!(token.user_id, USER);
        assert_eq!(prompt.user_code.lock().unwrap().as_deref(), Some("ABCD-1234"));
    }

    #[tokio::test]
    async fn test_declined_device_code_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "device-code-1",
                "user_code": "ABCD-1234",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 900,
                "interval": 0,
                "message": "Enter ABCD-1234"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ad/common/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_declined"
            })))
            .mount(&server)
            .await;

        let error = provider()
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                None,
                None,
                PromptMode::Interactive,
            )
            .await
            .unwrap_err();

        assert!(error.to_string().contains("denied"));
    }
}

mod service_principal {
    use super::*;

    #[tokio::test]
    async fn test_client_credentials_use_configured_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ad/sp-tenant/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": fake_jwt(serde_json::json!({ "appid": "app-id", "tid": "sp-tenant" })),
                "expires_in": "3599"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let provider = provider().with_service_principal_tenant("sp-tenant");

        let token = provider
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                Some("app-id"),
                Some(&Secret::client_secret("app-secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap();

        assert_eq!(token.user_id, "app-id");
        assert_eq!(token.login_kind, LoginKind::OrgId);
        assert_eq!(token.tenant_id, "sp-tenant");
    }

    #[tokio::test]
    async fn test_client_credentials_require_tenant() {
        let server = MockServer::start().await;

        let error = provider()
            .acquire(
                &mock_environment(&server).ad_configuration(COMMON_TENANT),
                Some("app-id"),
                Some(&Secret::client_secret("app-secret")),
                PromptMode::Interactive,
            )
            .await
            .unwrap_err();

        assert!(matches!(error, AuthError::Configuration(_)));
    }
}
