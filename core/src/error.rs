//! Error types for authentication, discovery and credential resolution.
//!
//! [`AuthError`] is the single error surfaced by the public API. Listing
//! endpoint failures are described in more detail by [`DiscoveryError`], which
//! is carried inside [`AuthError::Discovery`].

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while authenticating, discovering subscriptions or
/// resolving credentials.
///
/// # Distinguishing "bad credentials" from "no session"
///
/// [`AuthError::AuthenticationFailed`] means the identity provider rejected
/// the request or could not be reached. [`AuthError::NoCachedCredential`] means
/// a non-interactive call found nothing to reuse; the caller may decide to
/// prompt and retry. Use [`AuthError::requires_interaction`] to tell them apart.
///
/// # Examples
///
/// ```no_run
/// use tenantscope::AuthError;
///
/// fn describe(error: &AuthError) -> &'static str {
///     if error.requires_interaction() {
///         "sign in again"
///     } else {
///         "check your credentials"
///     }
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The identity endpoint rejected the credentials or failed to issue a token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No token is available without prompting
    #[error(
        "No cached credential for user '{user}' in tenant '{tenant}'. An interactive login is required."
    )]
    NoCachedCredential { tenant: String, user: String },

    /// A tenant or subscription listing endpoint failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The subscription cannot be resolved to any credential
    #[error("Invalid subscription state for {subscription_id}: {reason}")]
    InvalidSubscriptionState {
        subscription_id: Uuid,
        reason: String,
        #[source]
        source: Option<Box<AuthError>>,
    },

    /// A named lookup did not match exactly one entry
    #[error("Expected exactly one {kind} named '{name}', found {matches}")]
    AmbiguousResult {
        kind: &'static str,
        name: String,
        matches: usize,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Returns `true` when the failure can be fixed by an interactive login.
    pub fn requires_interaction(&self) -> bool {
        match self {
            AuthError::NoCachedCredential { .. } => true,
            AuthError::InvalidSubscriptionState {
                source: Some(source),
                ..
            } => source.requires_interaction(),
            _ => false,
        }
    }

    /// Returns `true` for zero-match named lookups, which callers treat as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::AmbiguousResult { matches: 0, .. })
    }

    pub(crate) fn invalid_subscription(subscription_id: Uuid, reason: impl Into<String>) -> Self {
        AuthError::InvalidSubscriptionState {
            subscription_id,
            reason: reason.into(),
            source: None,
        }
    }
}

/// Failures of the resource-manager and classic listing endpoints.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The request never produced a response (DNS, TLS, connection reset...)
    #[error("Request for {operation} failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    /// The endpoint answered with a non-success status
    #[error(
        "Azure API error during {operation}: {code} (HTTP {status_code}) - {message}{}",
        request_id_suffix(.request_id)
    )]
    AzureApi {
        operation: String,
        code: String,
        status_code: u16,
        message: String,
        request_id: Option<String>,
    },

    /// The body could not be parsed into the expected shape
    #[error("Malformed response for {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },
}

fn request_id_suffix(request_id: &Option<String>) -> String {
    request_id
        .as_deref()
        .map(|id| format!(" [Request ID: {id}]"))
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct AzureErrorEnvelope {
    error: AzureErrorBody,
}

#[derive(Deserialize)]
struct AzureErrorBody {
    code: String,
    message: String,
}

impl DiscoveryError {
    pub(crate) fn request_failed(operation: &str, error: impl std::fmt::Display) -> Self {
        DiscoveryError::RequestFailed {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    }

    pub(crate) fn invalid_response(operation: &str, reason: impl std::fmt::Display) -> Self {
        DiscoveryError::InvalidResponse {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Builds an [`DiscoveryError::AzureApi`] from a failed response.
    ///
    /// Resource-manager endpoints wrap failures in `{"error":{"code","message"}}`;
    /// the classic endpoint answers with XML, which is kept verbatim as the message.
    pub(crate) async fn from_response(response: reqwest::Response, operation: &str) -> Self {
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-ms-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await.unwrap_or_default();

        let (code, message) = match serde_json::from_str::<AzureErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => (
                status
                    .canonical_reason()
                    .unwrap_or("UnknownError")
                    .replace(' ', ""),
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body
                },
            ),
        };

        DiscoveryError::AzureApi {
            operation: operation.to_string(),
            code,
            status_code: status.as_u16(),
            message,
            request_id,
        }
    }
}
