use super::certificate::{CertificateStore, ClientCertificate};
use super::profile::ProfileStore;
use crate::auth::{AccessToken, PromptMode};
use crate::environment::EnvironmentRegistry;
use crate::error::AuthError;
use crate::orchestrator::{AuthenticationOrchestrator, DiscoveryScope};
use std::sync::Arc;
use uuid::Uuid;

/// Bearer-token credential for one subscription.
#[derive(Debug, Clone)]
pub struct AccessTokenCredential {
    pub subscription_id: Uuid,
    pub token: Arc<AccessToken>,
}

impl AccessTokenCredential {
    /// Adds the bearer token to an outgoing request.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(self.token.secret())
    }
}

/// Management-certificate credential for one subscription.
#[derive(Debug, Clone)]
pub struct CertificateCredential {
    pub subscription_id: Uuid,
    pub certificate: ClientCertificate,
}

impl CertificateCredential {
    pub fn identity(&self) -> Result<reqwest::Identity, AuthError> {
        self.certificate.identity()
    }
}

/// Credential returned by [`CredentialResolver::resolve_credential`].
#[derive(Debug, Clone)]
pub enum ResolvedCredential {
    AccessToken(AccessTokenCredential),
    Certificate(CertificateCredential),
}

impl ResolvedCredential {
    pub fn subscription_id(&self) -> Uuid {
        match self {
            ResolvedCredential::AccessToken(credential) => credential.subscription_id,
            ResolvedCredential::Certificate(credential) => credential.subscription_id,
        }
    }

    pub fn is_access_token(&self) -> bool {
        matches!(self, ResolvedCredential::AccessToken(_))
    }
}

/// Turns a subscription id into a usable credential.
///
/// Lookup order:
///
/// 1. the credential cache;
/// 2. when the profile names a user, one non-prompting authentication pass
///    followed by a second cache lookup;
/// 3. when the profile names a certificate thumbprint instead, the
///    certificate store.
///
/// Every failure is reported as [`AuthError::InvalidSubscriptionState`]. The
/// cache is only written by the authentication pass itself.
pub struct CredentialResolver {
    orchestrator: Arc<AuthenticationOrchestrator>,
    profile: Arc<dyn ProfileStore>,
    certificates: Arc<dyn CertificateStore>,
    environments: EnvironmentRegistry,
}

impl CredentialResolver {
    pub fn new(
        orchestrator: Arc<AuthenticationOrchestrator>,
        profile: Arc<dyn ProfileStore>,
        certificates: Arc<dyn CertificateStore>,
    ) -> Self {
        Self {
            orchestrator,
            profile,
            certificates,
            environments: EnvironmentRegistry::new(),
        }
    }

    pub fn with_environments(mut self, environments: EnvironmentRegistry) -> Self {
        self.environments = environments;
        self
    }

    pub async fn resolve_credential(
        &self,
        subscription_id: Uuid,
    ) -> Result<ResolvedCredential, AuthError> {
        if let Some(credential) = self.cached(subscription_id).await {
            return Ok(credential);
        }

        let Some(entry) = self.profile.subscription(&subscription_id) else {
            return Err(AuthError::invalid_subscription(
                subscription_id,
                "no cached credential and no profile entry",
            ));
        };

        if let Some(user) = entry.user() {
            log::debug!("Re-authenticating {user} to recover subscription {subscription_id}");
            let environment = self
                .environments
                .get(&entry.environment)
                .map_err(|e| caused_by(subscription_id, "unknown environment", e))?;

            self.orchestrator
                .authenticate(
                    environment,
                    DiscoveryScope::All,
                    PromptMode::CachedOnly,
                    Some(user),
                    None,
                )
                .await
                .map_err(|e| caused_by(subscription_id, "re-authentication failed", e))?;

            return self.cached(subscription_id).await.ok_or_else(|| {
                AuthError::invalid_subscription(
                    subscription_id,
                    format!("subscription is not accessible to {user}"),
                )
            });
        }

        if let Some(thumbprint) = entry.thumbprint() {
            let certificate = self
                .certificates
                .find_by_thumbprint(thumbprint)
                .await
                .map_err(|e| caused_by(subscription_id, "certificate lookup failed", e))?
                .ok_or_else(|| {
                    AuthError::invalid_subscription(
                        subscription_id,
                        format!("certificate {thumbprint} not found"),
                    )
                })?;

            return Ok(ResolvedCredential::Certificate(CertificateCredential {
                subscription_id,
                certificate,
            }));
        }

        Err(AuthError::invalid_subscription(
            subscription_id,
            "profile entry has neither a user account nor a certificate",
        ))
    }

    async fn cached(&self, subscription_id: Uuid) -> Option<ResolvedCredential> {
        self.orchestrator
            .cache()
            .get(&subscription_id)
            .await
            .map(|token| {
                ResolvedCredential::AccessToken(AccessTokenCredential {
                    subscription_id,
                    token,
                })
            })
    }
}

fn caused_by(subscription_id: Uuid, reason: &str, source: AuthError) -> AuthError {
    AuthError::InvalidSubscriptionState {
        subscription_id,
        reason: reason.to_string(),
        source: Some(Box::new(source)),
    }
}
