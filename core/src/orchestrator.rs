//! End-to-end authentication pass.
//!
//! [`AuthenticationOrchestrator::authenticate`] acquires a common-tenant
//! token, runs the discoverers selected by a [`DiscoveryScope`], merges their
//! output by subscription id and publishes the tokens to the shared
//! [`CredentialCache`].

use crate::auth::{AccessToken, PromptMode, Secret, TokenProvider};
use crate::credentials::CredentialCache;
use crate::discovery::{
    ClassicDiscoverer, DiscoveredSubscription, ManagementClient, ResourceManagerDiscoverer,
    SubscriptionDiscoverer, TokenAcquisition,
};
use crate::environment::{AzureEnvironment, COMMON_TENANT};
use crate::error::AuthError;
use crate::model::{Subscription, SubscriptionSource};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Which subscription APIs an authentication pass consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryScope {
    ResourceManager,
    ServiceManagement,
    /// Both APIs, drained concurrently
    All,
}

/// Progress of a single `authenticate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Idle,
    AcquiringCommonToken,
    Discovering,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthPhase::Idle => "idle",
            AuthPhase::AcquiringCommonToken => "acquiring common token",
            AuthPhase::Discovering => "discovering",
            AuthPhase::Merging => "merging",
            AuthPhase::Done => "done",
            AuthPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful authentication pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    /// Deduplicated subscriptions, each tagged with `user_id`
    pub subscriptions: Vec<Subscription>,
    /// User resolved from the common-tenant token
    pub user_id: String,
}

/// What one discoverer produced before it finished or failed.
#[derive(Debug)]
struct DiscoveryBatch {
    source: SubscriptionSource,
    items: Vec<DiscoveredSubscription>,
    error: Option<AuthError>,
}

pub struct AuthenticationOrchestrator {
    token_provider: Arc<dyn TokenProvider>,
    resource_manager: Arc<dyn SubscriptionDiscoverer>,
    classic: Arc<dyn SubscriptionDiscoverer>,
    cache: CredentialCache,
}

impl AuthenticationOrchestrator {
    pub fn new(token_provider: Arc<dyn TokenProvider>, management: ManagementClient) -> Self {
        Self {
            token_provider,
            resource_manager: Arc::new(ResourceManagerDiscoverer::new(management.clone())),
            classic: Arc::new(ClassicDiscoverer::new(management)),
            cache: CredentialCache::new(),
        }
    }

    /// Shares an existing cache instead of the one created by `new`.
    pub fn with_cache(mut self, cache: CredentialCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_discoverers(
        mut self,
        resource_manager: Arc<dyn SubscriptionDiscoverer>,
        classic: Arc<dyn SubscriptionDiscoverer>,
    ) -> Self {
        self.resource_manager = resource_manager;
        self.classic = classic;
        self
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.token_provider
    }

    /// Authenticates against `environment` and discovers every subscription
    /// the principal can reach within `scope`.
    ///
    /// `user_id` and `secret` are optional: without them an interactive pass
    /// falls back to the device-code flow, and a [`PromptMode::CachedOnly`]
    /// pass only reuses tokens obtained earlier.
    ///
    /// # Errors
    ///
    /// - Failure to obtain the common-tenant token is always fatal.
    /// - With a single-API scope, a discoverer failure is fatal.
    /// - With [`DiscoveryScope::All`], a discoverer failure is only returned
    ///   when neither discoverer produced a subscription.
    ///
    /// The credential cache is not modified when an error is returned.
    pub async fn authenticate(
        &self,
        environment: &AzureEnvironment,
        scope: DiscoveryScope,
        mode: PromptMode,
        user_id: Option<&str>,
        secret: Option<&Secret>,
    ) -> Result<AuthenticationResult, AuthError> {
        let mut phase = AuthPhase::Idle;

        advance(&mut phase, AuthPhase::AcquiringCommonToken);
        let common_config = environment.ad_configuration(COMMON_TENANT);
        let common_token = match self
            .token_provider
            .acquire(&common_config, user_id, secret, mode)
            .await
        {
            Ok(token) => Arc::new(token),
            Err(error) => return Err(fail(&mut phase, error)),
        };
        log::info!(
            "Signed in to {} as {} ({:?})",
            environment.name,
            common_token.user_id,
            common_token.login_kind
        );

        advance(&mut phase, AuthPhase::Discovering);
        let acquisition = TokenAcquisition {
            provider: self.token_provider.as_ref(),
            secret,
            mode,
        };
        let batches = match scope {
            DiscoveryScope::ResourceManager => vec![
                drain(
                    self.resource_manager.as_ref(),
                    environment,
                    Arc::clone(&common_token),
                    acquisition,
                )
                .await,
            ],
            DiscoveryScope::ServiceManagement => vec![
                drain(
                    self.classic.as_ref(),
                    environment,
                    Arc::clone(&common_token),
                    acquisition,
                )
                .await,
            ],
            DiscoveryScope::All => {
                let (resource_manager, classic) = futures::join!(
                    drain(
                        self.resource_manager.as_ref(),
                        environment,
                        Arc::clone(&common_token),
                        acquisition,
                    ),
                    drain(
                        self.classic.as_ref(),
                        environment,
                        Arc::clone(&common_token),
                        acquisition,
                    )
                );
                vec![resource_manager, classic]
            }
        };

        advance(&mut phase, AuthPhase::Merging);
        let discovered = match collect_batches(scope, batches) {
            Ok(discovered) => discovered,
            Err(error) => return Err(fail(&mut phase, error)),
        };

        let merged = merge_discovered(discovered);
        self.cache
            .extend(
                merged
                    .iter()
                    .map(|item| (item.subscription.id, Arc::clone(&item.token))),
            )
            .await;

        let user_id = common_token.user_id.clone();
        let subscriptions = merged
            .into_iter()
            .map(|item| {
                let mut subscription = item.subscription;
                subscription.account = Some(user_id.clone());
                subscription
            })
            .collect::<Vec<_>>();

        advance(&mut phase, AuthPhase::Done);
        log::info!(
            "Discovered {} subscription(s) for {user_id} in {}",
            subscriptions.len(),
            environment.name
        );

        Ok(AuthenticationResult {
            subscriptions,
            user_id,
        })
    }
}

fn advance(phase: &mut AuthPhase, next: AuthPhase) {
    log::debug!("Authentication: {phase} -> {next}");
    *phase = next;
}

fn fail(phase: &mut AuthPhase, error: AuthError) -> AuthError {
    log::error!("Authentication failed while {phase}: {error}");
    *phase = AuthPhase::Failed;
    error
}

/// Pulls a discoverer's stream until it ends or yields its first error.
async fn drain(
    discoverer: &dyn SubscriptionDiscoverer,
    environment: &AzureEnvironment,
    common_token: Arc<AccessToken>,
    acquisition: TokenAcquisition<'_>,
) -> DiscoveryBatch {
    let source = discoverer.source();
    let mut stream = discoverer.discover(environment, common_token, acquisition);
    let mut batch = DiscoveryBatch {
        source,
        items: Vec::new(),
        error: None,
    };

    while let Some(next) = stream.next().await {
        match next {
            Ok(item) => batch.items.push(item),
            Err(error) => {
                batch.error = Some(error);
                break;
            }
        }
    }

    batch
}

fn collect_batches(
    scope: DiscoveryScope,
    batches: Vec<DiscoveryBatch>,
) -> Result<Vec<DiscoveredSubscription>, AuthError> {
    let mut discovered = Vec::new();
    let mut first_error = None;

    for batch in batches {
        if let Some(error) = batch.error {
            if scope != DiscoveryScope::All {
                return Err(error);
            }
            log::warn!(
                "{} discovery stopped after {} subscription(s): {error}",
                batch.source,
                batch.items.len()
            );
            first_error.get_or_insert(error);
        }
        discovered.extend(batch.items);
    }

    match first_error {
        Some(error) if discovered.is_empty() => Err(error),
        _ => Ok(discovered),
    }
}

/// Unions discovered subscriptions by id.
///
/// The first occurrence of an id fixes its position; a later occurrence
/// replaces the record and token in place.
pub fn merge_discovered<I>(items: I) -> Vec<DiscoveredSubscription>
where
    I: IntoIterator<Item = DiscoveredSubscription>,
{
    let mut positions: HashMap<Uuid, usize> = HashMap::new();
    let mut merged: Vec<DiscoveredSubscription> = Vec::new();

    for item in items {
        match positions.get(&item.subscription.id) {
            Some(&index) => merged[index] = item,
            None => {
                positions.insert(item.subscription.id, merged.len());
                merged.push(item);
            }
        }
    }

    merged
}
