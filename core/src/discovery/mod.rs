//! Tenant and subscription discovery.
//!
//! Two discoverers implement [`SubscriptionDiscoverer`]:
//!
//! - [`ResourceManagerDiscoverer`] walks every tenant with a tenant-scoped
//!   token and lists its resource-manager subscriptions.
//! - [`ClassicDiscoverer`] lists classic subscriptions once with the
//!   common-tenant token.
//!
//! Both return lazy streams. Network calls happen when an element is pulled,
//! and a failure is yielded as an `Err` item after the elements already
//! produced, ending the stream.

pub mod classic;
pub mod management_client;
pub mod resource_manager;
pub mod tenants;

pub use classic::ClassicDiscoverer;
pub use management_client::{
    ClassicSubscription, ManagementClient, ResourceManagerSubscription, TenantIdDescription,
};
pub use resource_manager::ResourceManagerDiscoverer;
pub use tenants::TenantEnumerator;

use crate::auth::{AccessToken, PromptMode, Secret, TokenProvider};
use crate::environment::AzureEnvironment;
use crate::error::{AuthError, DiscoveryError};
use crate::model::{Subscription, SubscriptionSource};
use futures::stream::BoxStream;
use std::sync::Arc;
use uuid::Uuid;

/// A subscription together with the token that authorizes it.
#[derive(Debug, Clone)]
pub struct DiscoveredSubscription {
    pub subscription: Subscription,
    pub token: Arc<AccessToken>,
}

/// Lazy, finite, non-restartable sequence of discovered subscriptions.
pub type DiscoveryStream<'a> = BoxStream<'a, Result<DiscoveredSubscription, AuthError>>;

/// How discoverers obtain additional tenant-scoped tokens.
///
/// Carries the mode and secret of the common-tenant request so that every
/// follow-up request behaves the same way.
#[derive(Clone, Copy)]
pub struct TokenAcquisition<'a> {
    pub provider: &'a dyn TokenProvider,
    pub secret: Option<&'a Secret>,
    pub mode: PromptMode,
}

impl TokenAcquisition<'_> {
    pub async fn for_tenant(
        &self,
        environment: &AzureEnvironment,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Arc<AccessToken>, AuthError> {
        let config = environment.ad_configuration(tenant_id);
        self.provider
            .acquire(&config, Some(user_id), self.secret, self.mode)
            .await
            .map(Arc::new)
    }
}

/// Source of subscriptions and the tokens that authorize them.
pub trait SubscriptionDiscoverer: Send + Sync {
    fn source(&self) -> SubscriptionSource;

    fn discover<'a>(
        &'a self,
        environment: &'a AzureEnvironment,
        common_token: Arc<AccessToken>,
        acquisition: TokenAcquisition<'a>,
    ) -> DiscoveryStream<'a>;
}

pub(crate) fn parse_subscription_id(raw: &str, operation: &str) -> Result<Uuid, DiscoveryError> {
    Uuid::parse_str(raw.trim()).map_err(|e| {
        DiscoveryError::invalid_response(operation, format!("invalid subscription id '{raw}': {e}"))
    })
}
