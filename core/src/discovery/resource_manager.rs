use super::management_client::ManagementClient;
use super::tenants::TenantEnumerator;
use super::{
    DiscoveredSubscription, DiscoveryStream, SubscriptionDiscoverer, TokenAcquisition,
    parse_subscription_id,
};
use crate::auth::{AccessToken, cached_token_for};
use crate::environment::AzureEnvironment;
use crate::error::AuthError;
use crate::model::{Subscription, SubscriptionSource};
use futures::StreamExt;
use futures::stream;
use std::collections::VecDeque;
use std::sync::Arc;

/// Discovers resource-manager subscriptions tenant by tenant.
///
/// For each tenant returned by the tenant listing a tenant-scoped token is
/// acquired with the caller's prompt mode and secret, then the tenant's
/// subscriptions are listed with that token. Tenants are visited in listing
/// order and each tenant's subscriptions keep their listing order.
#[derive(Debug, Clone, Default)]
pub struct ResourceManagerDiscoverer {
    client: ManagementClient,
    tenants: TenantEnumerator,
}

impl ResourceManagerDiscoverer {
    pub fn new(client: ManagementClient) -> Self {
        Self {
            tenants: TenantEnumerator::new(client.clone()),
            client,
        }
    }
}

impl SubscriptionDiscoverer for ResourceManagerDiscoverer {
    fn source(&self) -> SubscriptionSource {
        SubscriptionSource::ResourceManager
    }

    fn discover<'a>(
        &'a self,
        environment: &'a AzureEnvironment,
        common_token: Arc<AccessToken>,
        acquisition: TokenAcquisition<'a>,
    ) -> DiscoveryStream<'a> {
        let cursor = TenantCursor {
            discoverer: self,
            environment,
            common_token,
            acquisition,
            tenants: None,
            pending: VecDeque::new(),
            finished: false,
        };

        stream::unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(item) = cursor.pending.pop_front() {
                    return Some((Ok(item), cursor));
                }
                if cursor.finished {
                    return None;
                }
                match cursor.visit_next_tenant().await {
                    Ok(true) => continue,
                    Ok(false) => cursor.finished = true,
                    Err(error) => {
                        cursor.finished = true;
                        return Some((Err(error), cursor));
                    }
                }
            }
        })
        .boxed()
    }
}

struct TenantCursor<'a> {
    discoverer: &'a ResourceManagerDiscoverer,
    environment: &'a AzureEnvironment,
    common_token: Arc<AccessToken>,
    acquisition: TokenAcquisition<'a>,
    /// `None` until the tenant listing has been fetched
    tenants: Option<VecDeque<String>>,
    pending: VecDeque<DiscoveredSubscription>,
    finished: bool,
}

impl TenantCursor<'_> {
    /// Lists the next tenant's subscriptions into `pending`.
    ///
    /// Returns `Ok(false)` once every tenant has been visited.
    async fn visit_next_tenant(&mut self) -> Result<bool, AuthError> {
        if self.tenants.is_none() {
            let listed = self
                .discoverer
                .tenants
                .list_tenants(self.environment, &self.common_token)
                .await?;
            self.tenants = Some(listed.into());
        }

        let Some(tenant_id) = self.tenants.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(false);
        };

        let tenant_token = self
            .acquisition
            .for_tenant(self.environment, &tenant_id, &self.common_token.user_id)
            .await?;

        let listed = self
            .discoverer
            .client
            .list_subscriptions(self.environment, tenant_token.secret())
            .await?;

        let token = cached_token_for(&self.common_token, &tenant_token);
        let discovered = listed
            .into_iter()
            .map(|entry| -> Result<DiscoveredSubscription, AuthError> {
                let id = parse_subscription_id(&entry.subscription_id, "list_subscriptions")?;
                Ok(DiscoveredSubscription {
                    subscription: Subscription::new(id, entry.display_name, &self.environment.name)
                        .with_tenant(tenant_id.as_str())
                        .with_state(entry.state),
                    token: Arc::clone(&token),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Tenant {tenant_id}: {} resource manager subscription(s)",
            discovered.len()
        );
        self.pending.extend(discovered);
        Ok(true)
    }
}
