use super::management_client::{ClassicSubscription, ManagementClient};
use super::{
    DiscoveredSubscription, DiscoveryStream, SubscriptionDiscoverer, TokenAcquisition,
    parse_subscription_id,
};
use crate::auth::{AccessToken, TokenScope};
use crate::environment::AzureEnvironment;
use crate::error::{AuthError, DiscoveryError};
use crate::model::{Subscription, SubscriptionSource};
use futures::StreamExt;
use futures::stream;
use std::collections::VecDeque;
use std::sync::Arc;

const OPERATION: &str = "list_classic_subscriptions";

/// Discovers classic (service management) subscriptions.
///
/// The listing is made once with the common-tenant token. Live ID principals
/// then need a token for each subscription's own tenant; organizational
/// principals reuse the common token.
#[derive(Debug, Clone, Default)]
pub struct ClassicDiscoverer {
    client: ManagementClient,
}

impl ClassicDiscoverer {
    pub fn new(client: ManagementClient) -> Self {
        Self { client }
    }
}

impl SubscriptionDiscoverer for ClassicDiscoverer {
    fn source(&self) -> SubscriptionSource {
        SubscriptionSource::ServiceManagement
    }

    fn discover<'a>(
        &'a self,
        environment: &'a AzureEnvironment,
        common_token: Arc<AccessToken>,
        acquisition: TokenAcquisition<'a>,
    ) -> DiscoveryStream<'a> {
        let cursor = ClassicCursor {
            client: &self.client,
            environment,
            common_token,
            acquisition,
            listing: None,
            finished: false,
        };

        stream::unfold(cursor, |mut cursor| async move {
            if cursor.finished {
                return None;
            }
            match cursor.next_subscription().await {
                Ok(Some(item)) => Some((Ok(item), cursor)),
                Ok(None) => None,
                Err(error) => {
                    cursor.finished = true;
                    Some((Err(error), cursor))
                }
            }
        })
        .boxed()
    }
}

struct ClassicCursor<'a> {
    client: &'a ManagementClient,
    environment: &'a AzureEnvironment,
    common_token: Arc<AccessToken>,
    acquisition: TokenAcquisition<'a>,
    listing: Option<VecDeque<ClassicSubscription>>,
    finished: bool,
}

impl ClassicCursor<'_> {
    async fn next_subscription(&mut self) -> Result<Option<DiscoveredSubscription>, AuthError> {
        if self.listing.is_none() {
            let listed = self
                .client
                .list_classic_subscriptions(self.environment, self.common_token.secret())
                .await?;
            log::debug!("{} classic subscription(s) listed", listed.len());
            self.listing = Some(listed.into());
        }

        let Some(entry) = self.listing.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(None);
        };

        let id = parse_subscription_id(&entry.subscription_id, OPERATION)?;
        let tenant_id = entry.tenant_id().map(str::to_string);

        let token = match self.common_token.login_kind.cached_token_scope() {
            TokenScope::Tenant => {
                let tenant = tenant_id.as_deref().ok_or_else(|| {
                    DiscoveryError::invalid_response(
                        OPERATION,
                        format!("subscription {id} does not name an Active Directory tenant"),
                    )
                })?;
                self.acquisition
                    .for_tenant(self.environment, tenant, &self.common_token.user_id)
                    .await?
            }
            TokenScope::Common => Arc::clone(&self.common_token),
        };

        let mut subscription =
            Subscription::new(id, entry.subscription_name, &self.environment.name)
                .with_state(entry.subscription_status);
        subscription.tenant_id = tenant_id;

        Ok(Some(DiscoveredSubscription {
            subscription,
            token,
        }))
    }
}
