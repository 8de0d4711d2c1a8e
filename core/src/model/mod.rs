use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a subscription record was discovered.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionSource {
    /// Azure Resource Manager subscription API
    ResourceManager,
    /// Classic Service Management subscription API
    ServiceManagement,
}

impl fmt::Display for SubscriptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionSource::ResourceManager => write!(f, "resource manager"),
            SubscriptionSource::ServiceManagement => write!(f, "service management"),
        }
    }
}

/// An Azure subscription visible to the signed-in principal.
///
/// The id is the identity of the record: the same subscription returned by
/// both listing APIs is one subscription.
///
/// # Examples
///
/// ```no_run
/// use tenantscope::model::Subscription;
/// use uuid::Uuid;
///
/// let subscription = Subscription::new(Uuid::new_v4(), "Production", "AzureCloud")
///     .with_tenant("72f988bf-86f1-41af-91ab-2d7cd011db47");
/// assert!(subscription.account.is_none());
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Subscription {
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Name of the owning environment, e.g. `AzureCloud`
    pub environment: String,
    /// Owning Azure AD tenant, when the listing API reports it
    pub tenant_id: Option<String>,
    /// State reported by the listing API, e.g. `Enabled` or `Active`
    pub state: Option<String>,
    /// User account that authenticated the discovery pass
    pub account: Option<String>,
}

impl Subscription {
    pub fn new(id: Uuid, name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            environment: environment.into(),
            tenant_id: None,
            state: None,
            account: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_state(mut self, state: Option<String>) -> Self {
        self.state = state;
        self
    }
}

/// Finds the single subscription whose display name matches `name`
/// (case-insensitive).
///
/// # Errors
///
/// Returns [`AuthError::AmbiguousResult`] when no subscription or more than
/// one subscription carries the name. Callers treat the zero-match case as
/// "not found" (see [`AuthError::is_not_found`]).
pub fn find_subscription_by_name<'a>(
    subscriptions: &'a [Subscription],
    name: &str,
) -> Result<&'a Subscription, AuthError> {
    let mut matches = subscriptions
        .iter()
        .filter(|subscription| subscription.name.eq_ignore_ascii_case(name));

    match (matches.next(), matches.count()) {
        (Some(subscription), 0) => Ok(subscription),
        (first, rest) => Err(AuthError::AmbiguousResult {
            kind: "subscription",
            name: name.to_string(),
            matches: usize::from(first.is_some()) + rest,
        }),
    }
}
