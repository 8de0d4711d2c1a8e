use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// What the local profile knows about a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub subscription_id: Uuid,
    /// Name of the environment the subscription belongs to
    pub environment: String,
    /// User that last signed in for this subscription
    #[serde(default)]
    pub user_account: Option<String>,
    /// Thumbprint of a management certificate registered for the subscription
    #[serde(default)]
    pub certificate_thumbprint: Option<String>,
}

impl ProfileEntry {
    pub fn new(subscription_id: Uuid, environment: impl Into<String>) -> Self {
        Self {
            subscription_id,
            environment: environment.into(),
            user_account: None,
            certificate_thumbprint: None,
        }
    }

    pub fn with_user(mut self, user_account: impl Into<String>) -> Self {
        self.user_account = Some(user_account.into());
        self
    }

    pub fn with_certificate(mut self, thumbprint: impl Into<String>) -> Self {
        self.certificate_thumbprint = Some(thumbprint.into());
        self
    }

    /// Signed-in user, ignoring blank values.
    pub fn user(&self) -> Option<&str> {
        non_blank(self.user_account.as_deref())
    }

    /// Certificate thumbprint, ignoring blank values.
    pub fn thumbprint(&self) -> Option<&str> {
        non_blank(self.certificate_thumbprint.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Read-only view of the persisted subscription profile.
pub trait ProfileStore: Send + Sync {
    fn subscription(&self, subscription_id: &Uuid) -> Option<ProfileEntry>;
}

/// Profile held in memory, typically loaded from the application config.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    entries: HashMap<Uuid, ProfileEntry>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ProfileEntry) {
        self.entries.insert(entry.subscription_id, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ProfileEntry> for InMemoryProfileStore {
    fn from_iter<I: IntoIterator<Item = ProfileEntry>>(iter: I) -> Self {
        let mut store = Self::new();
        for entry in iter {
            store.insert(entry);
        }
        store
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn subscription(&self, subscription_id: &Uuid) -> Option<ProfileEntry> {
        self.entries.get(subscription_id).cloned()
    }
}
