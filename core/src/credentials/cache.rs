use crate::auth::AccessToken;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-wide map from subscription id to the token that authorizes it.
///
/// Cloning is cheap and every clone refers to the same map. Readers never
/// observe a partially merged discovery pass: [`CredentialCache::extend`]
/// takes the write lock once for the whole batch.
#[derive(Debug, Clone, Default)]
pub struct CredentialCache {
    entries: Arc<RwLock<HashMap<Uuid, Arc<AccessToken>>>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, subscription_id: &Uuid) -> Option<Arc<AccessToken>> {
        self.entries.read().await.get(subscription_id).cloned()
    }

    pub async fn contains(&self, subscription_id: &Uuid) -> bool {
        self.entries.read().await.contains_key(subscription_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Inserts or replaces one entry.
    pub async fn insert(&self, subscription_id: Uuid, token: Arc<AccessToken>) {
        self.entries.write().await.insert(subscription_id, token);
    }

    /// Inserts a batch under a single write lock. Later entries replace
    /// earlier ones with the same id.
    pub async fn extend<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (Uuid, Arc<AccessToken>)>,
    {
        let mut guard = self.entries.write().await;
        guard.extend(entries);
        log::debug!("Credential cache now holds {} subscription(s)", guard.len());
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> HashMap<Uuid, Arc<AccessToken>> {
        self.entries.read().await.clone()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LoginKind;
    use chrono::{Duration, Utc};

    fn token(value: &str) -> Arc<AccessToken> {
        Arc::new(AccessToken::new(
            value,
            "user@contoso.com",
            LoginKind::OrgId,
            "t1",
            Utc::now() + Duration::hours(1),
        ))
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = CredentialCache::new();
        let other = cache.clone();
        let id = Uuid::from_u128(7);

        cache.insert(id, token("a")).await;

        assert!(other.contains(&id).await);
        assert_eq!(other.get(&id).await.unwrap().secret(), "a");
    }

    #[tokio::test]
    async fn test_extend_last_entry_wins() {
        let cache = CredentialCache::new();
        let id = Uuid::from_u128(1);

        cache
            .extend(vec![(id, token("first")), (id, token("second"))])
            .await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&id).await.unwrap().secret(), "second");
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = CredentialCache::new();
        cache.insert(Uuid::from_u128(1), token("a")).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
