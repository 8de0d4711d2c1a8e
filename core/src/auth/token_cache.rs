use super::types::AccessToken;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Lookup key for issued tokens.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub authority: String,
    pub resource: String,
    pub user_id: String,
}

#[derive(Clone)]
struct StoredToken {
    key: TokenKey,
    token: AccessToken,
    refresh_token: Option<Zeroizing<String>>,
}

/// Tokens issued by the identity endpoint during this process.
///
/// Backs [`PromptMode::CachedOnly`](super::PromptMode::CachedOnly)
/// acquisition. Authorities and user ids are compared case-insensitively.
#[derive(Clone, Default)]
pub struct TokenStore {
    entries: Arc<RwLock<Vec<StoredToken>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an unexpired token for the authority and resource.
    ///
    /// Without a user id, any signed-in user matches.
    pub async fn get(
        &self,
        authority: &str,
        resource: &str,
        user_id: Option<&str>,
    ) -> Option<AccessToken> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|entry| {
                entry.key.authority.eq_ignore_ascii_case(authority)
                    && entry.key.resource == resource
                    && matches_user(&entry.key.user_id, user_id)
            })
            .map(|entry| &entry.token)
            .find(|token| !token.needs_refresh())
            .cloned()
    }

    /// Finds a refresh token for the user issued by the same identity endpoint.
    ///
    /// Azure AD refresh tokens are multi-resource: one obtained for the common
    /// tenant can be redeemed at any tenant the user belongs to, so the tenant
    /// segment of the authority is ignored.
    pub async fn refresh_token(
        &self,
        ad_endpoint: &str,
        user_id: Option<&str>,
    ) -> Option<(String, Zeroizing<String>)> {
        let prefix = ad_endpoint.trim_end_matches('/').to_lowercase();
        let entries = self.entries.read().await;
        entries
            .iter()
            .rev()
            .filter(|entry| {
                entry.key.authority.to_lowercase().starts_with(&prefix)
                    && matches_user(&entry.key.user_id, user_id)
            })
            .find_map(|entry| {
                entry
                    .refresh_token
                    .clone()
                    .map(|rt| (entry.key.user_id.clone(), rt))
            })
    }

    /// Stores a token, replacing any previous token for the same key.
    pub async fn insert(&self, key: TokenKey, token: AccessToken, refresh_token: Option<String>) {
        let mut entries = self.entries.write().await;
        entries.retain(|entry| !same_key(&entry.key, &key));
        entries.push(StoredToken {
            key,
            token,
            refresh_token: refresh_token.map(Zeroizing::new),
        });
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

fn matches_user(stored: &str, requested: Option<&str>) -> bool {
    requested.is_none_or(|user| stored.eq_ignore_ascii_case(user))
}

fn same_key(a: &TokenKey, b: &TokenKey) -> bool {
    a.authority.eq_ignore_ascii_case(&b.authority)
        && a.resource == b.resource
        && a.user_id.eq_ignore_ascii_case(&b.user_id)
}
