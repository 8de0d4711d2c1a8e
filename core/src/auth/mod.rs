pub mod azure_ad;
pub mod claims;
pub mod provider;
pub mod token_cache;
pub mod types;

pub use azure_ad::{AzureAdTokenProvider, DEFAULT_CLIENT_ID, DeviceCodeFlowInfo};
pub use provider::{DeviceCodePrompt, LogPrompt, TokenProvider};
pub use token_cache::{TokenKey, TokenStore};
pub use types::{
    AccessToken, DeviceCodeInfo, LoginKind, PromptMode, Secret, SecretKind, TokenScope,
    cached_token_for,
};
