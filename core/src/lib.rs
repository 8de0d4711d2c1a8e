//! # Tenantscope Core Library
//!
//! Multi-tenant Azure Active Directory authentication, subscription discovery
//! and per-subscription credential resolution.
//!
//! ## Modules
//!
//! - [`auth`] - Token acquisition against Azure AD (password, client
//!   credentials, device code, refresh) and the in-process token store
//! - [`discovery`] - Tenant enumeration and the resource-manager and classic
//!   subscription discoverers
//! - [`orchestrator`] - The end-to-end `authenticate` pass
//! - [`credentials`] - Credential cache, profile and certificate stores, and
//!   the credential resolver
//! - [`environment`] - Cloud endpoint descriptors
//! - [`model`] - Subscription records
//! - [`error`] - Error types
//! - [`utils`] - Environment variable helpers
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tenantscope::auth::{AzureAdTokenProvider, DEFAULT_CLIENT_ID, PromptMode};
//! use tenantscope::discovery::ManagementClient;
//! use tenantscope::environment::AzureEnvironment;
//! use tenantscope::orchestrator::{AuthenticationOrchestrator, DiscoveryScope};
//!
//! # async fn run() -> Result<(), tenantscope::AuthError> {
//! let provider = Arc::new(AzureAdTokenProvider::new(DEFAULT_CLIENT_ID));
//! let orchestrator = AuthenticationOrchestrator::new(provider, ManagementClient::new());
//! let result = orchestrator
//!     .authenticate(
//!         &AzureEnvironment::azure_cloud(),
//!         DiscoveryScope::All,
//!         PromptMode::Interactive,
//!         None,
//!         None,
//!     )
//!     .await?;
//! for subscription in &result.subscriptions {
//!     println!("{} {}", subscription.id, subscription.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod credentials;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod utils;

pub use error::{AuthError, DiscoveryError};
