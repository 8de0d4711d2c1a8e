use super::{LoggingConfig, validation::ConfigValidationError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tenantscope::auth::DEFAULT_CLIENT_ID;
use tenantscope::credentials::{InMemoryProfileStore, ProfileEntry};
use tenantscope::environment::{AzureEnvironment, EnvironmentRegistry};
use uuid::Uuid;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main application configuration
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    client_id: Option<String>,
    /// Tenant used for service principal logins
    service_principal_tenant: Option<String>,
    /// Directory of `<THUMBPRINT>.pem` management certificates
    certificate_dir: Option<String>,

    /// Additional or overriding cloud environments
    #[serde(default)]
    environments: Vec<AzureEnvironment>,
    /// Known subscriptions, used when a credential is not cached
    #[serde(default)]
    profile: Vec<ProfileEntry>,
    #[serde(default)]
    logging: LoggingConfig,
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if let Some(client_id) = &self.client_id {
            if Uuid::parse_str(client_id.trim()).is_err() {
                errors.push(ConfigValidationError::ClientId {
                    configured: client_id.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for environment in &self.environments {
            if !seen.insert(environment.name.to_lowercase()) {
                errors.push(ConfigValidationError::DuplicateEnvironment {
                    name: environment.name.clone(),
                });
            }

            let endpoints = [
                (
                    "active_directory_endpoint",
                    &environment.active_directory_endpoint,
                ),
                (
                    "resource_manager_endpoint",
                    &environment.resource_manager_endpoint,
                ),
                ("service_endpoint", &environment.service_endpoint),
            ];
            for (field, value) in endpoints {
                if !is_absolute_url(value) {
                    errors.push(ConfigValidationError::EnvironmentEndpoint {
                        environment: environment.name.clone(),
                        field,
                        configured: value.clone(),
                    });
                }
            }
        }

        let environments = self.environments();
        for entry in &self.profile {
            if environments.get(&entry.environment).is_err() {
                errors.push(ConfigValidationError::ProfileEnvironment {
                    subscription_id: entry.subscription_id,
                    environment: entry.environment.clone(),
                });
            }
        }

        let level = self.logging.level().to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::LogLevel {
                configured: self.logging.level().to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn client_id(&self) -> &str {
        self.client_id
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_CLIENT_ID)
    }

    pub fn service_principal_tenant(&self) -> Option<&str> {
        self.service_principal_tenant
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Built-in clouds plus the configured ones.
    pub fn environments(&self) -> EnvironmentRegistry {
        let mut registry = EnvironmentRegistry::new();
        for environment in &self.environments {
            registry.insert(environment.clone());
        }
        registry
    }

    pub fn profile_store(&self) -> InMemoryProfileStore {
        self.profile.iter().cloned().collect()
    }

    /// Configured certificate directory, or `<config dir>/tenantscope/certificates`.
    pub fn certificate_dir(&self) -> PathBuf {
        match self.certificate_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tenantscope")
                .join("certificates"),
        }
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }
}

fn is_absolute_url(value: &str) -> bool {
    let value = value.trim();
    ["https://", "http://"]
        .iter()
        .any(|scheme| value.len() > scheme.len() && value.starts_with(scheme))
}
