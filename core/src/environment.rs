//! Cloud environment descriptors and identity endpoint configuration.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the public Azure cloud.
pub const AZURE_CLOUD: &str = "AzureCloud";
/// Name of the Azure China cloud.
pub const AZURE_CHINA_CLOUD: &str = "AzureChinaCloud";
/// Catch-all tenant used to find out which tenants a principal belongs to.
pub const COMMON_TENANT: &str = "common";

/// Named set of service endpoints for one Azure cloud.
///
/// Descriptors are supplied by configuration and never modified by the
/// authentication core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureEnvironment {
    /// Environment name, e.g. `AzureCloud`
    pub name: String,
    /// Identity authority, e.g. `https://login.microsoftonline.com/`
    pub active_directory_endpoint: String,
    /// Audience requested for management tokens
    pub active_directory_service_endpoint_resource_id: String,
    /// Resource-manager base URL, e.g. `https://management.azure.com/`
    pub resource_manager_endpoint: String,
    /// Classic service-management base URL, e.g. `https://management.core.windows.net/`
    pub service_endpoint: String,
}

impl AzureEnvironment {
    pub fn azure_cloud() -> Self {
        Self {
            name: AZURE_CLOUD.to_string(),
            active_directory_endpoint: "https://login.microsoftonline.com/".to_string(),
            active_directory_service_endpoint_resource_id:
                "https://management.core.windows.net/".to_string(),
            resource_manager_endpoint: "https://management.azure.com/".to_string(),
            service_endpoint: "https://management.core.windows.net/".to_string(),
        }
    }

    pub fn azure_china_cloud() -> Self {
        Self {
            name: AZURE_CHINA_CLOUD.to_string(),
            active_directory_endpoint: "https://login.chinacloudapi.cn/".to_string(),
            active_directory_service_endpoint_resource_id:
                "https://management.core.chinacloudapi.cn/".to_string(),
            resource_manager_endpoint: "https://management.chinacloudapi.cn/".to_string(),
            service_endpoint: "https://management.core.chinacloudapi.cn/".to_string(),
        }
    }

    /// Builds the identity endpoint configuration for one tenant.
    pub fn ad_configuration(&self, tenant_id: &str) -> AdConfiguration {
        AdConfiguration {
            ad_endpoint: self.active_directory_endpoint.clone(),
            resource_client_uri: self.active_directory_service_endpoint_resource_id.clone(),
            ad_domain: tenant_id.to_string(),
        }
    }

    /// Joins `path` onto the resource-manager endpoint.
    pub fn resource_manager_url(&self, path: &str) -> String {
        join_url(&self.resource_manager_endpoint, path)
    }

    /// Joins `path` onto the classic service endpoint.
    pub fn service_management_url(&self, path: &str) -> String {
        join_url(&self.service_endpoint, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Identity endpoint parameters for a single token request.
///
/// Built per tenant per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdConfiguration {
    pub ad_endpoint: String,
    pub resource_client_uri: String,
    /// Tenant id, or [`COMMON_TENANT`]
    pub ad_domain: String,
}

impl AdConfiguration {
    /// Authority URL for the tenant, e.g. `https://login.microsoftonline.com/common`.
    pub fn authority(&self) -> String {
        format!(
            "{}/{}",
            self.ad_endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.ad_domain)
        )
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.authority())
    }

    pub fn device_code_endpoint(&self) -> String {
        format!("{}/oauth2/devicecode", self.authority())
    }

    pub fn is_common_tenant(&self) -> bool {
        self.ad_domain.eq_ignore_ascii_case(COMMON_TENANT)
    }
}

/// Lookup table of known environments, keyed case-insensitively by name.
///
/// Starts with the built-in public and China clouds; configuration may add or
/// replace entries.
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    environments: HashMap<String, AzureEnvironment>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            environments: HashMap::new(),
        };
        registry.insert(AzureEnvironment::azure_cloud());
        registry.insert(AzureEnvironment::azure_china_cloud());
        registry
    }

    /// Adds an environment, replacing any existing entry with the same name.
    pub fn insert(&mut self, environment: AzureEnvironment) {
        self.environments
            .insert(environment.name.to_lowercase(), environment);
    }

    pub fn get(&self, name: &str) -> Result<&AzureEnvironment, AuthError> {
        self.environments
            .get(&name.to_lowercase())
            .ok_or_else(|| AuthError::Configuration(format!("Unknown environment '{name}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .environments
            .values()
            .map(|env| env.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<AzureEnvironment> for EnvironmentRegistry {
    fn from_iter<I: IntoIterator<Item = AzureEnvironment>>(iter: I) -> Self {
        let mut registry = Self::new();
        for environment in iter {
            registry.insert(environment);
        }
        registry
    }
}
