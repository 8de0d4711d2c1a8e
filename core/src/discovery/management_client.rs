use crate::environment::AzureEnvironment;
use crate::error::DiscoveryError;
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const API_VERSION_TENANTS: &str = "2016-06-01";
const API_VERSION_SUBSCRIPTIONS: &str = "2016-06-01";
const SERVICE_MANAGEMENT_VERSION: &str = "2013-08-01";
const MAX_PAGES: usize = 1000;

/// Tenant entry returned by the resource-manager tenant listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantIdDescription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
}

/// Subscription entry returned by the resource-manager subscription listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceManagerSubscription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Subscription entry returned by the classic subscription listing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClassicSubscription {
    #[serde(rename = "SubscriptionID")]
    pub subscription_id: String,
    #[serde(rename = "SubscriptionName")]
    pub subscription_name: String,
    #[serde(rename = "SubscriptionStatus", default)]
    pub subscription_status: Option<String>,
    #[serde(rename = "ActiveDirectoryTenantID", default)]
    pub active_directory_tenant_id: Option<String>,
}

impl ClassicSubscription {
    /// Owning tenant, ignoring the empty element the API emits for
    /// certificate-only subscriptions.
    pub fn tenant_id(&self) -> Option<&str> {
        self.active_directory_tenant_id
            .as_deref()
            .map(str::trim)
            .filter(|tenant| !tenant.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ClassicSubscriptionList {
    #[serde(rename = "Subscription", default)]
    subscriptions: Vec<ClassicSubscription>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

/// HTTP client for the tenant and subscription listing endpoints.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone, Default)]
pub struct ManagementClient {
    client: reqwest::Client,
}

impl ManagementClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// List every tenant the bearer of `token` belongs to
    pub async fn list_tenants(
        &self,
        environment: &AzureEnvironment,
        token: &str,
    ) -> Result<Vec<TenantIdDescription>, DiscoveryError> {
        let url = environment
            .resource_manager_url(&format!("tenants?api-version={API_VERSION_TENANTS}"));
        self.get_all_pages(url, token, "list_tenants").await
    }

    /// List resource-manager subscriptions visible to a tenant-scoped token
    pub async fn list_subscriptions(
        &self,
        environment: &AzureEnvironment,
        token: &str,
    ) -> Result<Vec<ResourceManagerSubscription>, DiscoveryError> {
        let url = environment.resource_manager_url(&format!(
            "subscriptions?api-version={API_VERSION_SUBSCRIPTIONS}"
        ));
        self.get_all_pages(url, token, "list_subscriptions").await
    }

    /// List classic subscriptions visible to a common-tenant token
    pub async fn list_classic_subscriptions(
        &self,
        environment: &AzureEnvironment,
        token: &str,
    ) -> Result<Vec<ClassicSubscription>, DiscoveryError> {
        const OPERATION: &str = "list_classic_subscriptions";
        let url = environment.service_management_url("subscriptions");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("x-ms-version", SERVICE_MANAGEMENT_VERSION)
            .header(ACCEPT, "application/xml")
            .send()
            .await
            .map_err(|e| DiscoveryError::request_failed(OPERATION, e))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::from_response(response, OPERATION).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| DiscoveryError::request_failed(OPERATION, e))?;

        parse_classic_subscriptions(&body)
            .map_err(|e| DiscoveryError::invalid_response(OPERATION, e))
    }

    /// Follows `nextLink` until the listing is exhausted.
    ///
    /// Links must stay on the origin of the first page and may not repeat,
    /// so the bearer token is only ever sent to the listing endpoint.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first_page: String,
        token: &str,
        operation: &str,
    ) -> Result<Vec<T>, DiscoveryError> {
        let first_url = Url::parse(&first_page)
            .map_err(|e| DiscoveryError::invalid_response(operation, e))?;
        let mut visited = HashSet::new();
        let mut items = Vec::new();
        let mut next = Some(first_page);

        while let Some(url) = next.take() {
            if visited.len() >= MAX_PAGES {
                return Err(DiscoveryError::invalid_response(
                    operation,
                    format!("listing exceeded {MAX_PAGES} pages"),
                ));
            }
            visited.insert(url.clone());

            log::debug!("{operation}: GET {url}");
            let response = self
                .client
                .get(&url)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .send()
                .await
                .map_err(|e| DiscoveryError::request_failed(operation, e))?;

            if !response.status().is_success() {
                return Err(DiscoveryError::from_response(response, operation).await);
            }

            let page: ListResponse<T> = response
                .json()
                .await
                .map_err(|e| DiscoveryError::invalid_response(operation, e))?;

            items.extend(page.value);
            next = match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => Some(
                    validate_next_link(&first_url, &visited, link)
                        .map_err(|reason| DiscoveryError::invalid_response(operation, reason))?,
                ),
                None => None,
            };
        }

        Ok(items)
    }
}

fn validate_next_link(
    first_page: &Url,
    visited: &HashSet<String>,
    link: String,
) -> Result<String, String> {
    let parsed = Url::parse(&link).map_err(|e| format!("invalid nextLink '{link}': {e}"))?;
    if parsed.origin() != first_page.origin() {
        return Err(format!("nextLink '{link}' leaves the listing endpoint"));
    }
    if visited.contains(&link) {
        return Err(format!("nextLink '{link}' was already visited"));
    }
    Ok(link)
}

fn parse_classic_subscriptions(
    body: &str,
) -> Result<Vec<ClassicSubscription>, quick_xml::de::DeError> {
    let list: ClassicSubscriptionList = quick_xml::de::from_str(body)?;
    Ok(list.subscriptions)
}
