use super::management_client::ManagementClient;
use crate::auth::AccessToken;
use crate::environment::AzureEnvironment;
use crate::error::DiscoveryError;

/// Lists the tenants a principal belongs to.
#[derive(Debug, Clone, Default)]
pub struct TenantEnumerator {
    client: ManagementClient,
}

impl TenantEnumerator {
    pub fn new(client: ManagementClient) -> Self {
        Self { client }
    }

    /// Returns the id of every resource-manager tenant visible to `token`.
    ///
    /// An empty list is a valid answer: the principal may belong to no
    /// resource-manager tenant at all.
    pub async fn list_tenants(
        &self,
        environment: &AzureEnvironment,
        token: &AccessToken,
    ) -> Result<Vec<String>, DiscoveryError> {
        let tenants = self
            .client
            .list_tenants(environment, token.secret())
            .await?;

        let mut tenant_ids: Vec<String> = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            if !tenant_ids
                .iter()
                .any(|known| known.eq_ignore_ascii_case(&tenant.tenant_id))
            {
                tenant_ids.push(tenant.tenant_id);
            }
        }

        log::debug!(
            "Found {} tenant(s) for {} in {}",
            tenant_ids.len(),
            token.user_id,
            environment.name
        );
        Ok(tenant_ids)
    }
}
