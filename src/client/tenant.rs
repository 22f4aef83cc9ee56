//! Tenant-scoped APIs: registry credentials, AWS credentials and KMS keys.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Client, ClientError};

/// Docker registry credentials stored on a tenant.
///
/// These keys are lower-case on the wire, unlike most control-plane objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuploDockerCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub registry: String,
}

/// Just-in-time AWS credentials for a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploAwsCredentials {
    pub console_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub session_token: String,
}

/// An AWS KMS key usable by a tenant.
///
/// The tenant key endpoint fills `arn`/`description`, the plan key endpoint
/// fills `key_arn`/`key_name`. The client copies each pair across so both
/// are always set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploAwsKmsKey {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub arn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_arn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl DuploAwsKmsKey {
    fn with_tenant_aliases(mut self) -> Self {
        self.key_arn = self.arn.clone();
        self.key_name = self.description.clone();
        self
    }

    fn with_plan_aliases(mut self) -> Self {
        self.arn = self.key_arn.clone();
        self.description = self.key_name.clone();
        self
    }
}

/// Tenant-scoped control-plane APIs.
#[async_trait]
pub trait TenantApi: Send + Sync {
    /// Get the tenant's docker registry credentials, `None` if unset.
    async fn tenant_get_docker_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<Option<DuploDockerCredentials>, ClientError>;

    /// Replace the tenant's docker registry credentials.
    async fn tenant_update_docker_credentials(
        &self,
        tenant_id: &str,
        creds: &DuploDockerCredentials,
    ) -> Result<(), ClientError>;

    /// Get just-in-time AWS credentials for the tenant.
    async fn tenant_get_aws_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<DuploAwsCredentials, ClientError>;

    /// Get the tenant's own KMS key.
    async fn tenant_get_tenant_kms_key(&self, tenant_id: &str)
        -> Result<DuploAwsKmsKey, ClientError>;

    /// Get the KMS keys the tenant inherits from its plan.
    async fn tenant_get_plan_kms_keys(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploAwsKmsKey>, ClientError>;

    /// All keys usable by a tenant: the tenant key first, then every plan
    /// key that has an ID.
    async fn tenant_get_all_kms_keys(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploAwsKmsKey>, ClientError> {
        let tenant_key = self.tenant_get_tenant_kms_key(tenant_id).await?;
        let plan_keys = self.tenant_get_plan_kms_keys(tenant_id).await?;

        let mut all = Vec::with_capacity(plan_keys.len() + 1);
        all.push(tenant_key);
        all.extend(plan_keys.into_iter().filter(|k| !k.key_id.is_empty()));
        Ok(all)
    }

    /// Find a usable KMS key by name.
    async fn tenant_get_kms_key_by_name(
        &self,
        tenant_id: &str,
        key_name: &str,
    ) -> Result<Option<DuploAwsKmsKey>, ClientError> {
        let all = self.tenant_get_all_kms_keys(tenant_id).await?;
        Ok(all.into_iter().find(|k| k.key_name == key_name))
    }
}

#[async_trait]
impl TenantApi for Client {
    async fn tenant_get_docker_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<Option<DuploDockerCredentials>, ClientError> {
        let creds: Option<DuploDockerCredentials> = self
            .get_api(
                &format!("TenantGetDockerCredentials({})", tenant_id),
                &format!("subscriptions/{}/GetDockerRegistryCredentials", tenant_id),
            )
            .await?;
        Ok(creds.filter(|c| !c.username.is_empty()))
    }

    async fn tenant_update_docker_credentials(
        &self,
        tenant_id: &str,
        creds: &DuploDockerCredentials,
    ) -> Result<(), ClientError> {
        self.post_api_nil(
            &format!("TenantUpdateDockerCredentials({})", tenant_id),
            &format!("subscriptions/{}/UpdateDockerRegistryCredentials", tenant_id),
            creds,
        )
        .await
    }

    async fn tenant_get_aws_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<DuploAwsCredentials, ClientError> {
        self.get_api(
            &format!("TenantGetAwsCredentials({})", tenant_id),
            &format!("subscriptions/{}/GetAwsConsoleTokenUrl", tenant_id),
        )
        .await
    }

    async fn tenant_get_tenant_kms_key(
        &self,
        tenant_id: &str,
    ) -> Result<DuploAwsKmsKey, ClientError> {
        let key: DuploAwsKmsKey = self
            .get_api(
                &format!("TenantGetTenantKmsKey({})", tenant_id),
                &format!("subscriptions/{}/GetTenantKmsKey", tenant_id),
            )
            .await?;
        Ok(key.with_tenant_aliases())
    }

    async fn tenant_get_plan_kms_keys(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploAwsKmsKey>, ClientError> {
        let api_name = format!("TenantGetPlanKmsKeys({})", tenant_id);
        let list: Vec<DuploAwsKmsKey> = self
            .get_api(
                &api_name,
                &format!("subscriptions/{}/GetPlanKmsKeys", tenant_id),
            )
            .await?;
        trace!(api = %api_name, count = list.len(), "plan kms keys");
        Ok(list.into_iter().map(DuploAwsKmsKey::with_plan_aliases).collect())
    }
}
