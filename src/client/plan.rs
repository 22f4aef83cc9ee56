//! Infrastructure plans and their KMS keys.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Client, ClientError};

/// A KMS key registered on a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploPlanKmsKeyInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_arn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_id: String,
}

/// The parts of a plan this provider reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploPlan {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_infos: Option<Vec<DuploPlanKmsKeyInfo>>,
}

/// Plan APIs.
#[async_trait]
pub trait PlanApi: Send + Sync {
    /// List every plan (legacy admin endpoint).
    async fn plan_get_list(&self) -> Result<Vec<DuploPlan>, ClientError>;

    /// List the KMS keys of a plan.
    async fn plan_kms_get_list(&self, plan_id: &str)
        -> Result<Vec<DuploPlanKmsKeyInfo>, ClientError>;

    /// Get one KMS key of a plan by name.
    async fn plan_get_kms_key(
        &self,
        plan_id: &str,
        name: &str,
    ) -> Result<DuploPlanKmsKeyInfo, ClientError>;

    /// Find a plan by name, `None` when it does not exist.
    async fn plan_get(&self, name: &str) -> Result<Option<DuploPlan>, ClientError> {
        let all = self.plan_get_list().await?;
        Ok(all.into_iter().find(|p| p.name == name))
    }
}

#[async_trait]
impl PlanApi for Client {
    async fn plan_get_list(&self) -> Result<Vec<DuploPlan>, ClientError> {
        let list: Option<Vec<DuploPlan>> =
            self.get_api("PlanGetList()", "adminproxy/GetPlans").await?;
        Ok(list.unwrap_or_default())
    }

    async fn plan_kms_get_list(
        &self,
        plan_id: &str,
    ) -> Result<Vec<DuploPlanKmsKeyInfo>, ClientError> {
        let list: Option<Vec<DuploPlanKmsKeyInfo>> = self
            .get_api(
                &format!("PlanKMSGetList({})", plan_id),
                &format!("v3/admin/plans/{}/kmsKeys", plan_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    async fn plan_get_kms_key(
        &self,
        plan_id: &str,
        name: &str,
    ) -> Result<DuploPlanKmsKeyInfo, ClientError> {
        self.get_api(
            &format!("PlanGetKMSKey({}, {})", plan_id, name),
            &format!("v3/admin/plans/{}/kmsKeys/{}", plan_id, name),
        )
        .await
    }
}
