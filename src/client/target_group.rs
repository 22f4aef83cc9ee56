//! AWS load balancer target groups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::DuploStringValue;
use super::{Client, ClientError};

/// Health check matcher codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploTargetGroupMatcher {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_code: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub grpc_code: String,
}

/// A target group managed through the v3 API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploTargetGroup {
    pub health_check_enabled: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub health_check_interval_seconds: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub health_check_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub health_check_port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_protocol: Option<DuploStringValue>,
    #[serde(skip_serializing_if = "is_zero")]
    pub health_check_timeout_seconds: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub healthy_threshold_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address_type: Option<DuploStringValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_balancer_arns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<DuploTargetGroupMatcher>,
    #[serde(skip_serializing_if = "is_zero")]
    pub port: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<DuploStringValue>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_group_arn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_group_name: String,
    pub target_type: Option<DuploStringValue>,
    #[serde(skip_serializing_if = "is_zero")]
    pub unhealthy_threshold_count: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// The health-check fields that can change in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploTargetGroupUpdateReq {
    pub health_check_enabled: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub health_check_interval_seconds: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub health_check_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub health_check_port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_protocol: Option<DuploStringValue>,
    #[serde(skip_serializing_if = "is_zero")]
    pub health_check_timeout_seconds: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub healthy_threshold_count: i64,
    pub target_group_arn: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub unhealthy_threshold_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<DuploTargetGroupMatcher>,
}

/// Matcher as reported by the legacy tenant listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploHealthMatcher {
    pub http_code: String,
    pub grpc_code: String,
}

/// A target group as reported by the legacy tenant listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploAwsLbTargetGroup {
    pub target_group_arn: String,
    pub target_group_name: String,
    pub protocol_version: String,
    pub load_balancer_arns: Vec<String>,
    pub vpc_id: String,
    pub protocol: Option<DuploStringValue>,
    pub target_type: Option<DuploStringValue>,
    pub health_check_enabled: bool,
    pub health_check_path: String,
    pub health_check_interval_seconds: i64,
    pub health_check_timeout_seconds: i64,
    pub healthy_threshold: i64,
    pub unhealthy_threshold: i64,
    pub health_check_protocol: Option<DuploStringValue>,
    pub health_matcher: Option<DuploHealthMatcher>,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Target group APIs.
#[async_trait]
pub trait TargetGroupApi: Send + Sync {
    /// Create a target group.
    async fn target_group_create(
        &self,
        tenant_id: &str,
        rq: &DuploTargetGroup,
    ) -> Result<(), ClientError>;

    /// Update a target group's health check.
    async fn target_group_update(
        &self,
        tenant_id: &str,
        name: &str,
        rq: &DuploTargetGroupUpdateReq,
    ) -> Result<(), ClientError>;

    /// Get a target group by its full name, `None` when the API reports 404.
    async fn target_group_get(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<DuploTargetGroup>, ClientError>;

    /// Delete a target group by its full name.
    async fn target_group_delete(&self, tenant_id: &str, name: &str) -> Result<(), ClientError>;

    /// List every application load balancer target group in a tenant.
    async fn tenant_list_lb_target_groups(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploAwsLbTargetGroup>, ClientError>;
}

#[async_trait]
impl TargetGroupApi for Client {
    async fn target_group_create(
        &self,
        tenant_id: &str,
        rq: &DuploTargetGroup,
    ) -> Result<(), ClientError> {
        let _: DuploTargetGroup = self
            .post_api(
                &format!("DuploTargetGroupCreate({}, {})", tenant_id, rq.target_group_name),
                &format!("v3/subscriptions/{}/aws/lbTargetGroup", tenant_id),
                rq,
            )
            .await?;
        Ok(())
    }

    async fn target_group_update(
        &self,
        tenant_id: &str,
        name: &str,
        rq: &DuploTargetGroupUpdateReq,
    ) -> Result<(), ClientError> {
        let _: DuploTargetGroup = self
            .put_api(
                &format!("DuploTargetGroupUpdate({}, {})", tenant_id, name),
                &format!("v3/subscriptions/{}/aws/lbTargetGroup", tenant_id),
                rq,
            )
            .await?;
        Ok(())
    }

    async fn target_group_get(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<DuploTargetGroup>, ClientError> {
        let result = self
            .get_api(
                &format!("DuploTargetGroupGet({}, {})", tenant_id, name),
                &format!("v3/subscriptions/{}/aws/lbTargetGroup/{}", tenant_id, name),
            )
            .await;
        match result {
            Ok(tg) => Ok(Some(tg)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn target_group_delete(&self, tenant_id: &str, name: &str) -> Result<(), ClientError> {
        self.delete_api(
            &format!("DuploTargetGroupDelete({}, {})", tenant_id, name),
            &format!("v3/subscriptions/{}/aws/lbTargetGroup/{}", tenant_id, name),
        )
        .await
    }

    async fn tenant_list_lb_target_groups(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploAwsLbTargetGroup>, ClientError> {
        let list: Option<Vec<DuploAwsLbTargetGroup>> = self
            .get_api(
                &format!("TenantListApplicationLbTargetGroups({})", tenant_id),
                &format!("subscriptions/{}/ListApplicationLbTargetGroups", tenant_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }
}
