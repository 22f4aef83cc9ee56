//! The DuploCloud provider: resource and data source dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::DuploApi;
use crate::config::ProviderConfig;
use crate::context::HandlerContext;
use crate::data_sources::{self, DataSourceHandler};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{self, ResourceHandler};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::state::ResourceData;
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

/// The DuploCloud provider.
///
/// Handlers need a control-plane client, which [`ProviderService::configure`]
/// installs. Until then every handler call fails with
/// [`ProviderError::NotConfigured`].
pub struct DuploProvider {
    resources: HashMap<&'static str, Arc<dyn ResourceHandler>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSourceHandler>>,
    ctx: RwLock<Option<HandlerContext>>,
    poll_interval: Option<Duration>,
}

impl DuploProvider {
    /// An unconfigured provider with every resource and data source registered.
    pub fn new() -> Self {
        Self {
            resources: resources::all().into_iter().map(|h| (h.type_name(), h)).collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|h| (h.type_name(), h))
                .collect(),
            ctx: RwLock::new(None),
            poll_interval: None,
        }
    }

    /// A provider already talking to `api`.
    pub fn with_api(api: Arc<dyn DuploApi>) -> Self {
        let provider = Self::new();
        Self {
            ctx: RwLock::new(Some(HandlerContext::new(api))),
            ..provider
        }
    }

    /// Override how often waits poll the control plane.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        let ctx = self.ctx.get_mut();
        *ctx = ctx.take().map(|c| c.with_poll_interval(interval));
        self
    }

    async fn context(&self) -> Result<HandlerContext, ProviderError> {
        self.ctx.read().await.clone().ok_or_else(|| {
            ProviderError::NotConfigured("configure must be called before using the provider".into())
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn ResourceHandler>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSourceHandler>, ProviderError> {
        self.data_sources.get(data_source_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!("Unknown data source type: {}", data_source_type))
        })
    }
}

impl Default for DuploProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn rendered(mut schema: Schema) -> Schema {
    schema.block.render_descriptions();
    schema
}

#[async_trait::async_trait]
impl ProviderService for DuploProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(rendered(ProviderConfig::schema()));
        for (name, handler) in &self.resources {
            schema = schema.with_resource(*name, rendered(handler.schema()));
        }
        for (name, handler) in &self.data_sources {
            schema = schema.with_data_source(*name, rendered(handler.schema()));
        }
        schema
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diags = validation::validate(&ProviderConfig::schema(), &config);
        let parsed = ProviderConfig::from_value(config)?;
        diags.extend(parsed.diagnostics());
        Ok(diags)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::from_value(config)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        if config.host().is_none() || config.token().is_none() {
            return Ok(vec![Diagnostic::error("Unable to create DuploCloud client").with_detail(
                "Both duplo_host and duplo_token must be set, either in the provider block or \
                 through the duplo_host and duplo_token environment variables.",
            )]);
        }

        let client = match config.build_client() {
            Ok(client) => client,
            Err(err) => {
                return Ok(vec![
                    Diagnostic::error("Unable to create DuploCloud client").with_detail(err.to_string())
                ])
            },
        };

        let interval = self.poll_interval.unwrap_or_else(|| config.poll_interval());
        let ctx = HandlerContext::new(Arc::new(client)).with_poll_interval(interval);
        *self.ctx.write().await = Some(ctx);
        info!(host = %config.host().unwrap_or_default(), "provider configured");
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.resource(resource_type)?;
        Ok(validation::validate(&handler.schema(), &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let handler = self.resource(resource_type)?;
        plan_resource(handler.as_ref(), prior_state, proposed_state)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context().await?;
        debug!(resource_type, "create");
        let state = handler
            .create(&ctx, ResourceData::from_value(planned_state))
            .await?;
        Ok(state.into_value())
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context().await?;
        debug!(resource_type, "read");
        let state = handler
            .read(&ctx, ResourceData::from_value(current_state))
            .await?;
        if state.is_none() {
            debug!(resource_type, "resource is gone, removing from state");
        }
        Ok(state.map(ResourceData::into_value))
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context().await?;
        debug!(resource_type, "update");
        let state = handler
            .update(
                &ctx,
                ResourceData::from_value(prior_state),
                ResourceData::from_value(planned_state),
            )
            .await?;
        Ok(state.into_value())
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context().await?;
        debug!(resource_type, "delete");
        handler
            .delete(&ctx, ResourceData::from_value(current_state))
            .await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let handler = self.resource(resource_type)?;
        if !handler.importable() {
            return Err(ProviderError::Unimplemented(format!(
                "Import not supported for resource type: {}",
                resource_type
            )));
        }
        Ok(vec![ImportedResource::new(resource_type, json!({ "id": id }))])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.data_source(data_source_type)?;
        Ok(validation::validate(&handler.schema(), &config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let handler = self.data_source(data_source_type)?;
        let ctx = self.context().await?;
        debug!(data_source_type, "read data source");

        let mut config = ResourceData::from_value(config);
        config.apply_defaults(&handler.schema().block);
        let state = handler.read(&ctx, config).await?;
        Ok(state.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeDuploApi;
    use crate::client::tenant::DuploDockerCredentials;
    use crate::testing::{assert_error_contains, assert_no_errors};
    use tokio_test::{assert_err, assert_ok};

    const TENANT: &str = "2f0e4b1c-7d3a-4c5e-9f61-0a8b2c3d4e5f";

    fn provider() -> (Arc<FakeDuploApi>, DuploProvider) {
        let api = Arc::new(FakeDuploApi::new());
        let provider = DuploProvider::with_api(api.clone()).with_poll_interval(Duration::from_millis(1));
        (api, provider)
    }

    #[test]
    fn test_registers_every_type() {
        let metadata = DuploProvider::new().metadata();
        assert_eq!(
            metadata.resources,
            vec![
                "duplocloud_aws_lb_target_group",
                "duplocloud_docker_credentials",
                "duplocloud_duplo_service",
            ]
        );
        assert_eq!(
            metadata.data_sources,
            vec![
                "duplocloud_aws_lb_target_groups",
                "duplocloud_native_hosts",
                "duplocloud_plan_kms_key_v2",
                "duplocloud_plan_kms_v2",
                "duplocloud_tenant_aws_credentials",
                "duplocloud_tenant_aws_kms_key",
                "duplocloud_tenant_aws_kms_keys",
            ]
        );
    }

    #[test]
    fn test_schema_renders_defaults_into_descriptions() {
        let schema = DuploProvider::new().schema();
        let timeout = schema.provider.attribute("http_timeout").unwrap();
        assert!(timeout
            .description
            .as_deref()
            .unwrap()
            .ends_with("Defaults to `30`."));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = DuploProvider::new();
        let err = assert_err!(
            provider
                .read("duplocloud_docker_credentials", json!({"id": TENANT}))
                .await
        );
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        // Planning needs no client.
        assert_ok!(
            provider
                .plan("duplocloud_docker_credentials", None, json!({"tenant_id": TENANT}), Value::Null)
                .await
        );
    }

    #[tokio::test]
    async fn test_configure_with_host_and_token() {
        let provider = DuploProvider::new();
        let diags = assert_ok!(
            provider
                .configure(json!({"duplo_host": "https://duplo.example.com", "duplo_token": "t0k"}))
                .await
        );
        assert_no_errors(&diags);
        assert_ok!(provider.context().await);
    }

    #[tokio::test]
    async fn test_configure_with_unset_optional_attributes() {
        let provider = DuploProvider::new();
        let block = json!({
            "duplo_host": "https://duplo.example.com",
            "duplo_token": "t0k",
            "ssl_no_verify": null,
            "http_timeout": null,
            "poll_interval_ms": null
        });

        let diags = assert_ok!(provider.validate_provider_config(block.clone()).await);
        assert_no_errors(&diags);
        let diags = assert_ok!(provider.configure(block).await);
        assert_no_errors(&diags);
        assert_ok!(provider.context().await);
    }

    #[tokio::test]
    async fn test_configure_without_credentials() {
        let from_env = ["duplo_host", "DUPLO_HOST", "duplo_token", "DUPLO_TOKEN"]
            .iter()
            .any(|name| std::env::var(name).is_ok());
        if from_env {
            return;
        }

        let provider = DuploProvider::new();
        let diags = assert_ok!(provider.configure(Value::Null).await);
        assert_error_contains(&diags, "Unable to create DuploCloud client");
        assert!(diags[0].detail.as_deref().unwrap().contains("environment variables"));
        assert!(provider.context().await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let (_, provider) = provider();

        let err = assert_err!(provider.create("duplocloud_widget", json!({})).await);
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = assert_err!(provider.read_data_source("duplocloud_widget", json!({})).await);
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let (_, provider) = provider();
        let diags = assert_ok!(
            provider
                .validate_resource_config(
                    "duplocloud_docker_credentials",
                    json!({"tenant_id": "not-a-guid", "user_name": "u", "password": "p"})
                )
                .await
        );
        assert_eq!(diags.len(), 2);
    }

    #[tokio::test]
    async fn test_import_then_read() {
        let (api, provider) = provider();
        api.set_docker_credentials(
            TENANT,
            DuploDockerCredentials {
                username: "robot".into(),
                password: "pw".into(),
                email: "robot@example.com".into(),
                registry: String::new(),
            },
        );

        let imported = assert_ok!(provider.import_resource("duplocloud_docker_credentials", TENANT).await);
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state, json!({"id": TENANT}));

        let state = assert_ok!(
            provider
                .read("duplocloud_docker_credentials", imported[0].state.clone())
                .await
        )
        .unwrap();
        assert_eq!(state["user_name"], json!("robot"));
    }

    #[tokio::test]
    async fn test_read_gone_resource_is_none() {
        let (_, provider) = provider();
        let state = assert_ok!(
            provider
                .read("duplocloud_docker_credentials", json!({"id": TENANT}))
                .await
        );
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_data_source_defaults_applied() {
        let (api, provider) = provider();
        api.set_tenant_kms_key(TENANT, FakeDuploApi::kms_key("tenant-key", "k1"));

        let state = assert_ok!(
            provider
                .read_data_source("duplocloud_tenant_aws_kms_keys", json!({"tenant_id": TENANT}))
                .await
        );
        assert_eq!(state["selectable"], json!(true));
        assert_eq!(state["keys"][0]["key_id"], json!("k1"));
    }
}
