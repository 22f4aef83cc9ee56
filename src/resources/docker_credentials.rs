use tracing::trace;

use crate::client::tenant::DuploDockerCredentials;
use crate::context::HandlerContext;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;
use crate::ProviderError;

use super::{tenant_id_attribute, ResourceHandler};

/// `duplocloud_docker_credentials`: a tenant's docker registry credentials.
///
/// The tenant ID doubles as the resource ID since a tenant has one set.
pub struct DockerCredentials;

impl DockerCredentials {
    async fn put(&self, ctx: &HandlerContext, planned: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = planned.required_str("tenant_id")?.to_string();
        trace!(tenant_id = %tenant_id, "docker credentials create or update: start");

        let creds = DuploDockerCredentials {
            username: planned.get_str("user_name").to_string(),
            password: planned.get_str("password").to_string(),
            email: planned.get_str("email").to_string(),
            registry: planned.get_str("registry").to_string(),
        };
        ctx.api()
            .tenant_update_docker_credentials(&tenant_id, &creds)
            .await?;

        let mut state = planned;
        state.set_id(tenant_id.as_str());
        let state = self.read(ctx, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "docker credentials for tenant {} vanished after being set",
                tenant_id
            ))
        })?;
        trace!(tenant_id = %tenant_id, "docker credentials create or update: end");
        Ok(state)
    }
}

#[async_trait::async_trait]
impl ResourceHandler for DockerCredentials {
    fn type_name(&self) -> &'static str {
        "duplocloud_docker_credentials"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "`duplocloud_docker_credentials` manages the docker credentials for the tenant in Duplo.\n\n\
                 This resource allows you take control of docker registry credentials for a specific tenant.",
            )
            .with_attribute("tenant_id", tenant_id_attribute("docker credentials"))
            .with_attribute("user_name", Attribute::required_string())
            .with_attribute("password", Attribute::required_string().sensitive())
            .with_attribute("email", Attribute::required_string())
            .with_attribute("registry", Attribute::optional_computed_string())
    }

    async fn create(&self, ctx: &HandlerContext, planned: ResourceData) -> Result<ResourceData, ProviderError> {
        self.put(ctx, planned).await
    }

    async fn read(&self, ctx: &HandlerContext, state: ResourceData) -> Result<Option<ResourceData>, ProviderError> {
        let tenant_id = state.id().to_string();
        trace!(tenant_id = %tenant_id, "docker credentials read: start");

        let Some(creds) = ctx.api().tenant_get_docker_credentials(&tenant_id).await? else {
            return Ok(None);
        };
        if creds.username.is_empty() {
            return Ok(None);
        }

        let mut state = state;
        state.set("tenant_id", &tenant_id)?;
        state.set("user_name", &creds.username)?;
        state.set("email", &creds.email)?;
        state.set("password", &creds.password)?;
        state.set("registry", &creds.registry)?;
        trace!(tenant_id = %tenant_id, "docker credentials read: end");
        Ok(Some(state))
    }

    async fn update(
        &self,
        ctx: &HandlerContext,
        _prior: ResourceData,
        planned: ResourceData,
    ) -> Result<ResourceData, ProviderError> {
        self.put(ctx, planned).await
    }

    async fn delete(&self, ctx: &HandlerContext, state: ResourceData) -> Result<(), ProviderError> {
        let tenant_id = state.required_str("tenant_id")?;
        trace!(tenant_id = %tenant_id, "docker credentials delete");
        ctx.api()
            .tenant_update_docker_credentials(tenant_id, &DuploDockerCredentials::default())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeDuploApi;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    const TENANT: &str = "2f0e4b1c-7d3a-4c5e-9f61-0a8b2c3d4e5f";

    fn setup() -> (Arc<FakeDuploApi>, HandlerContext) {
        let api = Arc::new(FakeDuploApi::new());
        let ctx = HandlerContext::new(api.clone());
        (api, ctx)
    }

    fn planned() -> ResourceData {
        ResourceData::from_value(json!({
            "tenant_id": TENANT,
            "user_name": "robot",
            "password": "hunter2",
            "email": "robot@example.com",
            "registry": null
        }))
    }

    #[tokio::test]
    async fn test_create_sets_credentials_and_id() {
        let (api, ctx) = setup();

        let state = assert_ok!(DockerCredentials.create(&ctx, planned()).await);

        assert_eq!(state.id(), TENANT);
        assert_eq!(state.get_str("user_name"), "robot");
        assert_eq!(state.get_str("registry"), "");
        let stored = api.docker_credentials(TENANT).unwrap();
        assert_eq!(stored.password, "hunter2");
        assert_eq!(stored.email, "robot@example.com");
    }

    #[tokio::test]
    async fn test_read_missing_credentials() {
        let (api, ctx) = setup();
        api.set_docker_credentials(TENANT, DuploDockerCredentials::default());

        let state = ResourceData::from_value(json!({"id": TENANT}));
        assert!(assert_ok!(DockerCredentials.read(&ctx, state).await).is_none());
    }

    #[tokio::test]
    async fn test_import_by_tenant_id_fills_state() {
        let (api, ctx) = setup();
        api.set_docker_credentials(
            TENANT,
            DuploDockerCredentials {
                username: "robot".into(),
                password: "pw".into(),
                email: "robot@example.com".into(),
                registry: "registry.example.com".into(),
            },
        );

        let state = ResourceData::from_value(json!({"id": TENANT}));
        let state = assert_ok!(DockerCredentials.read(&ctx, state).await).unwrap();
        assert_eq!(state.get_str("tenant_id"), TENANT);
        assert_eq!(state.get_str("registry"), "registry.example.com");
    }

    #[tokio::test]
    async fn test_delete_clears_credentials() {
        let (api, ctx) = setup();
        let state = assert_ok!(DockerCredentials.create(&ctx, planned()).await);

        assert_ok!(DockerCredentials.delete(&ctx, state.clone()).await);

        assert_eq!(api.docker_credentials(TENANT), Some(DuploDockerCredentials::default()));
        assert!(assert_ok!(DockerCredentials.read(&ctx, state).await).is_none());
    }

    #[tokio::test]
    async fn test_api_errors_propagate() {
        let (api, ctx) = setup();
        api.fail_with("tenant_update_docker_credentials", 500);

        let err = assert_err!(DockerCredentials.create(&ctx, planned()).await);
        assert!(matches!(err, ProviderError::Api(_)));
        assert!(err.message().contains("status: 500"));
    }
}
