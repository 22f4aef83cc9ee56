//! Drive a [`ProviderService`] through the call sequences the host uses.
//!
//! [`ProviderTester`] chains plan, apply and refresh the same way a host
//! run does, so a test can go from configuration to final state in one
//! call. The `assert_*` functions check plans and diagnostics.
//!
//! # Example
//!
//! ```ignore
//! use duplocloud_provider::testing::ProviderTester;
//! use duplocloud_provider::DuploProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_docker_credentials() {
//!     let tester = ProviderTester::new(DuploProvider::new());
//!     tester
//!         .configure(json!({"duplo_host": "https://duplo.example.com", "duplo_token": "..."}))
//!         .await
//!         .unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("duplocloud_docker_credentials", json!({
//!             "tenant_id": "2f0e4b1c-7d3a-4c5e-9f61-0a8b2c3d4e5f",
//!             "user_name": "robot",
//!             "password": "secret",
//!             "email": "robot@example.com"
//!         }))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["user_name"], "robot");
//! }
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity};
use crate::service::ProviderService;
use crate::types::PlanResult;

/// A host run reduced to method calls.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Configure the provider. Error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        errors_to_result(self.provider.configure(config).await?)
    }

    /// Validate a resource configuration. Error diagnostics become
    /// [`TestError::Diagnostics`].
    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        errors_to_result(self.provider.validate_resource_config(resource_type, config).await?)
    }

    /// Plan a new resource from its configuration.
    pub async fn plan_create(&self, resource_type: &str, config: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan a change from `prior` toward `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), config.clone(), config)
            .await
    }

    /// Plan the removal of a resource.
    pub async fn plan_delete(&self, resource_type: &str, prior: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), Value::Null, Value::Null)
            .await
    }

    /// Refresh a resource. `None` means it is gone.
    pub async fn read(&self, resource_type: &str, state: Value) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    /// Refresh a resource that must still exist.
    pub async fn read_existing(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.read(resource_type, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} disappeared after apply", resource_type)))
    }

    /// Read a data source.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Import by ID and refresh every imported object, as `terraform import`
    /// does.
    pub async fn import_and_read(&self, resource_type: &str, id: &str) -> Result<Vec<Value>, ProviderError> {
        let mut states = Vec::new();
        for imported in self.provider.import_resource(resource_type, id).await? {
            states.push(self.read_existing(&imported.resource_type, imported.state).await?);
        }
        Ok(states)
    }

    /// Plan, create, then refresh.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.provider.create(resource_type, plan.planned_state).await?;
        self.read_existing(resource_type, created).await
    }

    /// Plan, update in place, then refresh.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_update(resource_type, prior.clone(), config).await?;
        let updated = self
            .provider
            .update(resource_type, prior, plan.planned_state)
            .await?;
        self.read_existing(resource_type, updated).await
    }

    /// Plan the removal, then delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, state.clone()).await?;
        self.provider.delete(resource_type, state).await
    }

    /// Create from `initial`, update to `updated`, then delete. Returns the
    /// state seen after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial).await?;
        let state = self.lifecycle_update(resource_type, created, updated).await?;
        self.lifecycle_delete(resource_type, state.clone()).await?;
        Ok(state)
    }
}

/// Why a tester call failed.
#[derive(Debug, Error)]
pub enum TestError {
    /// The provider answered with error diagnostics.
    #[error("{}", describe_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The provider returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn describe_diagnostics(diags: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diags.len());
    for diag in diags {
        out.push_str("\n  ");
        out.push_str(&diag.summary);
        if let Some(detail) = &diag.detail {
            out.push_str(": ");
            out.push_str(detail);
        }
        if let Some(attr) = &diag.attribute {
            out.push_str(&format!(" (at {})", attr));
        }
    }
    out
}

fn is_error(diag: &Diagnostic) -> bool {
    matches!(diag.severity, DiagnosticSeverity::Error)
}

fn errors_to_result(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<Diagnostic> = diagnostics.into_iter().filter(is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Panics unless the plan creates the resource.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "create plan has no changes");
    assert!(!plan.requires_replace, "create plan asks for replacement");
}

/// Panics if the plan changes anything.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(plan.is_no_op(), "expected no changes, got {:?}", changed_paths(plan));
}

/// Panics unless the plan replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected replacement, plan changes {:?} in place",
        changed_paths(plan)
    );
}

/// Panics unless the plan changes something without replacing.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.is_no_op(), "expected an in-place update, got no changes");
    assert!(!plan.requires_replace, "expected an in-place update, got replacement");
}

/// Panics unless the plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths = changed_paths(plan);
    assert!(paths.contains(&path), "'{}' unchanged, plan changes {:?}", path, paths);
}

/// Panics if the plan changes `path`.
pub fn assert_plan_keeps_attribute(plan: &PlanResult, path: &str) {
    assert!(!changed_paths(plan).contains(&path), "'{}' changed", path);
}

/// Panics on any error diagnostic.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| is_error(d))
        .map(|d| d.summary.as_str())
        .collect();
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

/// Panics unless some error diagnostic's summary contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| is_error(d))
        .map(|d| d.summary.as_str())
        .collect();
    assert!(
        errors.iter().any(|s| s.contains(needle)),
        "no error mentions '{}': {:?}",
        needle,
        errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeDuploApi;
    use crate::DuploProvider;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const TENANT: &str = "2f0e4b1c-7d3a-4c5e-9f61-0a8b2c3d4e5f";
    const DOCKER: &str = "duplocloud_docker_credentials";

    fn tester() -> (Arc<FakeDuploApi>, ProviderTester<DuploProvider>) {
        let api = Arc::new(FakeDuploApi::new());
        let provider = DuploProvider::with_api(api.clone()).with_poll_interval(Duration::from_millis(1));
        (api, ProviderTester::new(provider))
    }

    fn credentials(password: &str) -> Value {
        json!({
            "tenant_id": TENANT,
            "user_name": "robot",
            "password": password,
            "email": "robot@example.com"
        })
    }

    #[test]
    fn test_type_listings() {
        let (_, tester) = tester();
        assert!(tester.resource_types().contains(&DOCKER.to_string()));
        assert!(tester
            .data_source_types()
            .contains(&"duplocloud_native_hosts".to_string()));
    }

    #[tokio::test]
    async fn test_validation_errors_surface_as_diagnostics() {
        let (_, tester) = tester();
        let err = assert_err!(
            tester
                .validate_resource_config(DOCKER, json!({"tenant_id": TENANT}))
                .await
        );
        assert!(matches!(err, TestError::Diagnostics(ref diags) if diags.len() == 3));
    }

    #[tokio::test]
    async fn test_plans_for_create_update_and_replace() {
        let (_, tester) = tester();
        let plan = assert_ok!(tester.plan_create(DOCKER, credentials("pw")).await);
        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "password");

        let state = assert_ok!(tester.lifecycle_create(DOCKER, credentials("pw")).await);

        let plan = assert_ok!(tester.plan_update(DOCKER, state.clone(), credentials("pw2")).await);
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "password");
        assert_plan_keeps_attribute(&plan, "tenant_id");

        let mut moved = credentials("pw");
        moved["tenant_id"] = json!("9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d");
        let plan = assert_ok!(tester.plan_update(DOCKER, state.clone(), moved).await);
        assert_plan_replaces(&plan);

        let plan = assert_ok!(tester.plan_update(DOCKER, state, credentials("pw")).await);
        assert_plan_no_changes(&plan);
    }

    #[tokio::test]
    async fn test_lifecycle_crud_leaves_nothing_behind() {
        let (api, tester) = tester();
        let state = assert_ok!(
            tester
                .lifecycle_crud(DOCKER, credentials("pw"), credentials("pw2"))
                .await
        );

        assert_eq!(state["password"], "pw2");
        assert_eq!(state["id"], TENANT);
        assert!(api.docker_credentials(TENANT).unwrap().username.is_empty());
        assert!(assert_ok!(tester.read(DOCKER, state).await).is_none());
    }

    #[tokio::test]
    async fn test_import_and_read() {
        let (_, tester) = tester();
        assert_ok!(tester.lifecycle_create(DOCKER, credentials("pw")).await);

        let states = assert_ok!(tester.import_and_read(DOCKER, TENANT).await);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0]["user_name"], "robot");
    }

    #[tokio::test]
    async fn test_read_existing_reports_gone() {
        let (_, tester) = tester();
        let err = assert_err!(tester.read_existing(DOCKER, json!({"id": TENANT})).await);
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_data_source() {
        let (api, tester) = tester();
        api.set_tenant_kms_key(TENANT, FakeDuploApi::kms_key("tenant-key", "k1"));

        let state = assert_ok!(
            tester
                .read_data_source("duplocloud_tenant_aws_kms_key", json!({"tenant_id": TENANT}))
                .await
        );
        assert_eq!(state["key_name"], "tenant-key");
    }

    #[test]
    fn test_diagnostic_assertions() {
        assert_no_errors(&[Diagnostic::warning("duplo_host is not set in the provider block")]);
        assert_error_contains(
            &[Diagnostic::error("Invalid value for attribute 'tenant_id'")],
            "tenant_id",
        );
    }

    #[test]
    #[should_panic(expected = "unexpected errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("Unable to create DuploCloud client")]);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing required attribute 'email'").with_attribute("email"),
            Diagnostic::error("Invalid value for attribute 'tenant_id'").with_detail("not a GUID"),
        ]);

        let display = err.to_string();
        assert!(display.starts_with("2 error diagnostic(s):"));
        assert!(display.contains("(at email)"));
        assert!(display.contains(": not a GUID"));
    }
}
