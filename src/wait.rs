//! Polling until the control plane converges after a create or delete.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace};

use crate::client::ClientError;
use crate::ProviderError;

/// How long resources wait for creates and deletes to settle.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Poll `probe` until it yields an object.
///
/// A 404 counts as "not there yet". Any other error stops the wait.
pub async fn wait_until_present<T, F, Fut>(
    kind: &str,
    id: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ClientError>>,
{
    let poll = async {
        loop {
            match probe().await {
                Ok(Some(found)) => return Ok(found),
                Ok(None) => trace!(kind, id, "not present yet"),
                Err(err) if err.is_not_found() => trace!(kind, id, "not present yet (404)"),
                Err(err) => {
                    return Err(ProviderError::api_context(
                        format!("error getting {} '{}'", kind, id),
                        err,
                    ))
                },
            }
            tokio::time::sleep(interval).await;
        }
    };

    let found = tokio::time::timeout(timeout, poll).await.map_err(|_| {
        ProviderError::Timeout(format!(
            "timed out after {:?} waiting for {} '{}' to be present",
            timeout, kind, id
        ))
    })??;
    debug!(kind, id, "present");
    Ok(found)
}

/// Poll `probe` until the object is gone, either `None` or a 404.
pub async fn wait_until_missing<T, F, Fut>(
    kind: &str,
    id: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<(), ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ClientError>>,
{
    let poll = async {
        loop {
            match probe().await {
                Ok(None) => return Ok(()),
                Err(err) if err.is_not_found() => return Ok(()),
                Ok(Some(_)) => trace!(kind, id, "still present"),
                Err(err) => {
                    return Err(ProviderError::api_context(
                        format!("error getting {} '{}'", kind, id),
                        err,
                    ))
                },
            }
            tokio::time::sleep(interval).await;
        }
    };

    tokio::time::timeout(timeout, poll).await.map_err(|_| {
        ProviderError::Timeout(format!(
            "timed out after {:?} waiting for {} '{}' to be deleted",
            timeout, kind, id
        ))
    })??;
    debug!(kind, id, "missing");
    Ok(())
}
