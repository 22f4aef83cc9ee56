//! What every handler gets to work with.

use std::sync::Arc;
use std::time::Duration;

use crate::client::DuploApi;
use crate::wait::DEFAULT_WAIT_TIMEOUT;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The configured control-plane client plus wait settings.
#[derive(Clone)]
pub struct HandlerContext {
    api: Arc<dyn DuploApi>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl HandlerContext {
    /// A context with the default wait settings.
    pub fn new(api: Arc<dyn DuploApi>) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Change how often waits poll.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Change how long waits last before giving up.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// The control-plane client.
    pub fn api(&self) -> &dyn DuploApi {
        self.api.as_ref()
    }

    /// How often waits poll.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long waits last.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("poll_interval", &self.poll_interval)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}
