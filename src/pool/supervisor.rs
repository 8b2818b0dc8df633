use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::DatabaseType;

/// An error raised outside any statement, e.g. an idle pooled connection
/// dropping. The pool can no longer be trusted once one of these arrives.
#[derive(Debug, Clone, Error)]
#[error("{backend:?} pool failure: {message}")]
pub struct PoolFatalError {
    pub backend: DatabaseType,
    pub message: String,
}

/// Sending half handed to the pool and its connection tasks.
#[derive(Clone)]
pub(crate) struct FatalReporter {
    backend: DatabaseType,
    tx: mpsc::UnboundedSender<PoolFatalError>,
}

impl fmt::Debug for FatalReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FatalReporter")
            .field("backend", &self.backend)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl FatalReporter {
    /// Log the failure and hand it to the supervisor. With no supervisor left
    /// to decide, the process exits.
    pub(crate) fn report(&self, message: impl fmt::Display) {
        if let Err(error) = self.deliver(message) {
            terminate(&error);
        }
    }

    /// Send without the exit fallback; the error comes back when nobody is
    /// listening.
    pub(crate) fn deliver(&self, message: impl fmt::Display) -> Result<(), PoolFatalError> {
        let error = PoolFatalError {
            backend: self.backend,
            message: message.to_string(),
        };
        tracing::error!(
            backend = ?error.backend,
            message = %error.message,
            "unexpected error on idle client"
        );
        self.tx.send(error).map_err(|mpsc::error::SendError(error)| error)
    }
}

impl<E> bb8::ErrorSink<E> for FatalReporter
where
    E: fmt::Display + Send + 'static,
{
    fn sink(&self, error: E) {
        self.report(error);
    }

    fn boxed_clone(&self) -> Box<dyn bb8::ErrorSink<E>> {
        Box::new(self.clone())
    }
}

fn terminate(error: &PoolFatalError) -> ! {
    tracing::error!(%error, "connection pool is poisoned; terminating process");
    std::process::exit(1);
}

/// Receives out-of-band pool failures.
///
/// Returned alongside the pool by [`ConnectionPool::connect`](super::ConnectionPool::connect).
/// Dropping it keeps the fail-fast default: the next fatal error exits the
/// process. [`PoolSupervisor::on_fatal`] replaces that with a handler, and
/// holding the supervisor to call [`PoolSupervisor::recv`] leaves the decision
/// to the caller.
#[derive(Debug)]
#[must_use = "dropping the supervisor makes the next pool failure exit the process"]
pub struct PoolSupervisor {
    rx: mpsc::UnboundedReceiver<PoolFatalError>,
}

pub(crate) fn channel(backend: DatabaseType) -> (FatalReporter, PoolSupervisor) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FatalReporter { backend, tx }, PoolSupervisor { rx })
}

impl PoolSupervisor {
    /// Wait for the next fatal error. `None` once every pool handle and
    /// connection task is gone.
    pub async fn recv(&mut self) -> Option<PoolFatalError> {
        self.rx.recv().await
    }

    /// Spawn a watchdog that hands every fatal error to `handler`. The process
    /// keeps running unless the handler stops it.
    pub fn on_fatal<F>(mut self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(PoolFatalError) + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(error) = self.recv().await {
                handler(error);
            }
        })
    }

    /// Spawn a watchdog that logs the first fatal error and exits the process
    /// with status 1. There is no reconnect path.
    pub fn terminate_on_fatal(self) -> JoinHandle<()> {
        self.on_fatal(|error| terminate(&error))
    }
}
