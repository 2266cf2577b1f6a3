//! Scheduling of asynchronous dispatches.

use std::io;

use courier_config::AsyncBackend;
use tokio::runtime::Handle;
use tracing::warn;

/// Where asynchronous handlers run.
#[derive(Debug)]
pub(crate) enum Spawner {
    /// A named OS thread per dispatch.
    Thread { prefix: String },
    /// The blocking pool of a tokio runtime.
    Tokio(Handle),
}

impl Spawner {
    /// Resolve a configured backend. `Tokio` outside a runtime degrades to
    /// threads.
    pub(crate) fn resolve(backend: AsyncBackend, thread_prefix: &str) -> Self {
        let threads = || Self::Thread {
            prefix: thread_prefix.to_owned(),
        };
        match backend {
            AsyncBackend::Thread => threads(),
            AsyncBackend::Auto => Handle::try_current().map_or_else(|_| threads(), Self::Tokio),
            AsyncBackend::Tokio => match Handle::try_current() {
                Ok(handle) => Self::Tokio(handle),
                Err(e) => {
                    warn!(error = %e, "tokio backend requested outside a runtime; using threads");
                    threads()
                },
            },
        }
    }

    pub(crate) fn backend(&self) -> AsyncBackend {
        match self {
            Self::Thread { .. } => AsyncBackend::Thread,
            Self::Tokio(_) => AsyncBackend::Tokio,
        }
    }

    /// Run `job` independently of the caller.
    ///
    /// On error the job has been dropped without running.
    pub(crate) fn spawn<F>(&self, job: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Thread { prefix } => std::thread::Builder::new()
                .name(format!("{prefix}-dispatch"))
                .spawn(job)
                .map(drop),
            Self::Tokio(handle) => {
                drop(handle.spawn_blocking(job));
                Ok(())
            },
        }
    }
}
