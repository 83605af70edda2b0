//! Supervised background tasks
//!
//! Every long-running loop is spawned through a [`Supervisor`] under a
//! name. Start and stop are logged. A task that fails or panics is logged
//! at error level and started again after the restart delay, until
//! shutdown is requested. All tasks share one [`CancellationToken`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Owner of the daemon's background tasks
pub struct Supervisor {
    tasks: JoinSet<()>,
    shutdown: CancellationToken,
    restart_delay: Duration,
}

impl Supervisor {
    pub fn new(shutdown: CancellationToken, restart_delay: Duration) -> Self {
        Self {
            tasks: JoinSet::new(),
            shutdown,
            restart_delay,
        }
    }

    /// Token cancelled when shutdown is requested
    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of supervised tasks still running
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawns a supervised task
    ///
    /// `factory` builds a fresh run of the task from the shutdown token; it
    /// is called again for every restart. A run returning `Ok` ends the
    /// task for good.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name.into());
        let shutdown = self.shutdown.clone();
        let restart_delay = self.restart_delay;

        self.tasks.spawn(async move {
            let mut runs: u32 = 0;
            loop {
                runs += 1;
                info!(task = %name, run = runs, "Task started");

                // Nested spawn so a panic is caught as a JoinError
                let outcome = tokio::spawn(factory(shutdown.clone())).await;
                match outcome {
                    Ok(Ok(())) => {
                        info!(task = %name, "Task stopped");
                        return;
                    }
                    Ok(Err(e)) => {
                        error!(task = %name, error = %format!("{e:#}"), "Task failed");
                    }
                    Err(e) if e.is_panic() => {
                        error!(task = %name, "Task panicked");
                    }
                    Err(e) => {
                        warn!(task = %name, error = %e, "Task aborted");
                        return;
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(restart_delay) => {
                        info!(task = %name, delay_secs = restart_delay.as_secs(), "Restarting task");
                    }
                    _ = shutdown.cancelled() => {
                        info!(task = %name, "Task not restarted, shutting down");
                        return;
                    }
                }
            }
        });
    }

    /// Cancels every task and waits for all of them to finish
    pub async fn shutdown(mut self) {
        info!(tasks = self.tasks.len(), "Stopping supervised tasks");
        self.shutdown.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Supervised task ended abnormally");
            }
        }
        info!("All supervised tasks stopped");
    }
}
