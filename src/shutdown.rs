use tokio::sync::mpsc;
use tracing::{error, info};

/// A handle for managing graceful shutdown of the application
pub struct ShutdownManager {
    /// Receiver for shutdown signals
    pub rx: mpsc::Receiver<()>,
}

impl ShutdownManager {
    /// Create a new ShutdownManager and setup signal handlers
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);

        let tx_clone = tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = tx_clone.send(()).await;
                }
                Err(err) => {
                    error!("Error listening for ctrl+c: {}", err);
                }
            }
        });

        #[cfg(unix)]
        {
            let tx_clone = tx.clone();
            tokio::spawn(async move {
                let kind = tokio::signal::unix::SignalKind::terminate();

                match tokio::signal::unix::signal(kind) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        let _ = tx_clone.send(()).await;
                    }
                    Err(err) => {
                        error!("Failed to install SIGTERM handler: {}", err);
                    }
                }
            });
        }

        ShutdownManager { rx }
    }

    /// Drive `future` to completion, or return `None` as soon as a shutdown signal arrives.
    /// The caller is left to flush state before exiting.
    pub async fn run_until_shutdown<F, T>(mut self, future: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            _ = self.rx.recv() => {
                info!("shutdown signal received");
                None
            }
            result = future => {
                Some(result)
            }
        }
    }
}
