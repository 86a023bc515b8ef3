//! Background reclamation loop

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;

use super::pool::PoolInner;

/// Sweep the pool every `interval` until the stop signal fires or the pool
/// is dropped.
///
/// The stop signal interrupts the sleep, and is checked again before each
/// sweep starts.
pub(super) async fn run(
    pool: Weak<PoolInner>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(?interval, "reclamation loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if *shutdown.borrow() {
                    break;
                }
                let Some(inner) = pool.upgrade() else {
                    break;
                };
                let evicted = inner.sweep().await;
                if evicted > 0 {
                    tracing::info!(evicted, "reclamation sweep evicted connections");
                }
            }
            changed = shutdown.changed() => {
                // Err: every pool handle was dropped without destroy.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("reclamation loop stopped");
}
