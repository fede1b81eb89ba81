//! Live custody subscription with reconnect and reconciliation.

use super::book::{FoldOutcome, PositionBook};
use super::reconciler::Reconciler;
use crate::client::CompoundorClient;
use crate::error::KeeperResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Configuration for the custody listener.
#[derive(Debug, Clone)]
pub struct CustodyListenerConfig {
    /// Delay between reconnect attempts in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Consecutive failed connections before the listener gives up.
    pub max_reconnect_attempts: u32,
}

impl Default for CustodyListenerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 10,
        }
    }
}

/// Keeps a [`PositionBook`] in sync with the engine's custody events.
///
/// Each connection subscribes first and reconciles second, so no event
/// falls between the replayed history and the live feed. Events seen by
/// both are deduplicated by the fold.
pub struct CustodyListener<C: ?Sized> {
    client: Arc<C>,
    reconciler: Reconciler<C>,
    book: Arc<RwLock<PositionBook>>,
    config: CustodyListenerConfig,
    running: AtomicBool,
    reconnect_attempts: AtomicU32,
}

impl<C: CompoundorClient + ?Sized> CustodyListener<C> {
    pub fn new(client: Arc<C>, book: Arc<RwLock<PositionBook>>, config: CustodyListenerConfig) -> Self {
        Self {
            reconciler: Reconciler::new(client.clone()),
            client,
            book,
            config,
            running: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Runs until stopped or until reconnecting fails too often.
    pub async fn start(&self) -> KeeperResult<()> {
        self.running.store(true, Ordering::SeqCst);
        info!("Starting custody listener");

        while self.running.load(Ordering::SeqCst) {
            match self.connect_and_follow().await {
                Ok(()) => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!("Custody subscription closed");
                }
                Err(e) => {
                    error!(error = %e, "Custody subscription failed");
                    let attempts = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempts >= self.config.max_reconnect_attempts {
                        error!(attempts, "Max reconnect attempts reached, stopping listener");
                        self.running.store(false, Ordering::SeqCst);
                        return Err(e);
                    }
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            warn!(
                attempts = self.reconnect_attempts.load(Ordering::SeqCst),
                delay_ms = self.config.reconnect_delay_ms,
                "Reconnecting..."
            );
            tokio::time::sleep(Duration::from_millis(self.config.reconnect_delay_ms)).await;
        }

        info!("Custody listener stopped");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One connection: subscribe, reconcile, then fold live events until
    /// the feed closes.
    async fn connect_and_follow(&self) -> KeeperResult<()> {
        let mut events = self.client.subscribe_custody().await?;
        self.reconciler.reconcile(&self.book).await?;
        self.reconnect_attempts.store(0, Ordering::SeqCst);

        while let Some(event) = events.recv().await {
            let outcome = self.book.write().await.apply(&event);
            debug!(position = %event.position, ?outcome, "Applied custody event");
            if outcome != FoldOutcome::Ignored {
                info!(position = %event.position, kind = ?event.kind, "Custody changed");
            }
            if !self.running.load(Ordering::SeqCst) {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Reconciles once without subscribing, e.g. at startup.
    pub async fn sync_once(&self) -> KeeperResult<()> {
        self.reconciler.reconcile(&self.book).await.map(|_| ())
    }
}
