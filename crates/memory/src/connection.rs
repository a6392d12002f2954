//! Connection manager for the long-term layer.
//!
//! Owns a [`HierarchicalMemory`] and keeps its backend connected: an
//! initial connect, a recurring health probe, and a single-flight
//! reconnect after a fixed delay. Construct one per process and share it
//! behind an `Arc`.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use warden_config::ConnectionConfig;

use crate::hierarchical::HierarchicalMemory;

pub struct ConnectionManager {
    memory: Arc<HierarchicalMemory>,
    config: ConnectionConfig,
    available: AtomicBool,
    reconnecting: AtomicBool,
    shut_down: AtomicBool,
    last_health_check: Mutex<Option<DateTime<Utc>>>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(memory: Arc<HierarchicalMemory>, config: ConnectionConfig) -> Arc<Self> {
        Arc::new(Self {
            memory,
            config,
            available: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            last_health_check: Mutex::new(None),
            health_task: Mutex::new(None),
        })
    }

    pub fn memory(&self) -> &Arc<HierarchicalMemory> {
        &self.memory
    }

    pub fn is_connected(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn last_health_check_at(&self) -> Option<DateTime<Utc>> {
        *self
            .last_health_check
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Connect the long-term layer. A failure is logged and leaves the
    /// manager unavailable; it is never returned. On success the health
    /// check loop starts.
    pub async fn initialize(self: &Arc<Self>) -> bool {
        match self.memory.connect().await {
            Ok(()) => {
                if !self.accept_connection().await {
                    return false;
                }
                self.start_health_checks();
                true
            }
            Err(e) => {
                warn!(error = %e, "Long-term memory unavailable; continuing with short-term only");
                self.available.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// One health check round. Probes when available, otherwise retries
    /// the connection.
    pub async fn health_tick(&self) {
        *self
            .last_health_check
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());

        if self.is_connected() {
            if self.memory.health_check().await {
                debug!("Long-term memory healthy");
                return;
            }
            warn!("Long-term memory health check failed");
            self.available.store(false, Ordering::SeqCst);
            self.memory.mark_disconnected();
        }
        self.attempt_reconnect().await;
    }

    /// Wait the reconnect delay, then try to connect once. Returns false
    /// without doing anything when another attempt is already in flight.
    pub async fn attempt_reconnect(&self) -> bool {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reconnect already in progress");
            return false;
        }

        tokio::time::sleep(self.config.reconnect_delay()).await;

        let connected = if self.shut_down.load(Ordering::SeqCst) {
            false
        } else {
            match self.memory.connect().await {
                Ok(()) => {
                    let accepted = self.accept_connection().await;
                    if accepted {
                        info!("Long-term memory reconnected");
                    }
                    accepted
                }
                Err(e) => {
                    debug!(error = %e, "Reconnect failed; will retry on next health check");
                    false
                }
            }
        };

        self.reconnecting.store(false, Ordering::SeqCst);
        connected
    }

    /// Stop the health loop and disconnect. Safe to call repeatedly and
    /// before `initialize`.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let task = self
            .health_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }

        if self.memory.is_connected() {
            if let Err(e) = self.memory.disconnect().await {
                warn!(error = %e, "Error disconnecting long-term memory");
            }
        }
        self.available.store(false, Ordering::SeqCst);
        info!("Connection manager shut down");
    }

    /// Mark the manager available after a successful connect, unless
    /// `shutdown` ran while the connect was in flight; in that case the
    /// fresh connection is closed again.
    async fn accept_connection(&self) -> bool {
        // Publish before checking the flag: a shutdown that misses this
        // check stores `false` after us.
        self.available.store(true, Ordering::SeqCst);
        if !self.shut_down.load(Ordering::SeqCst) {
            return true;
        }

        self.available.store(false, Ordering::SeqCst);
        if let Err(e) = self.memory.disconnect().await {
            warn!(error = %e, "Error closing connection opened during shutdown");
        }
        debug!("Connect finished after shutdown; disconnected");
        false
    }

    fn start_health_checks(self: &Arc<Self>) {
        let mut slot = self.health_task.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() || self.shut_down.load(Ordering::SeqCst) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.health_check_interval();
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.health_tick().await;
            }
        }));
        debug!(interval_ms = period.as_millis() as u64, "Health checks started");
    }
}
