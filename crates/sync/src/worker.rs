//! Opt-in background replay.
//!
//! The worker probes the remote health endpoint on a fixed interval and,
//! when reachable, replays the outbox of every registered tenant. It is
//! never started implicitly. A pass that loses the network flips the oracle,
//! which makes the remaining passes of that tick no-ops; the next tick
//! probes again.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::TenantId;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::replay::ReplayEngine;

/// Periodic replay loop. Cheap to clone; clones share the tenant registry
/// and the shutdown signal.
#[derive(Debug, Clone)]
pub struct ReplayWorker {
    engine: ReplayEngine,
    interval: Duration,
    shutdown: Arc<Notify>,
    tenants: Arc<RwLock<Vec<TenantId>>>,
}

impl ReplayWorker {
    pub(crate) fn new(engine: ReplayEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            shutdown: Arc::new(Notify::new()),
            tenants: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add a tenant to the replay rotation. Registering twice is a no-op.
    pub async fn register_tenant(&self, tenant_id: TenantId) {
        let mut tenants = self.tenants.write().await;
        if !tenants.contains(&tenant_id) {
            tenants.push(tenant_id);
        }
    }

    pub async fn unregister_tenant(&self, tenant_id: TenantId) {
        let mut tenants = self.tenants.write().await;
        tenants.retain(|t| *t != tenant_id);
    }

    pub async fn registered_tenants(&self) -> Vec<TenantId> {
        self.tenants.read().await.clone()
    }

    /// Spawn the loop. The worker handle stays usable for registration and
    /// shutdown.
    pub fn start(&self) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(worker.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        worker.run_once().await;
                    }
                    _ = worker.shutdown.notified() => {
                        tracing::info!("replay worker shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// One tick: probe, then replay every registered tenant.
    pub async fn run_once(&self) {
        if !self.engine.probe().await {
            tracing::debug!("replay worker: remote api unreachable, skipping tick");
            return;
        }

        let tenants = self.registered_tenants().await;
        for tenant_id in tenants {
            match self.engine.replay_tenant(tenant_id).await {
                Ok(report) if report.synced == 0 && report.is_clean() => {}
                Ok(report) => {
                    tracing::info!(
                        tenant = %tenant_id,
                        synced = report.synced,
                        failed = report.failed.len(),
                        deferred = report.deferred,
                        "background replay pass"
                    );
                }
                Err(err) => {
                    tracing::warn!(tenant = %tenant_id, "background replay failed: {err}");
                }
            }
        }
    }

    /// Ask the loop to stop after the current tick.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}
