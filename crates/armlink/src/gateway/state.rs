//! Gateway lifecycle and the hardware lock.
//!
//! `UNINITIALIZED -> INITIALIZING -> READY -> SHUTDOWN`, with `FAILED` when
//! hardware acquisition does not succeed. The state lives in a watch channel
//! so handlers read it without locking; the [`Rig`] sits behind one mutex
//! that serializes every camera read and command dispatch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, MappedMutexGuard, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use armlink_core::{Error, GatewaySettings, Result};
use armlink_hardware::Rig;

/// Lifecycle state of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayState {
    /// Hardware acquisition not started
    Uninitialized,
    /// Hardware acquisition running
    Initializing,
    /// Hardware held, requests are served
    Ready,
    /// Hardware acquisition failed
    Failed(String),
    /// Hardware released
    Shutdown,
}

impl GatewayState {
    /// Lowercase state name.
    pub fn name(&self) -> &'static str {
        match self {
            GatewayState::Uninitialized => "uninitialized",
            GatewayState::Initializing => "initializing",
            GatewayState::Ready => "ready",
            GatewayState::Failed(_) => "failed",
            GatewayState::Shutdown => "shutdown",
        }
    }
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Lowercase state name
    pub state: &'static str,
    /// Initialization failure, when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&GatewayState> for StatusReport {
    fn from(state: &GatewayState) -> Self {
        let error = match state {
            GatewayState::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            state: state.name(),
            error,
        }
    }
}

/// Shared gateway state: lifecycle plus the single hardware owner.
pub struct Gateway {
    state: watch::Sender<GatewayState>,
    rig: Mutex<Option<Rig>>,
    settings: GatewaySettings,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("state", &*self.state.borrow())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create an uninitialized gateway.
    pub fn new(settings: GatewaySettings) -> Arc<Self> {
        let (state, _) = watch::channel(GatewayState::Uninitialized);
        Arc::new(Self {
            state,
            rig: Mutex::new(None),
            settings,
        })
    }

    /// Current state.
    pub fn state(&self) -> GatewayState {
        self.state.borrow().clone()
    }

    /// Whether requests can be served.
    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == GatewayState::Ready
    }

    /// Gateway settings.
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Interval the stream waits between readiness checks.
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.settings.idle_poll_ms)
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<GatewayState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: GatewayState) {
        info!("Gateway state: {}", next.name());
        self.state.send_replace(next);
    }

    /// Acquire hardware in the background. The listener does not wait for it.
    pub fn initialize<F>(self: &Arc<Self>, open: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<Rig>> + Send + 'static,
    {
        let gateway = Arc::clone(self);
        gateway.set_state(GatewayState::Initializing);
        tokio::spawn(async move {
            match open.await {
                Ok(mut rig) => {
                    let mut slot = gateway.rig.lock().await;
                    if *gateway.state.borrow() == GatewayState::Shutdown {
                        warn!("Hardware became available after shutdown; releasing it");
                        rig.shutdown().await;
                        return;
                    }
                    *slot = Some(rig);
                    drop(slot);
                    gateway.set_state(GatewayState::Ready);
                }
                Err(e) => {
                    error!("Hardware initialization failed: {}", e);
                    gateway.set_state(GatewayState::Failed(e.to_string()));
                }
            }
        })
    }

    /// Install an already opened rig and become ready.
    pub async fn install(&self, rig: Rig) {
        *self.rig.lock().await = Some(rig);
        self.set_state(GatewayState::Ready);
    }

    /// Wait until the gateway leaves the initializing states.
    pub async fn wait_initialized(&self) -> GatewayState {
        let mut receiver = self.subscribe();
        let settled = receiver
            .wait_for(|state| {
                !matches!(
                    state,
                    GatewayState::Uninitialized | GatewayState::Initializing
                )
            })
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Lock the hardware. Fails with [`Error::NotReady`] unless ready.
    pub async fn hardware(&self) -> Result<MappedMutexGuard<'_, Rig>> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        MutexGuard::try_map(self.rig.lock().await, Option::as_mut).map_err(|_| Error::NotReady)
    }

    /// Stop serving: streams end at their next check.
    pub fn begin_shutdown(&self) {
        if *self.state.borrow() != GatewayState::Shutdown {
            self.set_state(GatewayState::Shutdown);
        }
    }

    /// Stop serving and release the hardware under the lock.
    pub async fn shutdown(&self) {
        self.begin_shutdown();
        let mut slot = self.rig.lock().await;
        if let Some(mut rig) = slot.take() {
            rig.shutdown().await;
        }
    }
}
