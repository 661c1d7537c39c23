//! Actuator session acquisition and release.

use std::sync::Arc;

use tracing::{error, info, warn};

use armlink_core::{ActuatorSettings, Error, Result};

use crate::codes::CommandCode;
use crate::service::{parse_resource_id, ActuatorService};

/// An open control channel on the remote actuator service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    handle: Option<i64>,
    port: String,
}

impl Session {
    /// The resource handle, or `None` once released.
    pub fn handle(&self) -> Option<i64> {
        self.handle
    }

    /// The communication port this session was acquired for.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Whether commands can be dispatched on this session.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Mark the session unusable without contacting the service.
    pub(crate) fn invalidate(&mut self) -> Option<i64> {
        self.handle.take()
    }
}

/// Acquires and releases sessions, owning the retry policy.
#[derive(Clone)]
pub struct SessionManager {
    service: Arc<dyn ActuatorService>,
    settings: ActuatorSettings,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("port", &self.settings.port)
            .field("max_attempts", &self.settings.max_attempts)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a session manager over a service transport.
    pub fn new(service: Arc<dyn ActuatorService>, settings: ActuatorSettings) -> Self {
        Self { service, settings }
    }

    /// The transport shared with command channels.
    pub fn service(&self) -> Arc<dyn ActuatorService> {
        Arc::clone(&self.service)
    }

    /// Actuator settings in effect.
    pub fn settings(&self) -> &ActuatorSettings {
        &self.settings
    }

    /// Acquire a session, retrying with a fixed delay.
    ///
    /// A resource id `> 0` is success. Ids `<= 0`, transport failures and
    /// malformed bodies each consume one attempt. After a success the call
    /// waits `connect_settle` so the service can finish initializing.
    pub async fn acquire(&self) -> Result<Session> {
        let port = self.settings.port.as_str();
        let max_attempts = self.settings.max_attempts;
        info!("Acquiring actuator session on port {}", port);

        let mut last_failure = String::from("no attempts made");
        for attempt in 1..=max_attempts {
            match self.try_acquire(port).await {
                Ok(handle) => {
                    info!(
                        "Acquired resource handle {} on attempt {}/{}",
                        handle, attempt, max_attempts
                    );
                    tokio::time::sleep(self.settings.connect_settle()).await;
                    return Ok(Session {
                        handle: Some(handle),
                        port: port.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Session acquisition attempt {}/{} failed: {}",
                        attempt, max_attempts, e
                    );
                    last_failure = e.to_string();
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.settings.retry_delay()).await;
            }
        }

        error!(
            "Could not acquire an actuator session after {} attempts",
            max_attempts
        );
        Err(Error::Connection {
            attempts: max_attempts,
            reason: last_failure,
        })
    }

    async fn try_acquire(&self, port: &str) -> Result<i64> {
        let body = self.service.request_handle(port).await?;
        let id = parse_resource_id(&body)?;
        if id > 0 {
            Ok(id)
        } else {
            Err(Error::Protocol(format!("service returned resource id {id}")))
        }
    }

    /// Send the shutdown code and invalidate the handle.
    ///
    /// Safe to call on an already released session.
    pub async fn release(&self, session: &mut Session) {
        let Some(handle) = session.invalidate() else {
            return;
        };
        info!("Releasing actuator session {}", handle);
        if let Err(e) = self
            .service
            .send_command(handle, &CommandCode::shutdown())
            .await
        {
            warn!("Shutdown command for handle {} failed: {}", handle, e);
        }
    }
}
