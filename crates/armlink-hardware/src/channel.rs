//! Serialized command dispatch to the actuator.
//!
//! The remote service models one physical device with one command pipeline.
//! Every method takes `&mut self`, so overlapping commands need a shared
//! owner to hold a lock around the channel.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use armlink_core::{ActionIntent, ActuatorSettings, Error, PhysicalPosition, Result};

use crate::codes::CommandCode;
use crate::service::ActuatorService;
use crate::session::Session;

/// Encodes motion primitives and dispatches them one at a time.
pub struct CommandChannel {
    service: Arc<dyn ActuatorService>,
    session: Session,
    command_settle: Duration,
    click_settle: Duration,
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl CommandChannel {
    /// Create a channel over an acquired session.
    pub fn new(
        service: Arc<dyn ActuatorService>,
        session: Session,
        settings: &ActuatorSettings,
    ) -> Self {
        Self {
            service,
            session,
            command_settle: settings.command_settle(),
            click_settle: settings.click_settle(),
        }
    }

    /// The session commands are sent on.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access for release.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Dispatch one command code and wait for the hardware to respond.
    ///
    /// Without an open session nothing is sent. Transport failures are
    /// logged and returned as [`Error::Dispatch`]; the command may or may
    /// not have taken effect.
    pub async fn send(&mut self, code: &CommandCode) -> Result<()> {
        let Some(handle) = self.session.handle() else {
            error!("No open session, command '{}' not sent", code);
            return Err(Error::Dispatch(format!(
                "no open session for command '{code}'"
            )));
        };
        match self.service.send_command(handle, code).await {
            Ok(()) => {
                tokio::time::sleep(self.command_settle).await;
                Ok(())
            }
            Err(e) => {
                warn!("Sending command '{}' failed: {}", code, e);
                Err(Error::Dispatch(format!("command '{code}' failed: {e}")))
            }
        }
    }

    /// Move to a physical position, truncated to whole millimeters.
    pub async fn move_to(&mut self, x_mm: f64, y_mm: f64) -> Result<()> {
        info!("Moving to {}", PhysicalPosition::new(x_mm, y_mm));
        self.send(&CommandCode::move_to(x_mm, y_mm)).await
    }

    /// Press and release at the current position.
    ///
    /// The release is sent even if the press failed so the effector is not
    /// left down.
    pub async fn click(&mut self) -> Result<()> {
        info!("Clicking");
        let pressed = self.send(&CommandCode::click_descend()).await;
        tokio::time::sleep(self.click_settle).await;
        let released = self.send(&CommandCode::ascend()).await;
        pressed.and(released)
    }

    /// Drag from `(x1, y1)` to `(x2, y2)`, holding at the end for `duration`.
    pub async fn swipe(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        duration: Duration,
    ) -> Result<()> {
        info!(
            "Swiping from {} to {}",
            PhysicalPosition::new(x1, y1),
            PhysicalPosition::new(x2, y2)
        );
        let mut outcome = self.move_to(x1, y1).await;
        outcome = outcome.and(self.send(&CommandCode::swipe_descend()).await);
        outcome = outcome.and(self.move_to(x2, y2).await);
        tokio::time::sleep(duration).await;
        outcome.and(self.send(&CommandCode::ascend()).await)
    }

    /// Move to a position, settle briefly, then click.
    pub async fn move_and_click(&mut self, x_mm: f64, y_mm: f64) -> Result<()> {
        let moved = self.move_to(x_mm, y_mm).await;
        tokio::time::sleep(self.click_settle).await;
        let clicked = self.click().await;
        moved.and(clicked)
    }

    /// Execute an action intent.
    pub async fn execute(&mut self, intent: ActionIntent) -> Result<()> {
        match intent {
            ActionIntent::Move { x_mm, y_mm } => self.move_to(x_mm, y_mm).await,
            ActionIntent::Click => self.click().await,
            ActionIntent::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_secs,
            } => {
                let hold = Duration::try_from_secs_f64(duration_secs).map_err(|e| {
                    Error::Protocol(format!("invalid swipe duration {duration_secs}: {e}"))
                })?;
                self.swipe(x1, y1, x2, y2, hold).await
            }
            ActionIntent::MoveClick { x_mm, y_mm } => self.move_and_click(x_mm, y_mm).await,
        }
    }
}
