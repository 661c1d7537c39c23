//! The owned hardware bundle: one actuator session plus one camera.
//!
//! There is no ambient hardware state. Whoever opens a [`Rig`] owns it and
//! hands it to consumers by reference; serializing access (a single lock
//! around the rig) is the owner's job.

use std::sync::Arc;

use tracing::{info, warn};

use armlink_core::{ActionIntent, ArmConfig, Result};

use crate::camera::FrameSource;
use crate::channel::CommandChannel;
use crate::frame::Frame;
use crate::service::{ActuatorService, HttpActuatorService};
use crate::session::SessionManager;

/// Actuator session, command channel and camera owned together.
#[derive(Debug)]
pub struct Rig {
    sessions: SessionManager,
    channel: CommandChannel,
    camera: FrameSource,
    jpeg_quality: u8,
}

impl Rig {
    /// Acquire an actuator session over HTTP and open the configured camera.
    pub async fn open(config: &ArmConfig) -> Result<Self> {
        let service: Arc<dyn ActuatorService> =
            Arc::new(HttpActuatorService::new(&config.actuator)?);
        let sessions = SessionManager::new(service, config.actuator.clone());
        Self::open_with(sessions, config).await
    }

    /// Open with a caller-supplied session manager, e.g. over a mock service.
    ///
    /// If the camera cannot be opened the freshly acquired session is
    /// released before the error is returned.
    pub async fn open_with(sessions: SessionManager, config: &ArmConfig) -> Result<Self> {
        let mut session = sessions.acquire().await?;
        let camera = match FrameSource::open(&config.camera).await {
            Ok(camera) => camera,
            Err(e) => {
                sessions.release(&mut session).await;
                return Err(e);
            }
        };
        let channel = CommandChannel::new(sessions.service(), session, sessions.settings());
        Ok(Self::from_parts(sessions, channel, camera, config.camera.jpeg_quality))
    }

    /// Assemble a rig from already opened parts.
    pub fn from_parts(
        sessions: SessionManager,
        channel: CommandChannel,
        camera: FrameSource,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            sessions,
            channel,
            camera,
            jpeg_quality,
        }
    }

    /// Whether both the session and the camera are still held.
    pub fn is_open(&self) -> bool {
        self.channel.session().is_open() && self.camera.is_open()
    }

    /// Command channel.
    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    /// Mutable command channel.
    pub fn channel_mut(&mut self) -> &mut CommandChannel {
        &mut self.channel
    }

    /// Frame source.
    pub fn camera(&self) -> &FrameSource {
        &self.camera
    }

    /// Mutable frame source.
    pub fn camera_mut(&mut self) -> &mut FrameSource {
        &mut self.camera
    }

    /// JPEG quality configured for encoded frames.
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Execute one action intent on the command channel.
    pub async fn execute(&mut self, intent: ActionIntent) -> Result<()> {
        self.channel.execute(intent).await
    }

    /// Capture one canonical frame. `None` on a transient read failure.
    pub async fn capture(&mut self) -> Option<Frame> {
        self.camera.capture().await
    }

    /// Capture one frame and encode it as JPEG.
    pub async fn capture_jpeg(&mut self) -> Option<Result<Vec<u8>>> {
        let quality = self.jpeg_quality;
        self.camera.capture().await.map(|frame| frame.to_jpeg(quality))
    }

    /// Release the session, then the camera. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        if self.channel.session().is_open() {
            info!("Shutting down actuator session");
            self.sessions.release(self.channel.session_mut()).await;
        }
        self.camera.release();
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        if self.channel.session().is_open() {
            warn!("Rig dropped without shutdown; actuator session left open");
        }
        self.camera.release();
    }
}
