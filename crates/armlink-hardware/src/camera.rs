//! Camera frame source.

use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tracing::{debug, info, warn};

use armlink_core::{CameraBackend, CameraSettings, Error, FrameSize, Result};

use crate::frame::Frame;

/// A camera device delivering images in sensor orientation.
#[async_trait]
pub trait CameraDevice: Send {
    /// Sensor resolution actually in effect.
    fn resolution(&self) -> FrameSize;

    /// Read one image. `Ok(None)` means no frame was available this time.
    async fn read(&mut self) -> Result<Option<RgbImage>>;

    /// Free the device. Called at most once.
    fn release(&mut self);
}

/// Owns a camera device and produces canonical frames.
pub struct FrameSource {
    device: Option<Box<dyn CameraDevice>>,
    retry_delay: Duration,
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("open", &self.is_open())
            .field("sensor_resolution", &self.sensor_resolution())
            .finish()
    }
}

impl FrameSource {
    /// Open the configured camera. Failing to open is fatal for perception.
    pub async fn open(settings: &CameraSettings) -> Result<Self> {
        info!(
            "Opening {:?} camera {} at requested {}x{}",
            settings.backend, settings.index, settings.width, settings.height
        );
        let device: Box<dyn CameraDevice> = match settings.backend {
            CameraBackend::Synthetic => Box::new(SyntheticCamera::new(FrameSize::new(
                settings.width,
                settings.height,
            ))),
            CameraBackend::Native => open_native(settings).await?,
        };

        let actual = device.resolution();
        if actual != FrameSize::new(settings.width, settings.height) {
            warn!(
                "Camera chose {}x{} instead of the requested {}x{}",
                actual.width, actual.height, settings.width, settings.height
            );
        }
        Ok(Self::with_device(device, settings.retry_delay()))
    }

    /// Wrap an already opened device.
    pub fn with_device(device: Box<dyn CameraDevice>, retry_delay: Duration) -> Self {
        Self {
            device: Some(device),
            retry_delay,
        }
    }

    /// Whether the device is still held.
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Sensor resolution, before rotation.
    pub fn sensor_resolution(&self) -> Option<FrameSize> {
        self.device.as_ref().map(|device| device.resolution())
    }

    /// Read one frame and rotate it into canonical orientation.
    ///
    /// Returns `None` on a failed read; the caller should retry after a
    /// short delay.
    pub async fn capture(&mut self) -> Option<Frame> {
        let Some(device) = self.device.as_mut() else {
            warn!("Capture requested on a released camera");
            return None;
        };
        match device.read().await {
            Ok(Some(raw)) => Some(Frame::from_sensor(&raw)),
            Ok(None) => {
                debug!("Camera returned no frame");
                None
            }
            Err(e) => {
                warn!("Camera read failed: {}", e);
                None
            }
        }
    }

    /// Capture, retrying failed reads up to `max_attempts` times.
    pub async fn capture_retrying(&mut self, max_attempts: u32) -> Result<Frame> {
        for attempt in 1..=max_attempts {
            if let Some(frame) = self.capture().await {
                return Ok(frame);
            }
            if !self.is_open() {
                break;
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(Error::TransientCapture(format!(
            "no frame after {max_attempts} reads"
        )))
    }

    /// Delay callers should wait after a failed capture.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Free the device. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            info!("Camera released");
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(feature = "native-camera")]
async fn open_native(settings: &CameraSettings) -> Result<Box<dyn CameraDevice>> {
    let camera =
        crate::native::NativeCamera::open(settings.index, settings.width, settings.height).await?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "native-camera"))]
async fn open_native(settings: &CameraSettings) -> Result<Box<dyn CameraDevice>> {
    Err(Error::CameraUnavailable(format!(
        "camera {} requires the native-camera feature",
        settings.index
    )))
}

/// Pacing of synthetic reads, roughly 30 frames per second.
pub const SYNTHETIC_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Generated camera image: a light background with a cross mark.
///
/// Useful for running the gateway and calibration without hardware.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    resolution: FrameSize,
    mark: (u32, u32),
    frame_interval: Duration,
    dropped_reads: u32,
    reads: u64,
}

impl SyntheticCamera {
    /// Create a synthetic sensor with the mark at its center.
    pub fn new(resolution: FrameSize) -> Self {
        Self {
            resolution,
            mark: (resolution.width / 2, resolution.height / 2),
            frame_interval: SYNTHETIC_FRAME_INTERVAL,
            dropped_reads: 0,
            reads: 0,
        }
    }

    /// Place the cross mark at a sensor pixel.
    pub fn with_mark(mut self, x: u32, y: u32) -> Self {
        self.mark = (x, y);
        self
    }

    /// Time each read takes.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Make the next `count` reads return no frame.
    pub fn drop_next_reads(mut self, count: u32) -> Self {
        self.dropped_reads = count;
        self
    }

    /// Reads served so far, including dropped ones.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn render(&self) -> RgbImage {
        let FrameSize { width, height } = self.resolution;
        let mut image = RgbImage::from_pixel(width, height, Rgb([235, 235, 230]));
        let (mx, my) = self.mark;
        let arm = 12;
        for d in 0..=arm * 2 {
            let x = (mx + d).checked_sub(arm);
            let y = (my + d).checked_sub(arm);
            if let Some(x) = x.filter(|x| *x < width) {
                if my < height {
                    image.put_pixel(x, my, Rgb([200, 20, 20]));
                }
            }
            if let Some(y) = y.filter(|y| *y < height) {
                if mx < width {
                    image.put_pixel(mx, y, Rgb([200, 20, 20]));
                }
            }
        }
        image
    }
}

#[async_trait]
impl CameraDevice for SyntheticCamera {
    fn resolution(&self) -> FrameSize {
        self.resolution
    }

    async fn read(&mut self) -> Result<Option<RgbImage>> {
        tokio::time::sleep(self.frame_interval).await;
        self.reads += 1;
        if self.dropped_reads > 0 {
            self.dropped_reads -= 1;
            return Ok(None);
        }
        Ok(Some(self.render()))
    }

    fn release(&mut self) {}
}
