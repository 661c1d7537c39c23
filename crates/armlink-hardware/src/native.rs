//! Platform camera backend.
//!
//! The platform camera lives on its own thread and is driven over a request
//! channel.

use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use armlink_core::{Error, FrameSize, Result};

use crate::camera::CameraDevice;

enum Request {
    Read(oneshot::Sender<Result<Option<RgbImage>>>),
    Stop,
}

/// A camera opened through the operating system's video API.
pub struct NativeCamera {
    requests: mpsc::Sender<Request>,
    resolution: FrameSize,
    worker: Option<thread::JoinHandle<()>>,
}

impl NativeCamera {
    /// Open camera `index`, requesting the closest format to `width`x`height`.
    pub async fn open(index: u32, width: u32, height: u32) -> Result<Self> {
        let (requests, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let worker = thread::Builder::new()
            .name(format!("camera-{index}"))
            .spawn(move || run_worker(index, width, height, inbox, ready_tx))?;

        let resolution = ready_rx
            .await
            .map_err(|_| Error::CameraUnavailable(format!("camera {index} worker exited")))??;
        Ok(Self {
            requests,
            resolution,
            worker: Some(worker),
        })
    }
}

#[async_trait]
impl CameraDevice for NativeCamera {
    fn resolution(&self) -> FrameSize {
        self.resolution
    }

    async fn read(&mut self) -> Result<Option<RgbImage>> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Read(reply))
            .map_err(|_| Error::TransientCapture("camera worker stopped".to_string()))?;
        response
            .await
            .map_err(|_| Error::TransientCapture("camera worker dropped the read".to_string()))?
    }

    fn release(&mut self) {
        let _ = self.requests.send(Request::Stop);
        let Some(worker) = self.worker.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| join_worker(worker));
            }
            // A single-threaded runtime cannot park; the worker exits on its own
            Ok(_) => debug!("Camera worker detached"),
            Err(_) => join_worker(worker),
        }
    }
}

fn join_worker(worker: thread::JoinHandle<()>) {
    if worker.join().is_err() {
        warn!("Camera worker panicked during release");
    }
}

fn run_worker(
    index: u32,
    width: u32,
    height: u32,
    inbox: mpsc::Receiver<Request>,
    ready: oneshot::Sender<Result<FrameSize>>,
) {
    let mut camera = match open_camera(index, width, height) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let resolution = camera.resolution();
    let _ = ready.send(Ok(FrameSize::new(resolution.width(), resolution.height())));

    while let Ok(Request::Read(reply)) = inbox.recv() {
        let _ = reply.send(read_frame(&mut camera));
    }

    if let Err(e) = camera.stop_stream() {
        warn!("Stopping camera {} stream failed: {}", index, e);
    }
    debug!("Camera {} worker finished", index);
}

fn open_camera(index: u32, width: u32, height: u32) -> Result<Camera> {
    let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));
    let mut camera = Camera::new(CameraIndex::Index(index), requested)
        .map_err(|e| Error::CameraUnavailable(format!("cannot open camera {index}: {e}")))?;
    camera
        .open_stream()
        .map_err(|e| Error::CameraUnavailable(format!("cannot start camera {index}: {e}")))?;
    Ok(camera)
}

fn read_frame(camera: &mut Camera) -> Result<Option<RgbImage>> {
    let buffer = camera
        .frame()
        .map_err(|e| Error::TransientCapture(e.to_string()))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| Error::TransientCapture(e.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    Ok(RgbImage::from_raw(width, height, decoded.into_raw()))
}
