//! Calibration procedure driven against a [`Rig`].

use async_trait::async_trait;
use tracing::{error, info, warn};

use armlink_core::{CalibrationRecord, CalibrationSettings, Error, PixelPoint, Result};
use armlink_hardware::{Frame, Rig};

use crate::engine::{CalibrationEngine, Checkpoint, Instruction};

/// Camera reads attempted per checkpoint before giving up.
pub const FRAME_ATTEMPTS: u32 = 50;

/// Operator-facing front end.
///
/// Returning `None` or `false` at any checkpoint aborts the procedure.
#[async_trait]
pub trait Operator: Send {
    /// Wait until the scene is ready for `checkpoint` (mark in view, tip
    /// aligned). Called before the checkpoint's frame is captured.
    async fn prepare(&mut self, checkpoint: Checkpoint) -> Result<bool>;

    /// Show `frame` and return the pixel the operator marked in it.
    async fn mark(&mut self, checkpoint: Checkpoint, frame: &Frame) -> Result<Option<PixelPoint>>;
}

/// Run the full procedure and release the rig on every exit path.
pub async fn calibrate(
    mut rig: Rig,
    operator: &mut dyn Operator,
    settings: &CalibrationSettings,
) -> Result<CalibrationRecord> {
    let outcome = run(&mut rig, operator, settings).await;
    rig.shutdown().await;
    match &outcome {
        Ok(record) => info!(
            "Calibration finished: {:.4} mm/pixel, offset ({:.1}, {:.1}) px",
            record.mm_per_pixel,
            record.offset_px.dx(),
            record.offset_px.dy()
        ),
        Err(Error::Cancelled) => info!("Calibration aborted by operator"),
        Err(e) => error!("Calibration failed: {}", e),
    }
    outcome
}

/// Run the procedure on a borrowed rig. The caller owns release.
///
/// If the procedure stops while the actuator is away from the origin, a
/// best-effort move back to the origin is sent before returning the error.
pub async fn run(
    rig: &mut Rig,
    operator: &mut dyn Operator,
    settings: &CalibrationSettings,
) -> Result<CalibrationRecord> {
    let mut engine = CalibrationEngine::new(settings);
    let mut displaced = false;

    let outcome = drive(rig, operator, settings, &mut engine, &mut displaced).await;
    if outcome.is_err() && displaced {
        let origin = engine.origin();
        warn!("Calibration stopped away from the origin; returning to {}", origin);
        if let Err(e) = rig.channel_mut().move_to(origin.x_mm, origin.y_mm).await {
            warn!("Return to the origin failed: {}", e);
        }
    }
    outcome
}

async fn drive(
    rig: &mut Rig,
    operator: &mut dyn Operator,
    settings: &CalibrationSettings,
    engine: &mut CalibrationEngine,
    displaced: &mut bool,
) -> Result<CalibrationRecord> {
    while let Some(checkpoint) = engine.checkpoint() {
        if !operator.prepare(checkpoint).await? {
            engine.cancel();
            return Err(Error::Cancelled);
        }

        // The marked point and the frame size come from this one frame.
        let frame = rig.camera_mut().capture_retrying(FRAME_ATTEMPTS).await?;
        let Some(point) = operator.mark(checkpoint, &frame).await? else {
            engine.cancel();
            return Err(Error::Cancelled);
        };

        match engine.submit_point(point, frame.size())? {
            Instruction::MoveTo(target) => {
                *displaced = true;
                rig.channel_mut().move_to(target.x_mm, target.y_mm).await?;
                tokio::time::sleep(settings.move_settle()).await;
            }
            Instruction::ReturnForAlignment(target) => {
                rig.channel_mut().move_to(target.x_mm, target.y_mm).await?;
                *displaced = false;
                tokio::time::sleep(settings.move_settle()).await;
            }
            Instruction::Finished(record) => return Ok(record),
        }
    }

    Err(Error::InvalidState(format!(
        "calibration stopped in state {:?}",
        engine.state()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use armlink_core::ArmConfig;
    use armlink_hardware::mock::MockActuatorService;
    use armlink_hardware::SessionManager;

    struct ScriptedOperator {
        points: VecDeque<Option<PixelPoint>>,
        prepared: Vec<Checkpoint>,
        frame_sizes: Vec<(u32, u32)>,
    }

    impl ScriptedOperator {
        fn new(points: impl IntoIterator<Item = Option<PixelPoint>>) -> Self {
            Self {
                points: points.into_iter().collect(),
                prepared: Vec::new(),
                frame_sizes: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Operator for ScriptedOperator {
        async fn prepare(&mut self, checkpoint: Checkpoint) -> Result<bool> {
            self.prepared.push(checkpoint);
            Ok(true)
        }

        async fn mark(
            &mut self,
            _checkpoint: Checkpoint,
            frame: &Frame,
        ) -> Result<Option<PixelPoint>> {
            let size = frame.size();
            self.frame_sizes.push((size.width, size.height));
            Ok(self.points.pop_front().flatten())
        }
    }

    async fn rig(mock: &Arc<MockActuatorService>) -> Rig {
        let config = ArmConfig::synthetic();
        let sessions = SessionManager::new(mock.clone(), config.actuator.clone());
        Rig::open_with(sessions, &config).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_procedure_moves_and_returns() {
        let mock = Arc::new(MockActuatorService::new());
        let mut operator = ScriptedOperator::new([
            Some(PixelPoint::new(240.0, 100.0)),
            Some(PixelPoint::new(240.0, 350.0)),
            Some(PixelPoint::new(250.0, 330.0)),
        ]);

        let record = calibrate(rig(&mock).await, &mut operator, &CalibrationSettings::default())
            .await
            .unwrap();

        assert!((record.mm_per_pixel - 0.2).abs() < 1e-12);
        assert_eq!(record.offset_px.dx(), 10.0);
        assert_eq!(record.offset_px.dy(), 10.0);
        assert_eq!(mock.sent_codes(), vec!["x50y0", "x0y0", "0"]);
        assert_eq!(
            operator.prepared,
            vec![
                Checkpoint::AwaitingPoint1,
                Checkpoint::AwaitingPoint2,
                Checkpoint::AwaitingTip
            ]
        );
        // Canonical frames from a 640x480 sensor
        assert!(operator.frame_sizes.iter().all(|size| *size == (480, 640)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_displacement_fails_and_releases() {
        let mock = Arc::new(MockActuatorService::new());
        let mut operator = ScriptedOperator::new([
            Some(PixelPoint::new(240.0, 100.0)),
            Some(PixelPoint::new(242.0, 102.0)),
        ]);

        let result = calibrate(rig(&mock).await, &mut operator, &CalibrationSettings::default()).await;

        assert!(matches!(result, Err(Error::Validation(_))));
        // Displacement move, return to the origin, then release
        assert_eq!(mock.sent_codes(), vec!["x50y0", "x0y0", "0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_releases_hardware() {
        let mock = Arc::new(MockActuatorService::new());
        let mut operator = ScriptedOperator::new([Some(PixelPoint::new(1.0, 1.0)), None]);

        let result = calibrate(rig(&mock).await, &mut operator, &CalibrationSettings::default()).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(mock.sent_codes(), vec!["x50y0", "x0y0", "0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_at_origin_sends_no_return_move() {
        let mock = Arc::new(MockActuatorService::new());
        let mut operator = ScriptedOperator::new([None]);

        let result = calibrate(rig(&mock).await, &mut operator, &CalibrationSettings::default()).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(mock.sent_codes(), vec!["0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_at_tip_after_return_sends_no_extra_move() {
        let mock = Arc::new(MockActuatorService::new());
        let mut operator = ScriptedOperator::new([
            Some(PixelPoint::new(240.0, 100.0)),
            Some(PixelPoint::new(240.0, 350.0)),
            None,
        ]);

        let result = calibrate(rig(&mock).await, &mut operator, &CalibrationSettings::default()).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(mock.sent_codes(), vec!["x50y0", "x0y0", "0"]);
    }
}
