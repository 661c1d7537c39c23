//! Perception-decision-action loop.
//!
//! Each step homes the actuator, observes, asks the decider, and either
//! clicks, finishes or re-observes. Only a failed HOME ends the run early;
//! every other failure costs one step of the budget.

use serde::Serialize;
use tracing::{info, warn};

use armlink_core::{
    from_normalized, to_physical, AgentSettings, CalibrationRecord, PhysicalPosition, Result,
};

use crate::client::GatewayClient;
use crate::decision::{parse_decision, task_prompt, Decision, DecisionMaker};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The decider reported the task complete
    Finished {
        /// Step on which the finish signal arrived
        step: u32,
    },
    /// The step budget ran out
    BudgetExhausted,
    /// Homing failed; the run was abandoned
    HomeFailed {
        /// Step on which homing failed
        step: u32,
        /// Failure reported by the gateway client
        reason: String,
    },
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Steps started
    pub steps: u32,
    /// Click targets attempted, in order
    pub clicks: Vec<PhysicalPosition>,
    /// Click targets whose dispatch failed
    pub failed_clicks: u32,
}

/// Drives the gateway from decisions.
pub struct ControlLoop<G, D> {
    gateway: G,
    decider: D,
    calibration: CalibrationRecord,
    settings: AgentSettings,
    home: PhysicalPosition,
}

impl<G: GatewayClient, D: DecisionMaker> ControlLoop<G, D> {
    /// Create a loop homing to the actuator origin.
    pub fn new(gateway: G, decider: D, calibration: CalibrationRecord, settings: AgentSettings) -> Self {
        Self {
            gateway,
            decider,
            calibration,
            settings,
            home: PhysicalPosition::origin(),
        }
    }

    /// The gateway client.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The decider.
    pub fn decider(&self) -> &D {
        &self.decider
    }

    /// Run until the decider finishes, homing fails, or the budget runs out.
    pub async fn run(&mut self, instruction: &str) -> Result<RunReport> {
        let prompt = task_prompt(instruction);
        let max_steps = self.settings.max_steps;
        let mut report = RunReport {
            outcome: RunOutcome::BudgetExhausted,
            steps: 0,
            clicks: Vec::new(),
            failed_clicks: 0,
        };
        info!("Starting task: \"{}\" ({} steps max)", instruction, max_steps);

        for step in 1..=max_steps {
            report.steps = step;
            info!("Step {}/{}", step, max_steps);

            // HOME
            if let Err(e) = self.gateway.move_to(self.home).await {
                warn!("Homing failed, ending the run: {}", e);
                report.outcome = RunOutcome::HomeFailed {
                    step,
                    reason: e.to_string(),
                };
                return Ok(report);
            }
            tokio::time::sleep(self.settings.home_settle()).await;

            // OBSERVE
            let observation = match self.gateway.observe().await {
                Ok(observation) => observation,
                Err(e) => {
                    warn!("Observation failed, skipping step: {}", e);
                    continue;
                }
            };

            // DECIDE
            let text = match self.decider.decide(&prompt, &observation).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Decision failed, skipping step: {}", e);
                    continue;
                }
            };

            match parse_decision(&text) {
                Decision::Point { x, y, reason } => {
                    let size = observation.size();
                    let target_px = from_normalized(x, y, size);
                    let target = to_physical(target_px, self.home, size, &self.calibration);
                    info!(
                        "Point ({}, {}) -> pixel ({}, {}) in {}x{} -> {}{}",
                        x,
                        y,
                        target_px.x,
                        target_px.y,
                        size.width,
                        size.height,
                        target,
                        reason.map(|r| format!(": {r}")).unwrap_or_default()
                    );

                    // ACT
                    report.clicks.push(target);
                    if let Err(e) = self.gateway.click(target).await {
                        warn!("Click at {} failed, re-observing next step: {}", target, e);
                        report.failed_clicks += 1;
                    }
                    tokio::time::sleep(self.settings.act_settle()).await;
                }
                Decision::Finish { reason } => {
                    info!(
                        "Task finished on step {}{}",
                        step,
                        reason.map(|r| format!(": {r}")).unwrap_or_default()
                    );
                    report.outcome = RunOutcome::Finished { step };
                    return Ok(report);
                }
                Decision::NoOp { raw } => {
                    warn!("No actionable decision, re-observing: {}", raw);
                }
            }
        }

        info!("Step budget of {} exhausted", max_steps);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use armlink_core::{Error, PixelOffset};

    use crate::client::Observation;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Move(PhysicalPosition),
        Click(PhysicalPosition),
        Observe,
    }

    #[derive(Clone, Default)]
    struct FakeGateway {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_moves_from: Option<usize>,
        fail_observe: bool,
        fail_clicks: bool,
    }

    impl FakeGateway {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> usize {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        }
    }

    fn frame(width: u32, height: u32) -> Observation {
        let image = image::RgbImage::new(width, height);
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
            .encode_image(&image)
            .unwrap();
        Observation::from_jpeg(jpeg).unwrap()
    }

    #[async_trait]
    impl GatewayClient for FakeGateway {
        async fn move_to(&self, target: PhysicalPosition) -> Result<()> {
            let moves = self
                .calls()
                .iter()
                .filter(|call| matches!(call, Call::Move(_)))
                .count();
            self.record(Call::Move(target));
            match self.fail_moves_from {
                Some(n) if moves >= n => Err(Error::Dispatch("timed out".to_string())),
                _ => Ok(()),
            }
        }

        async fn click(&self, target: PhysicalPosition) -> Result<()> {
            self.record(Call::Click(target));
            if self.fail_clicks {
                return Err(Error::Dispatch("500".to_string()));
            }
            Ok(())
        }

        async fn observe(&self) -> Result<Observation> {
            self.record(Call::Observe);
            if self.fail_observe {
                return Err(Error::TransientCapture("stream down".to_string()));
            }
            Ok(frame(640, 480))
        }
    }

    struct ScriptedDecider(VecDeque<&'static str>);

    #[async_trait]
    impl DecisionMaker for ScriptedDecider {
        async fn decide(&mut self, _prompt: &str, _observation: &Observation) -> Result<String> {
            self.0
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| Error::Decision("script exhausted".to_string()))
        }
    }

    fn control(
        gateway: FakeGateway,
        script: impl IntoIterator<Item = &'static str>,
    ) -> ControlLoop<FakeGateway, ScriptedDecider> {
        let calibration = CalibrationRecord::new(0.1, PixelOffset(0.0, 0.0)).unwrap();
        ControlLoop::new(
            gateway,
            ScriptedDecider(script.into_iter().collect()),
            calibration,
            AgentSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_point_then_finish() {
        let gateway = FakeGateway::default();
        let mut control = control(
            gateway.clone(),
            [r#"{"POINT":[500,500]}"#, r#"{"STATUS":"finish"}"#],
        );

        let report = control.run("tap the middle").await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Finished { step: 2 });
        assert_eq!(report.clicks, vec![PhysicalPosition::origin()]);
        let origin = PhysicalPosition::origin();
        assert_eq!(
            gateway.calls(),
            vec![
                Call::Move(origin),
                Call::Observe,
                Call::Click(origin),
                Call::Move(origin),
                Call::Observe,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_point_is_rescaled_and_transformed() {
        let gateway = FakeGateway::default();
        let mut control = control(gateway.clone(), [r#"{"POINT":[750,250]}"#, r#"{"STATUS":"finish"}"#]);

        let report = control.run("tap").await.unwrap();
        // (480, 120) px against the (320, 240) center at 0.1 mm/px
        let target = report.clicks[0];
        assert!((target.x_mm - 16.0).abs() < 1e-9);
        assert!((target.y_mm + 12.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_home_ends_run() {
        let gateway = FakeGateway {
            fail_moves_from: Some(1),
            ..FakeGateway::default()
        };
        let mut control = control(gateway.clone(), [r#"{"POINT":[10,10]}"#; 5]);

        let report = control.run("tap").await.unwrap();
        assert!(matches!(report.outcome, RunOutcome::HomeFailed { step: 2, .. }));
        assert_eq!(report.steps, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observation_failure_skips_step() {
        let gateway = FakeGateway {
            fail_observe: true,
            ..FakeGateway::default()
        };
        let mut control = control(gateway.clone(), []);

        let report = control.run("tap").await.unwrap();
        assert_eq!(report.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(report.steps, 10);
        assert!(report.clicks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_op_and_failed_click_consume_steps() {
        let gateway = FakeGateway {
            fail_clicks: true,
            ..FakeGateway::default()
        };
        let mut control = control(
            gateway.clone(),
            ["I am not sure", r#"{"POINT":[500,500]}"#, r#"{"STATUS":"finish"}"#],
        );

        let start = tokio::time::Instant::now();
        let report = control.run("tap").await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Finished { step: 3 });
        assert_eq!(report.failed_clicks, 1);
        // Three home settles plus one act settle
        assert!(start.elapsed() >= std::time::Duration::from_secs(9));
    }
}
