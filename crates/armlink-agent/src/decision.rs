//! The decision collaborator seam and its payload format.
//!
//! A decider sees the task prompt and one observation and answers with
//! free text that should contain a JSON object: `{"POINT": [x, y], ...}`
//! with coordinates on a 0-1000 scale per axis, or
//! `{"STATUS": "finish", ...}`. Anything else is a no-op step.

use async_trait::async_trait;
use serde_json::Value;

use armlink_core::Result;

use crate::client::Observation;

/// External decision maker.
#[async_trait]
pub trait DecisionMaker: Send {
    /// Return the raw decision text for `prompt` and `observation`.
    async fn decide(&mut self, prompt: &str, observation: &Observation) -> Result<String>;
}

/// A parsed decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Click a normalized point of interest
    Point {
        /// Horizontal position, 0-1000
        x: f64,
        /// Vertical position, 0-1000
        y: f64,
        /// Stated reason, if any
        reason: Option<String>,
    },
    /// The task is complete
    Finish {
        /// Stated reason, if any
        reason: Option<String>,
    },
    /// Neither shape; re-observe
    NoOp {
        /// What the decider said
        raw: String,
    },
}

/// Extract and classify the JSON object between the first `{` and the last `}`.
pub fn parse_decision(text: &str) -> Decision {
    let no_op = || Decision::NoOp {
        raw: text.to_string(),
    };
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return no_op();
    };
    if end < start {
        return no_op();
    }
    let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) else {
        return no_op();
    };

    let reason = value
        .get("REASON")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(point) = value.get("POINT") {
        return match point.as_array().map(Vec::as_slice) {
            Some([x, y]) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    Decision::Point { x, y, reason }
                }
                _ => no_op(),
            },
            _ => no_op(),
        };
    }
    if value.get("STATUS").and_then(Value::as_str) == Some("finish") {
        return Decision::Finish { reason };
    }
    no_op()
}

/// Prompt sent with every observation.
pub fn task_prompt(instruction: &str) -> String {
    format!(
        r#"You are an agent controlling a robot arm that taps on a screen. Complete the overall instruction step by step using the current screenshot.
Respond with strict JSON.
---
Overall instruction: <Question>{instruction}</Question>
---
Think it through:
1. Observe: note the key elements visible on the screen.
2. Judge: compare what you see with the instruction and decide whether it is fully complete.
3. Decide:
   * If the task is not complete, give the next point to tap: {{"POINT": [x, y], "REASON": "why this point"}}
     x and y range from 0 to 1000 across the width and height of the screenshot.
   * Only when every requirement of the instruction is met, return: {{"STATUS": "finish", "REASON": "how the task was completed"}}
---
Current screenshot:"#
    )
}
