//! Line-oriented operator front end.
//!
//! At each checkpoint the current frame is written to a preview JPEG; the
//! operator opens it, reads off the pixel and types `x y`. `q` (or end of
//! input) aborts.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use armlink_core::{PixelPoint, Result};
use armlink_hardware::Frame;

use crate::engine::Checkpoint;
use crate::procedure::Operator;

/// Operator reading coordinates from a line stream.
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
    preview: PathBuf,
    jpeg_quality: u8,
}

impl<R, W> ConsoleOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a console operator writing previews to `preview`.
    pub fn new(input: R, output: W, preview: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            input,
            output,
            preview: preview.into(),
            jpeg_quality,
        }
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

/// Parse `x y` or `x,y`.
pub fn parse_point(line: &str) -> Option<PixelPoint> {
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty());
    let x = parts.next()?.parse::<f64>().ok()?;
    let y = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(PixelPoint::new(x, y))
}

fn is_abort(line: &str) -> bool {
    line.eq_ignore_ascii_case("q")
}

#[async_trait]
impl<R, W> Operator for ConsoleOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn prepare(&mut self, checkpoint: Checkpoint) -> Result<bool> {
        let prompt = match checkpoint {
            Checkpoint::AwaitingPoint1 => {
                "Step 1: place the cross mark in view, then press Enter (q aborts)\n"
            }
            Checkpoint::AwaitingPoint2 => return Ok(true),
            Checkpoint::AwaitingTip => {
                "Step 2: align the effector tip with the cross mark, then press Enter (q aborts)\n"
            }
        };
        self.say(prompt).await?;
        Ok(match self.read_line().await? {
            Some(line) => !is_abort(&line),
            None => false,
        })
    }

    async fn mark(&mut self, checkpoint: Checkpoint, frame: &Frame) -> Result<Option<PixelPoint>> {
        let jpeg = frame.to_jpeg(self.jpeg_quality)?;
        tokio::fs::write(&self.preview, jpeg).await?;
        debug!("Wrote preview for {} to {}", checkpoint, self.preview.display());

        let size = frame.size();
        let target = match checkpoint {
            Checkpoint::AwaitingTip => "the effector tip",
            _ => "the center of the cross mark",
        };
        let prompt = format!(
            "[{}] Open {} ({}x{}) and enter the pixel of {} as 'x y':\n",
            checkpoint,
            self.preview.display(),
            size.width,
            size.height,
            target
        );
        self.say(&prompt).await?;

        loop {
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };
            if is_abort(&line) {
                return Ok(None);
            }
            match parse_point(&line) {
                Some(point) => return Ok(Some(point)),
                None => {
                    warn!("Could not parse '{}' as a pixel coordinate", line);
                    self.say("Expected two numbers, e.g. '320 240':\n").await?;
                }
            }
        }
    }
}
