//! Scripted actuator service for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use armlink_core::{Error, Result};

use crate::codes::CommandCode;
use crate::service::ActuatorService;

/// One scripted reply to an acquisition request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with this body
    Body(String),
    /// Fail as if the service could not be reached
    Unreachable,
}

impl MockReply {
    /// Respond with `body`.
    pub fn body(body: impl Into<String>) -> Self {
        MockReply::Body(body.into())
    }

    /// Fail the request at the transport level.
    pub fn unreachable() -> Self {
        MockReply::Unreachable
    }
}

/// In-memory [`ActuatorService`] that replays scripted acquisition replies and
/// records every command it receives.
#[derive(Debug)]
pub struct MockActuatorService {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    acquisitions: AtomicU32,
    commands: Mutex<Vec<(i64, String)>>,
    failing_sends: AtomicU32,
}

impl MockActuatorService {
    /// A service that grants handle 1 on the first request.
    pub fn new() -> Self {
        Self::always(MockReply::body("1"))
    }

    /// A service that gives the same reply to every acquisition.
    pub fn always(reply: MockReply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply,
            acquisitions: AtomicU32::new(0),
            commands: Mutex::new(Vec::new()),
            failing_sends: AtomicU32::new(0),
        }
    }

    /// A service that plays `replies` in order, then keeps repeating the last one.
    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let replies: VecDeque<MockReply> = replies.into_iter().collect();
        let fallback = replies.back().cloned().unwrap_or(MockReply::Unreachable);
        Self {
            replies: Mutex::new(replies),
            ..Self::always(fallback)
        }
    }

    /// Make the next `count` command sends fail.
    pub fn fail_next_sends(&self, count: u32) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Number of acquisition requests received.
    pub fn acquisition_count(&self) -> u32 {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Command codes received, in order, including failed sends.
    pub fn sent_codes(&self) -> Vec<String> {
        self.lock_commands()
            .iter()
            .map(|(_, code)| code.clone())
            .collect()
    }

    /// Handles and codes received, in order.
    pub fn sent_commands(&self) -> Vec<(i64, String)> {
        self.lock_commands().clone()
    }

    /// Forget recorded commands.
    pub fn clear_commands(&self) {
        self.lock_commands().clear();
    }

    fn lock_commands(&self) -> std::sync::MutexGuard<'_, Vec<(i64, String)>> {
        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockActuatorService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActuatorService for MockActuatorService {
    async fn request_handle(&self, _port: &str) -> Result<String> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            MockReply::Body(body) => Ok(body),
            MockReply::Unreachable => Err(Error::Dispatch(
                "mock service unreachable".to_string(),
            )),
        }
    }

    async fn send_command(&self, handle: i64, code: &CommandCode) -> Result<()> {
        self.lock_commands().push((handle, code.as_str().to_string()));
        let failing = self.failing_sends.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_sends.store(failing - 1, Ordering::SeqCst);
            return Err(Error::Dispatch(format!("mock send of '{code}' failed")));
        }
        Ok(())
    }
}
