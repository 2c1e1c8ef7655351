use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::debug;

use crate::error::{HubError, Result};

/// Executes source text in the hub's interpreter
///
/// Implementations handle one request at a time; the hub serializes access for its
/// facade nodes.
#[async_trait]
pub trait Transport: Send {
    /// Run `source` and return what it printed
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RemoteEvaluation`] if the interpreter raised, or a connection
    /// error if the channel broke.
    async fn execute(&mut self, source: &str) -> Result<Bytes>;

    /// Leave the interpreter session; later executes fail with [`HubError::Disconnected`]
    ///
    /// # Errors
    ///
    /// Returns a connection error if the channel broke while closing.
    async fn close(&mut self) -> Result<()>;
}

#[derive(Debug)]
enum MockReply {
    Output(Bytes),
    Exception(String),
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    requests: Vec<String>,
    closed: bool,
}

/// In-memory transport that replays queued replies and records every request
///
/// Clones share the same queue and log, so a test can keep one clone while the hub owns
/// the other.
///
/// ```
/// use hubrepl::{Hub, MockTransport};
///
/// # #[tokio::main]
/// # async fn main() -> hubrepl::Result<()> {
/// let transport = MockTransport::new();
/// transport.push_reply("8294\r\n");
///
/// let hub = Hub::from_transport(transport.clone());
/// assert_eq!(hub.battery().voltage().await?, 8294);
/// assert_eq!(transport.requests(), ["print(repr(hub.battery.voltage()))"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a transport with no queued replies
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue printed output for the next request
    pub fn push_reply(&self, output: impl Into<Bytes>) -> &Self {
        self.state().replies.push_back(MockReply::Output(output.into()));
        self
    }

    /// Queue a remote exception for the next request
    pub fn push_exception(&self, traceback: impl Into<String>) -> &Self {
        self.state()
            .replies
            .push_back(MockReply::Exception(traceback.into()));
        self
    }

    /// Every source text executed so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    /// Number of queued replies not yet consumed
    #[must_use]
    pub fn pending_replies(&self) -> usize {
        self.state().replies.len()
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&mut self, source: &str) -> Result<Bytes> {
        let mut state = self.state();
        if state.closed {
            return Err(HubError::Disconnected);
        }
        state.requests.push(source.to_string());
        debug!("Mock transport executing: {source}");
        match state.replies.pop_front() {
            Some(MockReply::Output(output)) => Ok(output),
            Some(MockReply::Exception(traceback)) => {
                let reply = Bytes::from(traceback.clone());
                Err(HubError::remote(traceback, reply))
            }
            None => Err(HubError::Protocol(format!(
                "mock transport has no reply queued for {source:?}"
            ))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_mock_replays_in_order() {
        let mock = MockTransport::new();
        mock.push_reply("1\r\n").push_reply(&b"2\r\n"[..]);

        let mut transport = mock.clone();
        assert_eq!(assert_ok!(transport.execute("a").await), Bytes::from("1\r\n"));
        assert_eq!(assert_ok!(transport.execute("b").await), Bytes::from("2\r\n"));
        assert_eq!(mock.requests(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(mock.pending_replies(), 0);

        let err = assert_err!(transport.execute("c").await);
        assert!(matches!(err, HubError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_mock_exception_and_close() {
        let mock = MockTransport::new();
        mock.push_exception("Traceback (most recent call last):\r\nValueError: bad\r\n");

        let mut transport = mock.clone();
        let err = assert_err!(transport.execute("boom()").await);
        assert!(err.is_remote_error());
        assert!(err.to_string().contains("ValueError"));

        assert_ok!(transport.close().await);
        assert!(mock.is_closed());
        let err = assert_err!(transport.execute("x").await);
        assert!(matches!(err, HubError::Disconnected));
    }
}
