//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use async_trait::async_trait;

use super::{DeviceAddress, Transport};
use crate::error::{Error, Result};

/// One scripted `receive` outcome, delivered after `delay`.
pub(crate) enum Step {
    Data(Duration, Vec<u8>),
    Fail(Duration, io::ErrorKind),
}

#[derive(Default)]
pub(crate) struct MockTransport {
    pub sent: Vec<Vec<u8>>,
    pub receive_calls: usize,
    pub fail_send: bool,
    script: VecDeque<Step>,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_data(mut self, delay_ms: u64, data: &[u8]) -> Self {
        self.script
            .push_back(Step::Data(Duration::from_millis(delay_ms), data.to_vec()));
        self
    }

    pub fn then_fail(mut self, delay_ms: u64, kind: io::ErrorKind) -> Self {
        self.script
            .push_back(Step::Fail(Duration::from_millis(delay_ms), kind));
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(_address: DeviceAddress, _channel: u8) -> Result<Self> {
        Ok(Self::new())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::closed());
        }
        if self.fail_send {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock send failure",
            )));
        }
        self.sent.push(data.to_vec());
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::closed());
        }
        self.receive_calls += 1;
        match self.script.pop_front() {
            Some(Step::Data(delay, mut data)) => {
                tokio::time::sleep(delay).await;
                data.truncate(max_bytes);
                Ok(data)
            }
            Some(Step::Fail(delay, kind)) => {
                tokio::time::sleep(delay).await;
                Err(Error::Transport(io::Error::new(kind, "mock receive failure")))
            }
            // Script exhausted: the speaker stays silent
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::closed());
        }
        self.closed = true;
        Ok(())
    }
}
