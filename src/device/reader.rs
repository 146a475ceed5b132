use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::trace;

use crate::bluetooth::Transport;
use crate::error::{Error, Result};
use crate::protocol::Command;

/// Default window for a query reply.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap for windows too long to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Query state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Sending,
    Awaiting,
    Matched,
    TimedOut,
    TransportError,
}

impl ReadState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Sending | Self::Awaiting)
    }
}

/// Sends one query and reads until a matching reply, an error, or the
/// deadline. Unrelated frames in between are dropped.
pub struct ResponseReader<'a, T> {
    transport: &'a mut T,
    timeout: Duration,
    state: ReadState,
}

impl<'a, T: Transport> ResponseReader<'a, T> {
    pub fn new(transport: &'a mut T, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            state: ReadState::Sending,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    fn set_state(&mut self, state: ReadState) {
        trace!("Reply reader: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Send `request`, then read `buf_size`-byte chunks until `decode`
    /// accepts one.
    pub async fn query<R, F>(&mut self, request: &Command, buf_size: usize, decode: F) -> Result<R>
    where
        F: Fn(&[u8]) -> Option<R>,
    {
        self.set_state(ReadState::Sending);
        if let Err(e) = self.transport.send(&request.encode()).await {
            self.set_state(ReadState::TransportError);
            return Err(e);
        }

        self.set_state(ReadState::Awaiting);
        let now = Instant::now();
        let deadline = now
            .checked_add(self.timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        loop {
            match timeout_at(deadline, self.transport.receive(buf_size)).await {
                Err(_) => {
                    self.set_state(ReadState::TimedOut);
                    return Err(Error::Timeout(self.timeout));
                }
                Ok(Err(e)) => {
                    self.set_state(ReadState::TransportError);
                    return Err(e);
                }
                Ok(Ok(data)) => match decode(&data) {
                    Some(value) => {
                        self.set_state(ReadState::Matched);
                        return Ok(value);
                    }
                    None => trace!("Discarding {} unrelated bytes", data.len()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::bluetooth::mock::MockTransport;
    use crate::protocol::reply::{decode_battery_reply, BATTERY_REPLY_SIZE};

    const NOISE: [u8; 7] = [0xEF, 0xB0, 0x46, 0x01, 0x01, 0x02, 0xFE];
    const BATTERY_75: [u8; 7] = [0xEF, 0xA0, 0x14, 0x01, 0x4B, 0x00, 0xFE];

    async fn read_battery(transport: &mut MockTransport) -> (Result<u8>, ReadState) {
        let mut reader = ResponseReader::new(transport, REPLY_TIMEOUT);
        let result = reader
            .query(&Command::BatteryLevel, BATTERY_REPLY_SIZE, decode_battery_reply)
            .await;
        (result, reader.state())
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_after_noise_near_deadline() {
        // 49 unrelated frames 100 ms apart, then the reply at 4.95 s
        let mut transport = MockTransport::new();
        for _ in 0..49 {
            transport = transport.then_data(100, &NOISE);
        }
        transport = transport.then_data(50, &BATTERY_75);

        let start = Instant::now();
        let (result, state) = read_battery(&mut transport).await;
        assert_eq!(result.unwrap(), 75);
        assert_eq!(state, ReadState::Matched);
        assert!(start.elapsed() >= Duration::from_millis(4950));
        assert!(start.elapsed() < REPLY_TIMEOUT);
        assert_eq!(transport.sent, vec![vec![0xEF, 0xA0, 0x14, 0x00, 0x00, 0xFE]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_reply() {
        let mut transport = MockTransport::new();
        let start = Instant::now();
        let (result, state) = read_battery(&mut transport).await;
        assert!(matches!(result, Err(Error::Timeout(d)) if d == REPLY_TIMEOUT));
        assert_eq!(state, ReadState::TimedOut);
        assert!(start.elapsed() >= REPLY_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noise_only_times_out() {
        let mut transport = MockTransport::new();
        for _ in 0..100 {
            transport = transport.then_data(100, &NOISE);
        }
        let start = Instant::now();
        let (result, _) = read_battery(&mut transport).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(start.elapsed() >= REPLY_TIMEOUT);
        assert!(transport.receive_calls <= 51);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_error_ends_early() {
        let mut transport = MockTransport::new()
            .then_data(100, &NOISE)
            .then_fail(200, io::ErrorKind::ConnectionReset);
        let start = Instant::now();
        let (result, state) = read_battery(&mut transport).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(state, ReadState::TransportError);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_skips_reading() {
        let mut transport = MockTransport::new().then_data(0, &BATTERY_75);
        transport.fail_send = true;
        let (result, state) = read_battery(&mut transport).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(state, ReadState::TransportError);
        assert_eq!(transport.receive_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_still_reads() {
        let mut transport = MockTransport::new().then_data(10, &BATTERY_75);
        let mut reader = ResponseReader::new(&mut transport, Duration::from_secs(u64::MAX));
        let level = reader
            .query(&Command::BatteryLevel, BATTERY_REPLY_SIZE, decode_battery_reply)
            .await
            .unwrap();
        assert_eq!(level, 75);
        assert_eq!(reader.state(), ReadState::Matched);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ReadState::Sending.is_terminal());
        assert!(!ReadState::Awaiting.is_terminal());
        assert!(ReadState::Matched.is_terminal());
        assert!(ReadState::TimedOut.is_terminal());
        assert!(ReadState::TransportError.is_terminal());
    }
}
