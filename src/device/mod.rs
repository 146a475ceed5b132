pub mod reader;

use std::time::Duration;

use tracing::{debug, info};

use crate::bluetooth::{DeviceAddress, PlatformTransport, Transport};
use crate::error::Result;
use crate::protocol::reply::{
    decode_battery_reply, decode_firmware_reply, BATTERY_REPLY_SIZE, FIRMWARE_REPLY_SIZE,
};
use crate::protocol::{
    BeepVolume, Command, EqBands, EqMode, LightAction, PairingMode, ShutdownTimeout,
};
use reader::{ResponseReader, REPLY_TIMEOUT};

/// Command client for one speaker connection.
///
/// Owns the transport exclusively. Every operation takes `&mut self`, so a
/// connection has at most one request in flight; callers sharing a client
/// across tasks should hold a `tokio::sync::Mutex` for the whole
/// request/response pair. Errors are returned as-is and never retried.
pub struct SpeakerClient<T = PlatformTransport> {
    transport: T,
    reply_timeout: Duration,
}

impl SpeakerClient<PlatformTransport> {
    /// Connect to the speaker with the platform RFCOMM backend.
    pub async fn connect(address: DeviceAddress, channel: u8) -> Result<Self> {
        let transport = PlatformTransport::connect(address, channel).await?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> SpeakerClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            reply_timeout: REPLY_TIMEOUT,
        }
    }

    /// Override the window query operations wait for a reply.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        debug!("{}: {}", command.name(), command.to_hex());
        self.transport.send(&command.encode()).await
    }

    pub async fn set_custom_eq(&mut self, bands: &EqBands) -> Result<()> {
        self.execute(Command::SetEq(*bands)).await
    }

    pub async fn set_mode(&mut self, mode: EqMode) -> Result<()> {
        self.execute(Command::SetMode(mode)).await
    }

    /// Apply a named light action (`default`, `off`) or a 6-digit RGB hex
    /// color. `solid` picks a steady color over one that dances to the music.
    pub async fn handle_light_action(&mut self, action: &str, solid: bool) -> Result<()> {
        let action = LightAction::parse(action, solid)?;
        self.execute(Command::Light(action)).await
    }

    pub async fn set_shutdown_timeout(&mut self, timeout: ShutdownTimeout) -> Result<()> {
        self.execute(Command::ShutdownTimeout(timeout)).await
    }

    pub async fn power_off(&mut self) -> Result<()> {
        self.execute(Command::PowerOff).await
    }

    pub async fn set_pairing(&mut self, mode: PairingMode) -> Result<()> {
        self.execute(Command::Pairing(mode)).await
    }

    pub async fn set_beep_volume(&mut self, volume: BeepVolume) -> Result<()> {
        self.execute(Command::BeepVolume(volume)).await
    }

    /// Send a hand-written hex message unchanged.
    pub async fn send_raw(&mut self, hex_msg: &str) -> Result<()> {
        let command = Command::raw(hex_msg)?;
        self.execute(command).await
    }

    /// Battery charge in percent.
    pub async fn read_battery_level(&mut self) -> Result<u8> {
        let level = ResponseReader::new(&mut self.transport, self.reply_timeout)
            .query(&Command::BatteryLevel, BATTERY_REPLY_SIZE, decode_battery_reply)
            .await?;
        debug!("Battery level: {}%", level);
        Ok(level)
    }

    pub async fn read_firmware_name(&mut self) -> Result<String> {
        let name = ResponseReader::new(&mut self.transport, self.reply_timeout)
            .query(&Command::FirmwareName, FIRMWARE_REPLY_SIZE, decode_firmware_reply)
            .await?;
        debug!("Firmware package: {}", name);
        Ok(name)
    }

    /// Close the connection. Calling it again, or any other operation
    /// afterwards, returns a transport error.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await?;
        info!("Speaker connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::mock::MockTransport;
    use crate::error::Error;
    use crate::protocol::hex;

    fn client() -> SpeakerClient<MockTransport> {
        SpeakerClient::new(MockTransport::new())
    }

    fn sent_hex(client: &mut SpeakerClient<MockTransport>) -> Vec<String> {
        client
            .transport_mut()
            .sent
            .iter()
            .map(|b| hex::encode(b))
            .collect()
    }

    #[tokio::test]
    async fn test_write_commands_in_order() {
        let mut c = client();
        c.set_custom_eq(&"0,0,0,0,0,0,0,0,0,0".parse::<EqBands>().unwrap()).await.unwrap();
        c.set_mode(EqMode::Boom).await.unwrap();
        c.handle_light_action("1a2b3c", true).await.unwrap();
        c.set_shutdown_timeout(ShutdownTimeout::Never).await.unwrap();
        c.power_off().await.unwrap();
        c.set_pairing(PairingMode::Off).await.unwrap();
        c.set_beep_volume(BeepVolume::V25).await.unwrap();
        c.send_raw("EFB0FE").await.unwrap();

        assert_eq!(
            sent_hex(&mut c),
            vec![
                "efb0450b010000000000000000000000fe",
                "efb046010607fe",
                "efb09504011a2b3c00fe",
                "efb07501ff00fe",
                "efb025010102fe",
                "efb035010001fe",
                "efb065010203fe",
                "efb0fe",
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_send_nothing() {
        let mut c = client();
        assert!(matches!(
            c.handle_light_action("xyz123", false).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(c.send_raw("efb").await, Err(Error::Encoding(_))));
        assert!(c.transport_mut().sent.is_empty());
    }

    #[tokio::test]
    async fn test_send_error_propagates() {
        let mut c = client();
        c.transport_mut().fail_send = true;
        assert!(matches!(c.power_off().await, Err(Error::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_battery_level() {
        let transport = MockTransport::new()
            .then_data(10, &[0xEF, 0xB0, 0x95, 0x04])
            .then_data(10, &[0xEF, 0xA0, 0x14, 0x01, 0x32, 0x00, 0xFE]);
        let mut c = SpeakerClient::new(transport);
        assert_eq!(c.read_battery_level().await.unwrap(), 50);
        assert_eq!(sent_hex(&mut c), vec!["efa0140000fe"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_firmware_name() {
        let mut reply = vec![0xEF, 0xA0, 0x10, 0x08];
        reply.extend_from_slice(b"UBOOMX01");
        reply.push(0xFE);
        let transport = MockTransport::new()
            .then_data(10, &[0xEF, 0xA0, 0x14, 0x01, 0x32])
            .then_data(10, &reply);
        let mut c = SpeakerClient::new(transport);
        assert_eq!(c.read_firmware_name().await.unwrap(), "UBOOMX01");
        assert_eq!(sent_hex(&mut c), vec!["efa0100000fe"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_reply_timeout() {
        let mut c = client().with_reply_timeout(Duration::from_secs(1));
        let start = tokio::time::Instant::now();
        assert!(matches!(
            c.read_firmware_name().await,
            Err(Error::Timeout(d)) if d == Duration::from_secs(1)
        ));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < REPLY_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_reply_timeout() {
        let transport = MockTransport::new().then_data(10, &[0xEF, 0xA0, 0x14, 0x01, 0x32]);
        let mut c =
            SpeakerClient::new(transport).with_reply_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(c.read_battery_level().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_close_exactly_once() {
        let mut c = client();
        c.close().await.unwrap();
        assert!(c.transport_mut().is_closed());
        assert!(matches!(c.close().await, Err(Error::Transport(_))));
        assert!(matches!(c.power_off().await, Err(Error::Transport(_))));
        assert!(matches!(c.read_battery_level().await, Err(Error::Transport(_))));
    }
}
