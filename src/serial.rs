use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{sleep, timeout, timeout_at, Instant},
};
use tokio_serial::{SerialPortBuilderExt, SerialPortInfo, SerialPortType, SerialStream};
use tracing::{debug, info, warn};

use crate::{
    error::{HubError, Result},
    transport::Transport,
    types::{ConnectionParams, DeviceInfo, TimeoutConfig},
};

/// Banner printed when the interpreter enters raw REPL mode
pub const RAW_REPL_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n";

const CTRL_A: u8 = 0x01;
const CTRL_B: u8 = 0x02;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;

/// Serial port discovery
pub struct PortScanner;

impl PortScanner {
    /// List every serial port on the system
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serial`] if the ports cannot be enumerated.
    pub fn scan() -> Result<Vec<DeviceInfo>> {
        let ports = tokio_serial::available_ports()?;
        let devices: Vec<DeviceInfo> = ports.into_iter().map(DeviceInfo::from).collect();
        debug!("Found {} serial port(s)", devices.len());
        Ok(devices)
    }

    /// Find the first port whose USB ids are the hub's
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DeviceNotFound`] if no port matches, or [`HubError::Serial`]
    /// if the ports cannot be enumerated.
    pub fn find_hub() -> Result<DeviceInfo> {
        let devices = Self::scan()?;
        select_hub(&devices).cloned()
    }
}

/// Pick the hub out of a list of ports
///
/// The first port with the hub's vendor and product ids wins, in the given order.
///
/// # Errors
///
/// Returns [`HubError::DeviceNotFound`] if no port matches.
pub fn select_hub(devices: &[DeviceInfo]) -> Result<&DeviceInfo> {
    let mut hubs = devices.iter().filter(|d| d.is_hub());
    let first = hubs.next().ok_or(HubError::DeviceNotFound)?;
    let others = hubs.count();
    if others > 0 {
        warn!(
            "Found {} hubs, using the first one at {}",
            others + 1,
            first.path
        );
    }
    info!("Found hub at {}", first.path);
    Ok(first)
}

impl From<SerialPortInfo> for DeviceInfo {
    fn from(port: SerialPortInfo) -> Self {
        match port.port_type {
            SerialPortType::UsbPort(usb) => Self {
                path: port.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number,
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::new(port.port_name),
        }
    }
}

/// Raw REPL session over a byte stream
///
/// In raw mode the interpreter does not echo: each snippet is sent followed by Ctrl-D, the hub
/// answers `OK`, then the snippet's stdout and stderr, each terminated by Ctrl-D, and finally
/// the `>` prompt for the next snippet.
#[derive(Debug)]
pub struct RawRepl<S> {
    stream: S,
    buffer: BytesMut,
    timeouts: TimeoutConfig,
    prompt_consumed: bool,
    closed: bool,
}

impl RawRepl<SerialStream> {
    /// Open a serial port and enter the raw REPL
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serial`] if the port cannot be opened, or a timeout or
    /// connection error if the hub does not enter raw mode.
    pub async fn open(
        path: &str,
        params: &ConnectionParams,
        timeouts: TimeoutConfig,
    ) -> Result<Self> {
        info!("Opening serial port {path} at {} baud", params.baud_rate);
        let stream = tokio_serial::new(path, params.baud_rate).open_native_async()?;
        Self::enter(stream, params.soft_reset, timeouts).await
    }
}

impl<S> RawRepl<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Interrupt whatever runs on the hub and switch it to raw REPL mode
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Timeout`] if the banner does not arrive in time, or
    /// [`HubError::Disconnected`] if the stream ends.
    pub async fn enter(stream: S, soft_reset: bool, timeouts: TimeoutConfig) -> Result<Self> {
        let mut repl = Self {
            stream,
            buffer: BytesMut::with_capacity(1024),
            timeouts,
            prompt_consumed: false,
            closed: false,
        };

        repl.write(&[b'\r', CTRL_C, CTRL_C]).await?;
        repl.drain().await?;

        repl.write(&[b'\r', CTRL_A]).await?;
        let enter_timeout = repl.timeouts.enter_raw_repl_timeout_ms;
        let mut banner = RAW_REPL_BANNER.to_vec();
        banner.push(b'>');
        repl.read_until(&banner, enter_timeout, "raw REPL banner")
            .await?;
        repl.prompt_consumed = true;

        if soft_reset {
            repl.write(&[CTRL_D]).await?;
            repl.read_until(b"soft reboot\r\n", enter_timeout, "soft reboot")
                .await?;
            repl.read_until(RAW_REPL_BANNER, enter_timeout, "raw REPL banner after reboot")
                .await?;
            repl.prompt_consumed = false;
        }

        info!("Hub entered raw REPL");
        Ok(repl)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Discard input until the hub has been quiet for the drain period
    async fn drain(&mut self) -> Result<()> {
        let quiet = Duration::from_millis(self.timeouts.drain_timeout_ms);
        loop {
            match timeout(quiet, self.stream.read_buf(&mut self.buffer)).await {
                Ok(Ok(0)) => return Err(HubError::Disconnected),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }
        if !self.buffer.is_empty() {
            debug!("Drained {} stale byte(s)", self.buffer.len());
        }
        self.buffer.clear();
        Ok(())
    }

    async fn fill(&mut self, deadline: Instant, timeout_ms: u64, waiting_for: &str) -> Result<()> {
        let read = timeout_at(deadline, self.stream.read_buf(&mut self.buffer))
            .await
            .map_err(|_| HubError::Timeout {
                timeout_ms,
                waiting_for: waiting_for.to_string(),
            })??;
        if read == 0 {
            return Err(HubError::Disconnected);
        }
        Ok(())
    }

    /// Read up to and including `pattern`
    async fn read_until(
        &mut self,
        pattern: &[u8],
        timeout_ms: u64,
        waiting_for: &str,
    ) -> Result<Bytes> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(index) = find(&self.buffer, pattern) {
                return Ok(self.buffer.split_to(index + pattern.len()).freeze());
            }
            self.fill(deadline, timeout_ms, waiting_for).await?;
        }
    }

    async fn read_exact_bytes(
        &mut self,
        count: usize,
        timeout_ms: u64,
        waiting_for: &str,
    ) -> Result<Bytes> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        while self.buffer.len() < count {
            self.fill(deadline, timeout_ms, waiting_for).await?;
        }
        Ok(self.buffer.split_to(count).freeze())
    }

    /// Read one Ctrl-D terminated section of a reply, without the terminator
    async fn read_section(&mut self, waiting_for: &str) -> Result<Bytes> {
        let mut section = self
            .read_until(&[CTRL_D], self.timeouts.command_timeout_ms, waiting_for)
            .await?;
        section.truncate(section.len() - 1);
        Ok(section)
    }

    async fn send_source(&mut self, source: &str) -> Result<()> {
        let chunk_size = self.timeouts.write_chunk_size.max(1);
        let delay = Duration::from_millis(self.timeouts.write_chunk_delay_ms);
        let mut chunks = source.as_bytes().chunks(chunk_size).peekable();
        while let Some(chunk) = chunks.next() {
            self.stream.write_all(chunk).await?;
            if chunks.peek().is_some() && !delay.is_zero() {
                self.stream.flush().await?;
                sleep(delay).await;
            }
        }
        self.write(&[CTRL_D]).await
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[async_trait]
impl<S> Transport for RawRepl<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn execute(&mut self, source: &str) -> Result<Bytes> {
        if self.closed {
            return Err(HubError::Disconnected);
        }
        let command_timeout = self.timeouts.command_timeout_ms;
        if !self.prompt_consumed {
            self.read_until(b">", command_timeout, "raw REPL prompt")
                .await?;
        }
        self.prompt_consumed = false;

        self.send_source(source).await?;

        let ack = self
            .read_exact_bytes(2, command_timeout, "command acknowledgement")
            .await?;
        if ack[..] != b"OK"[..] {
            return Err(HubError::Protocol(format!(
                "could not exec command, hub answered {ack:?}"
            )));
        }

        let stdout = self.read_section("command output").await?;
        let stderr = self.read_section("command error output").await?;
        if !stderr.is_empty() {
            let traceback = String::from_utf8_lossy(&stderr).trim().to_string();
            debug!("Hub raised: {traceback}");
            return Err(HubError::remote(traceback, stderr));
        }
        Ok(stdout)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write(&[b'\r', CTRL_B]).await?;
        info!("Left raw REPL");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};
    use tokio_test::{assert_err, assert_ok};

    type Responder = fn(&str) -> (String, String);

    /// Minimal raw REPL firmware: answers each program through `respond`
    async fn fake_hub(mut io: DuplexStream, respond: Responder) {
        let mut raw = false;
        let mut program = Vec::new();
        let mut byte = [0u8; 1];
        while io.read_exact(&mut byte).await.is_ok() {
            let reply: Vec<u8> = match byte[0] {
                CTRL_A => {
                    raw = true;
                    program.clear();
                    b"\r\nraw REPL; CTRL-B to exit\r\n>".to_vec()
                }
                CTRL_B => {
                    raw = false;
                    b"\r\nMicroPython v1.14\r\n>>> ".to_vec()
                }
                CTRL_C => {
                    program.clear();
                    if raw {
                        Vec::new()
                    } else {
                        b"\r\n>>> ".to_vec()
                    }
                }
                CTRL_D if raw && program.is_empty() => {
                    b"OK\r\nMPY: soft reboot\r\nraw REPL; CTRL-B to exit\r\n>".to_vec()
                }
                CTRL_D if raw => {
                    let source = String::from_utf8_lossy(&program).to_string();
                    program.clear();
                    let (out, err) = respond(&source);
                    let mut reply = b"OK".to_vec();
                    reply.extend_from_slice(out.as_bytes());
                    reply.push(CTRL_D);
                    reply.extend_from_slice(err.as_bytes());
                    reply.push(CTRL_D);
                    reply.push(b'>');
                    reply
                }
                other => {
                    if raw {
                        program.push(other);
                    }
                    Vec::new()
                }
            };
            if !reply.is_empty() && io.write_all(&reply).await.is_err() {
                break;
            }
        }
    }

    fn echo_length(source: &str) -> (String, String) {
        if source.contains("raise") {
            (
                String::new(),
                "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1\r\nValueError: nope\r\n"
                    .to_string(),
            )
        } else {
            (format!("{}\r\n", source.len()), String::new())
        }
    }

    fn quick_timeouts() -> TimeoutConfig {
        TimeoutConfig {
            enter_raw_repl_timeout_ms: 1_000,
            command_timeout_ms: 1_000,
            drain_timeout_ms: 5,
            write_chunk_size: 16,
            write_chunk_delay_ms: 0,
        }
    }

    async fn connected(soft_reset: bool) -> RawRepl<DuplexStream> {
        let (client, firmware) = duplex(4096);
        tokio::spawn(fake_hub(firmware, echo_length));
        assert_ok!(RawRepl::enter(client, soft_reset, quick_timeouts()).await)
    }

    #[tokio::test]
    async fn test_execute_after_soft_reset() {
        let mut repl = connected(true).await;
        let out = assert_ok!(repl.execute("print(repr(1))").await);
        assert_eq!(out, Bytes::from("14\r\n"));

        // The prompt of the previous reply is consumed by the next request
        let out = assert_ok!(repl.execute("x").await);
        assert_eq!(out, Bytes::from("1\r\n"));
    }

    #[tokio::test]
    async fn test_execute_without_soft_reset() {
        let mut repl = connected(false).await;
        let out = assert_ok!(repl.execute("abc").await);
        assert_eq!(out, Bytes::from("3\r\n"));
    }

    #[tokio::test]
    async fn test_long_source_is_chunked_intact() {
        let mut repl = connected(true).await;
        let source = "a".repeat(100);
        let out = assert_ok!(repl.execute(&source).await);
        assert_eq!(out, Bytes::from("100\r\n"));
    }

    #[tokio::test]
    async fn test_remote_exception() {
        let mut repl = connected(true).await;
        let err = assert_err!(repl.execute("raise ValueError('nope')").await);
        assert!(err.is_remote_error());
        assert!(err.to_string().contains("ValueError: nope"));
        assert!(err.reply().is_some_and(|r| r.starts_with(b"Traceback")));

        // The session stays usable after an exception
        let out = assert_ok!(repl.execute("ok").await);
        assert_eq!(out, Bytes::from("2\r\n"));
    }

    #[tokio::test]
    async fn test_close_leaves_raw_mode() {
        let mut repl = connected(true).await;
        assert_ok!(repl.close().await);
        assert_ok!(repl.close().await);
        let err = assert_err!(repl.execute("x").await);
        assert!(matches!(err, HubError::Disconnected));
    }

    #[tokio::test]
    async fn test_silent_hub_times_out() {
        let (client, _firmware) = duplex(64);
        let timeouts = TimeoutConfig {
            enter_raw_repl_timeout_ms: 50,
            ..quick_timeouts()
        };
        let err = assert_err!(RawRepl::enter(client, true, timeouts).await);
        assert!(matches!(err, HubError::Timeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_hub_hangs_up() {
        let (client, firmware) = duplex(64);
        drop(firmware);
        let err = assert_err!(RawRepl::enter(client, true, quick_timeouts()).await);
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_select_hub_first_match_wins() {
        let devices = vec![
            DeviceInfo::new("/dev/ttyS0".to_string()),
            DeviceInfo::usb("/dev/ttyACM0".to_string(), 0x2341, 0x0043),
            DeviceInfo::usb("/dev/ttyACM1".to_string(), 0x0694, 0x0010),
            DeviceInfo::usb("/dev/ttyACM2".to_string(), 0x0694, 0x0010),
        ];
        let hub = assert_ok!(select_hub(&devices));
        assert_eq!(hub.path, "/dev/ttyACM1");

        let single = &devices[..3];
        assert_eq!(assert_ok!(select_hub(single)).path, "/dev/ttyACM1");
    }

    #[test]
    fn test_select_hub_none() {
        let devices = vec![DeviceInfo::usb("/dev/ttyACM0".to_string(), 0x0694, 0x0009)];
        let err = assert_err!(select_hub(&devices));
        assert!(matches!(err, HubError::DeviceNotFound));
        assert!(matches!(select_hub(&[]), Err(HubError::DeviceNotFound)));
    }
}
