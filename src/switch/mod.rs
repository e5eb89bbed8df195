//! RF switch matrix driver (C1, spec §4.1).
//!
//! The switch firmware speaks a line-oriented JSON protocol over a serial
//! port: the host writes a `{"set":"port","to":<name>}` line, the firmware
//! replies with `{"report":"port","is":<name>}` once the relays have
//! settled. [`SerialSwitchDriver`] implements the six-step contract from
//! §4.1 (drain, send, receive, validate, commit) on top of any
//! `AsyncRead + AsyncWrite` transport, following the same type-erased
//! abstraction the teacher uses for its instrument serial ports
//! (`daq_core::serial::{SerialPortIO, DynSerial, SharedPort}`).

pub mod protocol;

use crate::error::SwitchError;
use async_trait::async_trait;
use protocol::{SetPortReply, SetPortRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Blanket-implemented for any transport usable as the switch's serial link.
pub trait SwitchPortIO: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SwitchPortIO for T {}

/// Type-erased switch serial transport.
pub type DynSwitchPort = Box<dyn SwitchPortIO>;

/// Arbitrates access to the switch: set a named port, observe the last
/// commanded port.
#[async_trait]
pub trait SwitchDriver: Send + Sync {
    async fn set_port(&self, name: &str) -> Result<(), SwitchError>;
    fn last_port(&self) -> Option<String>;
}

/// Timeouts governing the drain phases around a switch command (spec §9:
/// kept configurable rather than hardcoded).
#[derive(Debug, Clone, Copy)]
pub struct SwitchTimeouts {
    pub drain_timeout: Duration,
    pub reply_drain_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for SwitchTimeouts {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_millis(10),
            reply_drain_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(500),
        }
    }
}

/// Serial-backed switch driver. Holds the port behind a `tokio::sync::Mutex`
/// so at most one `set_port` call is in flight at a time (§4.1's mutual
/// exclusion contract); the last confirmed port is cached in an
/// `std::sync::Mutex<Option<String>>` so `last_port` never blocks on serial
/// I/O.
///
/// The whole exchange is read unbuffered, straight off the port (§9): a
/// `BufReader` would retain any bytes the firmware packs in after the reply
/// line inside its own internal buffer, invisible to a raw drain call on the
/// underlying port, and bleed them into the next command's read. Reading
/// everything through one accumulate-until-quiet loop avoids that split
/// entirely — nothing is left behind for the next call to trip over.
pub struct SerialSwitchDriver {
    port: Arc<Mutex<DynSwitchPort>>,
    timeouts: SwitchTimeouts,
    last_port: std::sync::Mutex<Option<String>>,
}

impl SerialSwitchDriver {
    pub fn new(port: DynSwitchPort, timeouts: SwitchTimeouts) -> Self {
        Self {
            port: Arc::new(Mutex::new(port)),
            timeouts,
            last_port: std::sync::Mutex::new(None),
        }
    }

    /// Open the real hardware serial port. Runs the blocking open call via
    /// `spawn_blocking`, mirroring the teacher's `open_serial_async`.
    #[cfg(feature = "switch_serial")]
    pub async fn open(
        path: &str,
        baud: u32,
        timeouts: SwitchTimeouts,
    ) -> Result<Self, SwitchError> {
        use tokio::task::spawn_blocking;
        use tokio_serial::SerialPortBuilderExt;

        let path_owned = path.to_string();
        let stream = spawn_blocking(move || {
            tokio_serial::new(&path_owned, baud)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()
        })
        .await
        .map_err(|e| SwitchError::Io(std::io::Error::other(e)))?
        .map_err(SwitchError::Io)?;

        Ok(Self::new(Box::new(stream), timeouts))
    }
}

#[async_trait]
impl SwitchDriver for SerialSwitchDriver {
    async fn set_port(&self, name: &str) -> Result<(), SwitchError> {
        let mut guard = self.port.lock().await;

        // Step 1: drain stale bytes before sending.
        drain_serial_buffer(&mut *guard, self.timeouts.drain_timeout).await;

        // Step 2: send.
        let request = SetPortRequest::new(name);
        let mut line = serde_json::to_string(&request)
            .map_err(|e| SwitchError::UnmarshalFailed {
                raw: String::new(),
                reason: e.to_string(),
            })?;
        line.push('\n');
        let written = guard.write(line.as_bytes()).await.map_err(SwitchError::Io)?;
        if written != line.len() {
            return Err(SwitchError::ShortWrite {
                written,
                expected: line.len(),
            });
        }
        guard.flush().await.map_err(SwitchError::Io)?;

        // Steps 3-4: receive, accumulating raw bytes off the port until it
        // goes quiet, in one pass. Whatever the firmware packs in after the
        // reply line is part of this same accumulation and gets discarded
        // with it rather than lingering for the next call.
        let raw = read_until_quiet(&mut *guard, self.timeouts.read_timeout, self.timeouts.reply_drain_timeout)
            .await?;
        drop(guard);

        let raw_text = String::from_utf8_lossy(&raw);
        let reply_line = raw_text.lines().next().unwrap_or("").trim();

        // Step 5: validate. Case-insensitive per spec: firmware may reply
        // with different casing than what was sent.
        let reply: SetPortReply = serde_json::from_str(reply_line).map_err(|e| {
            SwitchError::UnmarshalFailed {
                raw: reply_line.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !reply.report.eq_ignore_ascii_case("port") {
            return Err(SwitchError::ReportTypeMismatch { got: reply.report });
        }
        if !reply.is.eq_ignore_ascii_case(name) {
            return Err(SwitchError::PortMismatch {
                expected: name.to_string(),
                got: reply.is,
            });
        }

        // Step 6: commit.
        *self.last_port.lock().expect("last_port mutex poisoned") = Some(name.to_string());
        Ok(())
    }

    fn last_port(&self) -> Option<String> {
        self.last_port.lock().expect("last_port mutex poisoned").clone()
    }
}

/// Read and discard bytes until the transport goes quiet or `timeout`
/// elapses. Mirrors the teacher's `daq_core::serial::drain_serial_buffer`.
async fn drain_serial_buffer<R: AsyncRead + Unpin>(port: &mut R, timeout: Duration) -> usize {
    let mut discard = [0u8; 256];
    let deadline = tokio::time::Instant::now() + timeout;
    let mut total = 0usize;

    loop {
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, port.read(&mut discard)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => total += n,
            Ok(Err(_)) => break,
            Err(_) => break,
        }
    }

    total
}

/// Read the reply off the port unbuffered, accumulating into a growable
/// buffer until `initial_timeout` elapses with nothing received, or the
/// port goes quiet for `quiet_timeout` after bytes start arriving (spec §9:
/// "read until zero, accumulating into a growable buffer, parse the full
/// accumulation"). Returns everything read, reply line and any trailing
/// noise alike; the caller picks the reply line back out of it.
async fn read_until_quiet<R: AsyncRead + Unpin>(
    port: &mut R,
    initial_timeout: Duration,
    quiet_timeout: Duration,
) -> Result<Vec<u8>, SwitchError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];

    let n = tokio::time::timeout(initial_timeout, port.read(&mut chunk))
        .await
        .map_err(|_| SwitchError::ReadTimeout)?
        .map_err(SwitchError::Io)?;
    if n == 0 {
        return Err(SwitchError::ReadTimeout);
    }
    buf.extend_from_slice(&chunk[..n]);

    loop {
        match tokio::time::timeout(quiet_timeout, port.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => return Err(SwitchError::Io(e)),
            Err(_) => break,
        }
    }

    Ok(buf)
}

/// In-process stand-in for tests that don't want real serial latency.
pub struct MockSwitchDriver {
    last_port: std::sync::Mutex<Option<String>>,
    fail_with: Option<SwitchErrorKind>,
}

/// A cloneable description of a [`SwitchError`] to inject, since
/// `SwitchError` itself isn't `Clone` (it wraps `std::io::Error`).
#[derive(Debug, Clone, Copy)]
pub enum SwitchErrorKind {
    ReadTimeout,
    PortMismatch,
}

impl MockSwitchDriver {
    pub fn new() -> Self {
        Self {
            last_port: std::sync::Mutex::new(None),
            fail_with: None,
        }
    }

    pub fn failing(kind: SwitchErrorKind) -> Self {
        Self {
            last_port: std::sync::Mutex::new(None),
            fail_with: Some(kind),
        }
    }
}

impl Default for MockSwitchDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwitchDriver for MockSwitchDriver {
    async fn set_port(&self, name: &str) -> Result<(), SwitchError> {
        match self.fail_with {
            Some(SwitchErrorKind::ReadTimeout) => return Err(SwitchError::ReadTimeout),
            Some(SwitchErrorKind::PortMismatch) => {
                return Err(SwitchError::PortMismatch {
                    expected: name.to_string(),
                    got: "unexpected".to_string(),
                })
            }
            None => {}
        }
        *self.last_port.lock().expect("last_port mutex poisoned") = Some(name.to_string());
        Ok(())
    }

    fn last_port(&self) -> Option<String> {
        self.last_port.lock().expect("last_port mutex poisoned").clone()
    }
}
