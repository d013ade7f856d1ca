//! Byte transport between the host and the sensor module.
//!
//! [`SensorLink`] exchanges one command packet for one acknowledgement.
//! [`SerialLink`] is the real implementation over a UART; the blocking
//! `serialport` calls run on Tokio's blocking pool so the runtime is never
//! stalled by a slow module.

#![allow(async_fn_in_trait)]

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{Result, SensorError};
use crate::packet::Packet;
use fingerkey_core::constants::{
    DEFAULT_SENSOR_ADDRESS, DEFAULT_SENSOR_BAUD_RATE, DEFAULT_SENSOR_PASSWORD,
};

/// Request/acknowledge transport to a sensor module.
pub trait SensorLink: Send {
    /// Send `request` and wait for the acknowledgement packet.
    async fn transact(&mut self, request: Packet) -> Result<Packet>;
}

/// Serial link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,

    pub baud_rate: u32,

    /// How long to wait for an acknowledgement.
    #[serde(with = "millis")]
    pub timeout: Duration,

    /// Module address, `0xFFFFFFFF` unless reprogrammed.
    pub address: u32,

    /// Handshake password, `0` unless reprogrammed.
    pub password: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_SENSOR_BAUD_RATE,
            timeout: Duration::from_millis(1000),
            address: DEFAULT_SENSOR_ADDRESS,
            password: DEFAULT_SENSOR_PASSWORD,
        }
    }
}

impl SerialConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(mut self, address: u32) -> Self {
        self.address = address;
        self
    }

    pub fn password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Sensor link over a serial port (8N1).
pub struct SerialLink {
    port: SharedPort<Box<dyn serialport::SerialPort>>,
    path: String,
    timeout: Duration,
}

impl SerialLink {
    /// Open the port described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the port does not exist or cannot be configured.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!("Opening sensor link {} at {} baud", config.path, config.baud_rate);
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(50))
            .open()?;

        Ok(Self {
            port: SharedPort::new(port),
            path: config.path.clone(),
            timeout: config.timeout,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SensorLink for SerialLink {
    async fn transact(&mut self, request: Packet) -> Result<Packet> {
        trace!("-> {:?}", request);
        let result = self.port.transact(request, self.timeout).await;
        match &result {
            Ok(reply) => trace!("<- {:?}", reply),
            Err(e) => debug!("Exchange on {} failed: {}", self.path, e),
        }
        result
    }
}

/// Blocking byte port the exchange runs on.
trait PortIo: Read + Write + Send {
    /// Drop unread input left over from an earlier exchange.
    fn clear_input(&mut self) -> std::io::Result<()>;
}

impl PortIo for Box<dyn serialport::SerialPort> {
    fn clear_input(&mut self) -> std::io::Result<()> {
        self.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

/// A port lent to the blocking pool for one exchange at a time.
///
/// The blocking task holds its own handle, so the port outlives a
/// cancelled `transact` and is still usable after an exchange panics.
struct SharedPort<P> {
    inner: Arc<Mutex<P>>,
}

impl<P: PortIo + 'static> SharedPort<P> {
    fn new(port: P) -> Self {
        Self {
            inner: Arc::new(Mutex::new(port)),
        }
    }

    async fn transact(&self, request: Packet, timeout: Duration) -> Result<Packet> {
        let port = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            // Each exchange starts with clear_input, so a poisoned port is reusable.
            let mut port = port.lock().unwrap_or_else(PoisonError::into_inner);
            exchange(&mut *port, &request, timeout)
        })
        .await
        .map_err(|e| SensorError::disconnected(format!("sensor exchange aborted: {e}")))?
    }
}

/// Write one packet and block until an acknowledgement is decoded.
fn exchange<P: PortIo + ?Sized>(port: &mut P, request: &Packet, timeout: Duration) -> Result<Packet> {
    port.clear_input()?;
    port.write_all(&request.encode())?;
    port.flush()?;

    read_packet(port, timeout)
}

/// Read from `reader` until a whole packet is available or `timeout` passes.
///
/// Read timeouts from the underlying port are treated as "no data yet".
pub(crate) fn read_packet<R: Read + ?Sized>(reader: &mut R, timeout: Duration) -> Result<Packet> {
    let deadline = Instant::now() + timeout;
    let mut buf = BytesMut::with_capacity(64);
    let mut chunk = [0u8; 64];

    loop {
        if let Some(packet) = Packet::decode(&mut buf)? {
            return Ok(packet);
        }
        if Instant::now() >= deadline {
            return Err(SensorError::timeout(timeout.as_millis() as u64));
        }

        match reader.read(&mut chunk) {
            Ok(0) => return Err(SensorError::disconnected("sensor link closed")),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}
