//! Driver for R30x/AS608 optical fingerprint modules.

use tracing::{debug, warn};

use crate::error::{Result, SensorError};
use crate::link::{SensorLink, SerialConfig, SerialLink};
use crate::outcome::{CharBuffer, SensorOutcome};
use crate::packet::*;
use crate::traits::SensorPort;
use fingerkey_core::SlotId;
use fingerkey_core::constants::{DEFAULT_SENSOR_ADDRESS, MAX_SLOT_ID};

/// Library pages searched on verify. Covers every addressable slot.
const SEARCH_PAGE_COUNT: u16 = MAX_SLOT_ID + 1;

/// A fingerprint module reached over a [`SensorLink`].
///
/// # Examples
///
/// ```no_run
/// use fingerkey_hardware::{R30xSensor, SerialConfig, SensorPort};
///
/// # async fn example() -> fingerkey_hardware::Result<()> {
/// let mut sensor = R30xSensor::connect(&SerialConfig::new("/dev/ttyUSB0")).await?;
/// let count = sensor.count_models().await?;
/// println!("{count}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct R30xSensor<L> {
    link: L,
    address: u32,
}

impl R30xSensor<SerialLink> {
    /// Open the serial port and perform the password handshake.
    ///
    /// # Errors
    ///
    /// Returns `SensorError::NotDetected` if the module does not accept the
    /// password, or a transport error if it does not answer at all.
    pub async fn connect(config: &SerialConfig) -> Result<Self> {
        let link = SerialLink::open(config)?;
        let mut sensor = Self::with_address(link, config.address);
        sensor.verify_password(config.password).await?;
        Ok(sensor)
    }
}

impl<L: SensorLink> R30xSensor<L> {
    pub fn new(link: L) -> Self {
        Self::with_address(link, DEFAULT_SENSOR_ADDRESS)
    }

    pub fn with_address(link: L, address: u32) -> Self {
        Self { link, address }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Handshake with the module.
    ///
    /// # Errors
    ///
    /// Any transport failure is reported as `SensorError::NotDetected`.
    pub async fn verify_password(&mut self, password: u32) -> Result<()> {
        let reply = self
            .send(INS_VERIFY_PASSWORD, &password.to_be_bytes())
            .await
            .map_err(|e| SensorError::not_detected(e.to_string()))?;

        match confirmation(&reply)? {
            CODE_OK => {
                debug!("Sensor password accepted");
                Ok(())
            }
            CODE_WRONG_PASSWORD => Err(SensorError::not_detected("password rejected")),
            code => Err(SensorError::not_detected(format!(
                "unexpected confirmation code {code:#04x}"
            ))),
        }
    }

    async fn send(&mut self, instruction: u8, params: &[u8]) -> Result<Packet> {
        let request = Packet::command(self.address, instruction, params);
        let reply = self.link.transact(request).await?;
        if reply.kind != PacketKind::Ack {
            return Err(SensorError::invalid_packet(format!(
                "Expected ack, got {:?}",
                reply.kind
            )));
        }
        Ok(reply)
    }

    /// Send an instruction and map its confirmation code.
    async fn simple(
        &mut self,
        instruction: u8,
        params: &[u8],
        ok: SensorOutcome,
        map: fn(u8) -> SensorOutcome,
    ) -> Result<SensorOutcome> {
        let reply = self.send(instruction, params).await?;
        let code = confirmation(&reply)?;
        let outcome = if code == CODE_OK { ok } else { map(code) };
        debug!("Sensor call {instruction:#04x} -> {code:#04x}: {outcome}");
        Ok(outcome)
    }
}

fn confirmation(reply: &Packet) -> Result<u8> {
    reply
        .code()
        .ok_or_else(|| SensorError::invalid_packet("Empty acknowledgement"))
}

fn capture_outcome(code: u8) -> SensorOutcome {
    match code {
        CODE_NO_FINGER => SensorOutcome::NoFingerPresent,
        CODE_PACKET_RECEIVE_ERR | CODE_IMAGE_FAIL => SensorOutcome::ImageError,
        other => {
            warn!("Unknown capture confirmation code {other:#04x}");
            SensorOutcome::ImageError
        }
    }
}

fn convert_outcome(code: u8) -> SensorOutcome {
    if !matches!(code, CODE_IMAGE_MESS | CODE_FEATURE_FAIL | CODE_PACKET_RECEIVE_ERR) {
        warn!("Unknown conversion confirmation code {code:#04x}");
    }
    SensorOutcome::ConversionError
}

fn model_outcome(code: u8) -> SensorOutcome {
    if !matches!(code, CODE_ENROLL_MISMATCH | CODE_PACKET_RECEIVE_ERR) {
        warn!("Unknown model confirmation code {code:#04x}");
    }
    SensorOutcome::ModelCreationError
}

fn store_outcome(code: u8) -> SensorOutcome {
    if !matches!(code, CODE_BAD_LOCATION | CODE_FLASH_ERR | CODE_PACKET_RECEIVE_ERR) {
        warn!("Unknown store confirmation code {code:#04x}");
    }
    SensorOutcome::StorageError
}

fn delete_outcome(code: u8) -> SensorOutcome {
    if !matches!(code, CODE_DELETE_FAIL | CODE_BAD_LOCATION | CODE_PACKET_RECEIVE_ERR) {
        warn!("Unknown delete confirmation code {code:#04x}");
    }
    SensorOutcome::DeletionError
}

impl<L: SensorLink> SensorPort for R30xSensor<L> {
    async fn capture_image(&mut self) -> Result<SensorOutcome> {
        self.simple(INS_GET_IMAGE, &[], SensorOutcome::Ok, capture_outcome)
            .await
    }

    async fn convert_image(&mut self, buffer: CharBuffer) -> Result<SensorOutcome> {
        self.simple(
            INS_IMAGE_TO_TZ,
            &[buffer.as_u8()],
            SensorOutcome::Ok,
            convert_outcome,
        )
        .await
    }

    async fn create_model(&mut self) -> Result<SensorOutcome> {
        self.simple(INS_REG_MODEL, &[], SensorOutcome::Ok, model_outcome)
            .await
    }

    async fn store_model(&mut self, slot: SlotId) -> Result<SensorOutcome> {
        let [hi, lo] = slot.as_u16().to_be_bytes();
        self.simple(
            INS_STORE,
            &[CharBuffer::One.as_u8(), hi, lo],
            SensorOutcome::Ok,
            store_outcome,
        )
        .await
    }

    async fn search_model(&mut self) -> Result<SensorOutcome> {
        let [count_hi, count_lo] = SEARCH_PAGE_COUNT.to_be_bytes();
        let reply = self
            .send(
                INS_SEARCH,
                &[CharBuffer::One.as_u8(), 0x00, 0x00, count_hi, count_lo],
            )
            .await?;

        let outcome = match confirmation(&reply)? {
            CODE_OK => SensorOutcome::SearchMatch {
                id: reply.data_u16(0)?,
                confidence: reply.data_u16(2)?,
            },
            CODE_NOT_FOUND => SensorOutcome::SearchMiss,
            other => {
                debug!("Search failed with confirmation code {other:#04x}");
                SensorOutcome::SearchMiss
            }
        };
        debug!("Sensor search: {outcome}");
        Ok(outcome)
    }

    async fn delete_model(&mut self, slot: SlotId) -> Result<SensorOutcome> {
        let [hi, lo] = slot.as_u16().to_be_bytes();
        self.simple(
            INS_DELETE,
            &[hi, lo, 0x00, 0x01],
            SensorOutcome::DeletionOk,
            delete_outcome,
        )
        .await
    }

    async fn count_models(&mut self) -> Result<SensorOutcome> {
        let reply = self.send(INS_TEMPLATE_COUNT, &[]).await?;
        match confirmation(&reply)? {
            CODE_OK => Ok(SensorOutcome::Count(reply.data_u16(0)?)),
            other => Err(SensorError::invalid_packet(format!(
                "Template count failed with confirmation code {other:#04x}"
            ))),
        }
    }
}
