//! Enum wrapper for sensor dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn SensorPort>`
//! is unavailable. [`AnySensor`] provides concrete dispatch instead, letting
//! the binary pick the real module or the mock at runtime while the
//! controller stays generic.
//!
//! # Examples
//!
//! ```
//! use fingerkey_hardware::devices::AnySensor;
//! use fingerkey_hardware::mock::MockSensor;
//!
//! let (sensor, _handle) = MockSensor::new();
//! let any_sensor = AnySensor::Mock(sensor);
//! assert_eq!(any_sensor.kind(), "mock");
//! ```

use crate::driver::R30xSensor;
use crate::link::SerialLink;
use crate::mock::MockSensor;
use crate::traits::SensorPort;
use crate::{CharBuffer, Result, SensorOutcome};
use fingerkey_core::SlotId;

/// Any supported sensor.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySensor {
    /// R30x/AS608 module on a serial port.
    Serial(R30xSensor<SerialLink>),

    /// Scripted sensor for development and testing.
    Mock(MockSensor),
}

impl AnySensor {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serial(_) => "serial",
            Self::Mock(_) => "mock",
        }
    }
}

impl SensorPort for AnySensor {
    async fn capture_image(&mut self) -> Result<SensorOutcome> {
        match self {
            Self::Serial(device) => device.capture_image().await,
            Self::Mock(device) => device.capture_image().await,
        }
    }

    async fn convert_image(&mut self, buffer: CharBuffer) -> Result<SensorOutcome> {
        match self {
            Self::Serial(device) => device.convert_image(buffer).await,
            Self::Mock(device) => device.convert_image(buffer).await,
        }
    }

    async fn create_model(&mut self) -> Result<SensorOutcome> {
        match self {
            Self::Serial(device) => device.create_model().await,
            Self::Mock(device) => device.create_model().await,
        }
    }

    async fn store_model(&mut self, slot: SlotId) -> Result<SensorOutcome> {
        match self {
            Self::Serial(device) => device.store_model(slot).await,
            Self::Mock(device) => device.store_model(slot).await,
        }
    }

    async fn search_model(&mut self) -> Result<SensorOutcome> {
        match self {
            Self::Serial(device) => device.search_model().await,
            Self::Mock(device) => device.search_model().await,
        }
    }

    async fn delete_model(&mut self, slot: SlotId) -> Result<SensorOutcome> {
        match self {
            Self::Serial(device) => device.delete_model(slot).await,
            Self::Mock(device) => device.delete_model(slot).await,
        }
    }

    async fn count_models(&mut self) -> Result<SensorOutcome> {
        match self {
            Self::Serial(device) => device.count_models().await,
            Self::Mock(device) => device.count_models().await,
        }
    }
}
