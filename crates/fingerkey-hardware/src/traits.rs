//! Sensor capability port.
//!
//! The controller never talks to the sensor module directly. It drives a
//! [`SensorPort`], which is implemented by the real driver
//! ([`R30xSensor`](crate::R30xSensor)) and by the scripted
//! [`MockSensor`](crate::mock::MockSensor) used in tests.
//!
//! All methods use native `async fn` (Edition 2024 RPITIT), so the trait is
//! not object-safe. Use generics or [`AnySensor`](crate::devices::AnySensor)
//! for dispatch.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::outcome::{CharBuffer, SensorOutcome};
use fingerkey_core::SlotId;

/// Primitive operations of an optical fingerprint module.
///
/// Each call returns a [`SensorOutcome`] describing what the module
/// reported. `Err` is reserved for transport failures: the module could not
/// be reached or answered with a malformed packet.
///
/// # Examples
///
/// ```no_run
/// use fingerkey_hardware::{CharBuffer, SensorOutcome, SensorPort, Result};
///
/// async fn identify<S: SensorPort>(sensor: &mut S) -> Result<Option<u16>> {
///     if sensor.capture_image().await? != SensorOutcome::Ok {
///         return Ok(None);
///     }
///     if sensor.convert_image(CharBuffer::One).await? != SensorOutcome::Ok {
///         return Ok(None);
///     }
///     match sensor.search_model().await? {
///         SensorOutcome::SearchMatch { id, .. } => Ok(Some(id)),
///         _ => Ok(None),
///     }
/// }
/// ```
pub trait SensorPort: Send {
    /// Take an image of whatever is on the sensor window.
    async fn capture_image(&mut self) -> Result<SensorOutcome>;

    /// Extract features from the last image into a char buffer.
    async fn convert_image(&mut self, buffer: CharBuffer) -> Result<SensorOutcome>;

    /// Combine both char buffers into a template.
    async fn create_model(&mut self) -> Result<SensorOutcome>;

    /// Persist the current template into a library slot.
    async fn store_model(&mut self, slot: SlotId) -> Result<SensorOutcome>;

    /// Search the library for the features in char buffer one.
    async fn search_model(&mut self) -> Result<SensorOutcome>;

    /// Remove a template from the library.
    async fn delete_model(&mut self, slot: SlotId) -> Result<SensorOutcome>;

    /// Number of templates stored in the library.
    async fn count_models(&mut self) -> Result<SensorOutcome>;
}
