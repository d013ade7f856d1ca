//! Sensor abstraction layer for the fingerprint controller.
//!
//! This crate defines the [`SensorPort`] capability trait that the
//! controller drives, plus two implementations:
//!
//! - [`R30xSensor`], a driver for R30x/AS608 modules speaking their native
//!   packet protocol over a [`SensorLink`] (usually a [`SerialLink`])
//! - [`mock::MockSensor`], a scripted fake with a real template library
//!
//! # Design Philosophy
//!
//! - **Async-first**: all operations use native `async fn` in traits
//!   (Edition 2024 RPITIT).
//! - **Outcomes vs. errors**: what the module reports (no finger, no match,
//!   flash error) is a [`SensorOutcome`]; failing to reach the module is a
//!   [`SensorError`].
//! - **Enum dispatch**: [`devices::AnySensor`] stands in for trait objects.
//!
//! ```no_run
//! use fingerkey_hardware::{SensorOutcome, SensorPort, Result};
//!
//! async fn templates<S: SensorPort>(sensor: &mut S) -> Result<u16> {
//!     match sensor.count_models().await? {
//!         SensorOutcome::Count(n) => Ok(n),
//!         _ => Ok(0),
//!     }
//! }
//! ```

pub mod devices;
pub mod driver;
pub mod error;
pub mod link;
pub mod mock;
pub mod outcome;
pub mod packet;
pub mod traits;

pub use devices::AnySensor;
pub use driver::R30xSensor;
pub use error::{Result, SensorError};
pub use link::{SensorLink, SerialConfig, SerialLink};
pub use outcome::{CharBuffer, SensorOutcome};
pub use traits::SensorPort;
