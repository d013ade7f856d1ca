//! Mock device implementations for testing and development.
//!
//! This module provides a simulated sensor module that can be controlled
//! programmatically without requiring physical hardware.

pub mod sensor;

pub use sensor::{Capture, MockSensor, MockSensorHandle, SensorCall, SensorOp};
