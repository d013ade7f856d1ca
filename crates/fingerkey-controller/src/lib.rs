//! Device-side logic of the fingerprint controller.
//!
//! The [`Dispatcher`] reads commands with a [`CommandReader`], runs the
//! matching handler against a [`SensorPort`](fingerkey_hardware::SensorPort)
//! and writes one terminal response followed by a Ready. Enrollment is the
//! only multi-step command; it is modelled by [`Enrollment`], a state
//! machine that does no I/O of its own.

pub mod config;
pub mod dispatcher;
pub mod enrollment;
pub mod handlers;
pub mod progress;
pub mod reader;

pub use config::ControllerConfig;
pub use dispatcher::Dispatcher;
pub use enrollment::{EnrollStage, EnrollState, EnrollTransition, Enrollment, SensorAction, Step};
pub use progress::Progress;
pub use reader::CommandReader;
