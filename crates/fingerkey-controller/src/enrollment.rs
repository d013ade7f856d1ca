//! Two-capture enrollment state machine.
//!
//! Enrolling a finger takes two images of it with a lift in between, so the
//! module can build a template from two independent reads.
//!
//! # States
//!
//! ```text
//! AwaitFirstCapture -> ConvertFirst -> AwaitRemoval -> AwaitSecondCapture
//!     -> ConvertSecond -> CreateModel -> StoreModel -> Succeeded
//! ```
//!
//! Any state may move to `Failed(stage)`. Both terminal states are final.
//!
//! # Driving the Machine
//!
//! [`Enrollment`] does no I/O. Each call to [`Enrollment::advance`] takes
//! the outcome of the last sensor action and returns a [`Step`]: the next
//! action with the delay to wait before it, or the finished [`Response`].
//! [`run`] drives it against a [`SensorPort`] with `tokio::time::sleep`.
//!
//! ```
//! use std::time::Duration;
//! use fingerkey_controller::{ControllerConfig, Enrollment, SensorAction, Step};
//! use fingerkey_core::SlotId;
//! use fingerkey_hardware::SensorOutcome;
//!
//! let config = ControllerConfig::default();
//! let mut enrollment = Enrollment::new(SlotId::new(5).unwrap(), &config);
//!
//! assert_eq!(enrollment.start(), Step::perform(SensorAction::Capture, Duration::ZERO));
//!
//! // Nobody is touching the sensor yet: poll again after the interval.
//! let step = enrollment.advance(SensorOutcome::NoFingerPresent);
//! assert_eq!(step, Step::perform(SensorAction::Capture, config.poll_interval));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use fingerkey_core::constants::{
    MSG_CAPTURE_TIMEOUT, MSG_CONVERSION_ERROR, MSG_ENROLLED, MSG_IMAGE_ERROR, MSG_MODEL_ERROR,
    MSG_STORAGE_ERROR,
};
use fingerkey_core::{Error, Result, SlotId};
use fingerkey_hardware::{CharBuffer, SensorOutcome, SensorPort};
use fingerkey_protocol::Response;

use crate::ControllerConfig;
use crate::progress::Progress;

/// Maximum number of transitions kept in history.
///
/// A clean enrollment makes seven; polling does not add transitions.
const MAX_HISTORY_SIZE: usize = 16;

/// Stage at which an enrollment gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollStage {
    Capture,
    Conversion,
    ModelCreation,
    Storage,
    /// A configured poll bound ran out while waiting on the finger.
    Timeout,
}

impl EnrollStage {
    /// Failure message reported to the host.
    pub fn message(self) -> &'static str {
        match self {
            Self::Capture => MSG_IMAGE_ERROR,
            Self::Conversion => MSG_CONVERSION_ERROR,
            Self::ModelCreation => MSG_MODEL_ERROR,
            Self::Storage => MSG_STORAGE_ERROR,
            Self::Timeout => MSG_CAPTURE_TIMEOUT,
        }
    }
}

impl fmt::Display for EnrollStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Capture => "capture",
            Self::Conversion => "conversion",
            Self::ModelCreation => "model creation",
            Self::Storage => "storage",
            Self::Timeout => "timeout",
        };
        write!(f, "{name}")
    }
}

/// States of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollState {
    AwaitFirstCapture,
    ConvertFirst,
    AwaitRemoval,
    AwaitSecondCapture,
    ConvertSecond,
    CreateModel,
    StoreModel,
    Succeeded,
    Failed(EnrollStage),
}

impl fmt::Display for EnrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitFirstCapture => write!(f, "AwaitFirstCapture"),
            Self::ConvertFirst => write!(f, "ConvertFirst"),
            Self::AwaitRemoval => write!(f, "AwaitRemoval"),
            Self::AwaitSecondCapture => write!(f, "AwaitSecondCapture"),
            Self::ConvertSecond => write!(f, "ConvertSecond"),
            Self::CreateModel => write!(f, "CreateModel"),
            Self::StoreModel => write!(f, "StoreModel"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed(stage) => write!(f, "Failed({stage})"),
        }
    }
}

impl EnrollState {
    /// Whether the machine has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// Check if moving to `target` is legal.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerkey_controller::{EnrollStage, EnrollState};
    ///
    /// assert!(EnrollState::ConvertFirst.can_transition_to(&EnrollState::AwaitRemoval));
    /// assert!(!EnrollState::ConvertFirst.can_transition_to(&EnrollState::CreateModel));
    /// assert!(EnrollState::StoreModel.can_transition_to(&EnrollState::Failed(EnrollStage::Storage)));
    /// assert!(!EnrollState::Succeeded.can_transition_to(&EnrollState::Failed(EnrollStage::Storage)));
    /// ```
    pub fn can_transition_to(&self, target: &EnrollState) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, target),
            (_, EnrollState::Failed(_))
                | (EnrollState::AwaitFirstCapture, EnrollState::ConvertFirst)
                | (EnrollState::ConvertFirst, EnrollState::AwaitRemoval)
                | (EnrollState::AwaitRemoval, EnrollState::AwaitSecondCapture)
                | (EnrollState::AwaitSecondCapture, EnrollState::ConvertSecond)
                | (EnrollState::ConvertSecond, EnrollState::CreateModel)
                | (EnrollState::CreateModel, EnrollState::StoreModel)
                | (EnrollState::StoreModel, EnrollState::Succeeded)
        )
    }

    /// Stage blamed when this state fails for a reason outside the sensor's
    /// own outcome, such as a transport error.
    pub fn failure_stage(&self) -> EnrollStage {
        match self {
            Self::ConvertFirst | Self::ConvertSecond => EnrollStage::Conversion,
            Self::CreateModel => EnrollStage::ModelCreation,
            Self::StoreModel => EnrollStage::Storage,
            Self::Failed(stage) => *stage,
            _ => EnrollStage::Capture,
        }
    }
}

/// A sensor call requested by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorAction {
    Capture,
    Convert(CharBuffer),
    CreateModel,
    Store(SlotId),
}

impl SensorAction {
    /// Perform this action on `sensor`.
    pub async fn perform<S: SensorPort>(
        self,
        sensor: &mut S,
    ) -> fingerkey_hardware::Result<SensorOutcome> {
        match self {
            Self::Capture => sensor.capture_image().await,
            Self::Convert(buffer) => sensor.convert_image(buffer).await,
            Self::CreateModel => sensor.create_model().await,
            Self::Store(slot) => sensor.store_model(slot).await,
        }
    }
}

/// What the runner should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Wait `delay`, then perform `action` and feed its outcome back.
    Perform {
        action: SensorAction,
        delay: Duration,
    },
    /// The enrollment is over; send this response.
    Finished(Response),
}

impl Step {
    pub fn perform(action: SensorAction, delay: Duration) -> Self {
        Self::Perform { action, delay }
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollTransition {
    pub from: EnrollState,
    pub to: EnrollState,
}

/// Enrollment of one finger into one slot.
#[derive(Debug, Clone)]
pub struct Enrollment {
    slot: SlotId,
    state: EnrollState,
    poll_interval: Duration,
    removal_settle: Duration,
    poll_limit: Option<u32>,
    polls: u32,
    history: VecDeque<EnrollTransition>,
}

impl Enrollment {
    pub fn new(slot: SlotId, config: &ControllerConfig) -> Self {
        Self {
            slot,
            state: EnrollState::AwaitFirstCapture,
            poll_interval: config.poll_interval,
            removal_settle: config.removal_settle,
            poll_limit: config.capture_poll_limit,
            polls: 0,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn state(&self) -> EnrollState {
        self.state
    }

    /// Transitions so far, oldest first.
    pub fn history(&self) -> &VecDeque<EnrollTransition> {
        &self.history
    }

    /// The first action: capture immediately.
    pub fn start(&self) -> Step {
        Step::perform(SensorAction::Capture, Duration::ZERO)
    }

    /// Feed the outcome of the last requested action.
    ///
    /// Calling this after the machine finished returns the same final
    /// response again.
    pub fn advance(&mut self, outcome: SensorOutcome) -> Step {
        match (self.state, outcome) {
            (EnrollState::AwaitFirstCapture, SensorOutcome::Ok) => {
                self.enter(EnrollState::ConvertFirst);
                Step::perform(SensorAction::Convert(CharBuffer::One), Duration::ZERO)
            }
            (EnrollState::ConvertFirst, SensorOutcome::Ok) => {
                self.enter(EnrollState::AwaitRemoval);
                Step::perform(SensorAction::Capture, self.removal_settle)
            }
            (EnrollState::AwaitRemoval, SensorOutcome::NoFingerPresent) => {
                self.enter(EnrollState::AwaitSecondCapture);
                Step::perform(SensorAction::Capture, self.poll_interval)
            }
            // Anything but an empty window means the finger is still there.
            (EnrollState::AwaitRemoval, _) => self.poll_again(),
            (EnrollState::AwaitSecondCapture, SensorOutcome::Ok) => {
                self.enter(EnrollState::ConvertSecond);
                Step::perform(SensorAction::Convert(CharBuffer::Two), Duration::ZERO)
            }
            (
                EnrollState::AwaitFirstCapture | EnrollState::AwaitSecondCapture,
                SensorOutcome::NoFingerPresent,
            ) => self.poll_again(),
            (EnrollState::ConvertSecond, SensorOutcome::Ok) => {
                self.enter(EnrollState::CreateModel);
                Step::perform(SensorAction::CreateModel, Duration::ZERO)
            }
            (EnrollState::CreateModel, SensorOutcome::Ok) => {
                self.enter(EnrollState::StoreModel);
                Step::perform(SensorAction::Store(self.slot), Duration::ZERO)
            }
            (EnrollState::StoreModel, SensorOutcome::Ok) => {
                self.enter(EnrollState::Succeeded);
                self.finished()
            }
            (state, _) if state.is_terminal() => self.finished(),
            (state, outcome) => {
                debug!("Enrollment {} rejected outcome: {}", state, outcome);
                self.fail(state.failure_stage())
            }
        }
    }

    /// Abort the current stage, e.g. after a transport error.
    pub fn abort(&mut self) -> Step {
        if self.state.is_terminal() {
            return self.finished();
        }
        self.fail(self.state.failure_stage())
    }

    /// The response for a finished enrollment.
    fn finished(&self) -> Step {
        let id = self.slot.as_u16();
        Step::Finished(match self.state {
            EnrollState::Failed(stage) => Response::failure(id, stage.message()),
            _ => Response::success(id, 0, MSG_ENROLLED),
        })
    }

    fn fail(&mut self, stage: EnrollStage) -> Step {
        self.enter(EnrollState::Failed(stage));
        self.finished()
    }

    fn poll_again(&mut self) -> Step {
        self.polls += 1;
        if self.poll_limit.is_some_and(|limit| self.polls >= limit) {
            warn!("Enrollment gave up after {} polls in {}", self.polls, self.state);
            return self.fail(EnrollStage::Timeout);
        }
        Step::perform(SensorAction::Capture, self.poll_interval)
    }

    fn enter(&mut self, next: EnrollState) {
        if let Err(e) = self.transition_to(next) {
            // Only reachable through a bug in `advance`.
            warn!("{e}");
        }
    }

    fn transition_to(&mut self, next: EnrollState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }

        debug!("Enrollment {}: {} -> {}", self.slot, self.state, next);
        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(EnrollTransition {
            from: self.state,
            to: next,
        });
        self.state = next;
        self.polls = 0;
        Ok(())
    }
}

/// Run an enrollment to completion against `sensor`.
///
/// Transport errors abort the current stage; they never escape as `Err`.
pub async fn run<S, W>(
    sensor: &mut S,
    slot: SlotId,
    config: &ControllerConfig,
    progress: &mut Progress<'_, W>,
) -> Response
where
    S: SensorPort,
    W: AsyncWrite + Unpin,
{
    let mut enrollment = Enrollment::new(slot, config);
    let mut step = enrollment.start();
    info!("Enrolling slot {}", slot);
    progress.say(format!("Enrolling ID #{slot}")).await;
    progress.say("Place your finger on the sensor...").await;

    loop {
        let (action, delay) = match step {
            Step::Finished(response) => return response,
            Step::Perform { action, delay } => (action, delay),
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let before = enrollment.state();
        step = match action.perform(sensor).await {
            Ok(outcome) => enrollment.advance(outcome),
            Err(e) => {
                warn!("Sensor error during enrollment in {}: {}", before, e);
                enrollment.abort()
            }
        };

        let after = enrollment.state();
        if after != before
            && let Some(text) = prompt(after)
        {
            progress.say(text).await;
        }
    }
}

/// Progress text printed on entering a state.
fn prompt(state: EnrollState) -> Option<&'static str> {
    match state {
        EnrollState::ConvertFirst | EnrollState::ConvertSecond => Some("Image taken"),
        EnrollState::AwaitRemoval => Some("Remove finger"),
        EnrollState::AwaitSecondCapture => Some("Place same finger again..."),
        EnrollState::CreateModel => Some("Creating model..."),
        EnrollState::StoreModel => Some("Storing model..."),
        _ => None,
    }
}
