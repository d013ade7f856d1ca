//! Scripted fingerprint sensor for testing and development.
//!
//! The mock keeps the same state a real module does (last image, two char
//! buffers, a template library) so enroll/verify/delete sequences behave
//! end to end. What the sensor "sees" is driven by a script of captures
//! pushed through the [`MockSensorHandle`]. Once the script runs dry every
//! capture reports [`SensorOutcome::NoFingerPresent`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{Result, SensorError};
use crate::outcome::{CharBuffer, SensorOutcome};
use crate::traits::SensorPort;
use fingerkey_core::SlotId;

/// Confidence reported for a matching search unless overridden.
pub const DEFAULT_MATCH_CONFIDENCE: u16 = 87;

/// One scripted capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// A finger is on the window; the bytes stand in for its features.
    Finger(Vec<u8>),
    /// Nothing on the window.
    NoFinger,
    /// The module failed to take an image.
    Fail,
}

/// Port operation, without arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorOp {
    CaptureImage,
    ConvertImage,
    CreateModel,
    StoreModel,
    SearchModel,
    DeleteModel,
    CountModels,
}

/// A recorded port call with its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCall {
    CaptureImage,
    ConvertImage(CharBuffer),
    CreateModel,
    StoreModel(SlotId),
    SearchModel,
    DeleteModel(SlotId),
    CountModels,
}

impl SensorCall {
    pub fn op(&self) -> SensorOp {
        match self {
            Self::CaptureImage => SensorOp::CaptureImage,
            Self::ConvertImage(_) => SensorOp::ConvertImage,
            Self::CreateModel => SensorOp::CreateModel,
            Self::StoreModel(_) => SensorOp::StoreModel,
            Self::SearchModel => SensorOp::SearchModel,
            Self::DeleteModel(_) => SensorOp::DeleteModel,
            Self::CountModels => SensorOp::CountModels,
        }
    }
}

/// Forced result for the next call of an operation.
#[derive(Debug)]
enum Injected {
    Outcome(SensorOutcome),
    Transport,
}

#[derive(Debug, Default)]
struct MockState {
    captures: VecDeque<Capture>,
    image: Option<Vec<u8>>,
    buffers: [Option<Vec<u8>>; 2],
    model: Option<Vec<u8>>,
    library: BTreeMap<u16, Vec<u8>>,
    calls: Vec<SensorCall>,
    injected: HashMap<SensorOp, VecDeque<Injected>>,
    confidence: u16,
}

impl MockState {
    fn buffer(&self, buffer: CharBuffer) -> &Option<Vec<u8>> {
        &self.buffers[usize::from(buffer.as_u8() - 1)]
    }

    fn buffer_mut(&mut self, buffer: CharBuffer) -> &mut Option<Vec<u8>> {
        &mut self.buffers[usize::from(buffer.as_u8() - 1)]
    }

    /// Record a call and return an injected result if one is queued.
    fn record(&mut self, call: SensorCall) -> Option<Result<SensorOutcome>> {
        trace!("Mock sensor call {:?}", call);
        self.calls.push(call);
        let injected = self.injected.get_mut(&call.op())?.pop_front()?;
        Some(match injected {
            Injected::Outcome(outcome) => Ok(outcome),
            Injected::Transport => Err(SensorError::disconnected("mock sensor")),
        })
    }
}

/// Mock fingerprint sensor.
///
/// # Examples
///
/// ```
/// use fingerkey_hardware::mock::MockSensor;
/// use fingerkey_hardware::{CharBuffer, SensorOutcome, SensorPort};
///
/// #[tokio::main]
/// async fn main() -> fingerkey_hardware::Result<()> {
///     let (mut sensor, handle) = MockSensor::new();
///
///     handle.present_finger(vec![1, 2, 3]).await;
///     assert_eq!(sensor.capture_image().await?, SensorOutcome::Ok);
///     assert_eq!(sensor.capture_image().await?, SensorOutcome::NoFingerPresent);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSensor {
    state: Arc<Mutex<MockState>>,
}

impl MockSensor {
    /// Create an empty sensor and the handle that scripts it.
    pub fn new() -> (Self, MockSensorHandle) {
        let state = Arc::new(Mutex::new(MockState {
            confidence: DEFAULT_MATCH_CONFIDENCE,
            ..Default::default()
        }));

        let sensor = Self {
            state: Arc::clone(&state),
        };
        (sensor, MockSensorHandle { state })
    }
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new().0
    }
}

impl SensorPort for MockSensor {
    async fn capture_image(&mut self) -> Result<SensorOutcome> {
        let mut state = self.state.lock().await;
        if let Some(result) = state.record(SensorCall::CaptureImage) {
            return result;
        }

        match state.captures.pop_front().unwrap_or(Capture::NoFinger) {
            Capture::Finger(features) => {
                state.image = Some(features);
                Ok(SensorOutcome::Ok)
            }
            Capture::NoFinger => Ok(SensorOutcome::NoFingerPresent),
            Capture::Fail => Ok(SensorOutcome::ImageError),
        }
    }

    async fn convert_image(&mut self, buffer: CharBuffer) -> Result<SensorOutcome> {
        let mut state = self.state.lock().await;
        if let Some(result) = state.record(SensorCall::ConvertImage(buffer)) {
            return result;
        }

        match state.image.clone() {
            Some(image) => {
                *state.buffer_mut(buffer) = Some(image);
                Ok(SensorOutcome::Ok)
            }
            None => Ok(SensorOutcome::ConversionError),
        }
    }

    async fn create_model(&mut self) -> Result<SensorOutcome> {
        let mut state = self.state.lock().await;
        if let Some(result) = state.record(SensorCall::CreateModel) {
            return result;
        }

        let model = match (state.buffer(CharBuffer::One), state.buffer(CharBuffer::Two)) {
            (Some(first), Some(second)) if first == second => Some(first.clone()),
            _ => None,
        };

        match model {
            Some(model) => {
                state.model = Some(model);
                Ok(SensorOutcome::Ok)
            }
            None => Ok(SensorOutcome::ModelCreationError),
        }
    }

    async fn store_model(&mut self, slot: SlotId) -> Result<SensorOutcome> {
        let mut state = self.state.lock().await;
        if let Some(result) = state.record(SensorCall::StoreModel(slot)) {
            return result;
        }

        match state.model.clone() {
            Some(model) => {
                state.library.insert(slot.as_u16(), model);
                Ok(SensorOutcome::Ok)
            }
            None => Ok(SensorOutcome::StorageError),
        }
    }

    async fn search_model(&mut self) -> Result<SensorOutcome> {
        let mut state = self.state.lock().await;
        if let Some(result) = state.record(SensorCall::SearchModel) {
            return result;
        }

        let Some(features) = state.buffer(CharBuffer::One) else {
            return Ok(SensorOutcome::SearchMiss);
        };
        let found = state
            .library
            .iter()
            .find(|(_, template)| *template == features)
            .map(|(id, _)| *id);

        Ok(match found {
            Some(id) => SensorOutcome::SearchMatch {
                id,
                confidence: state.confidence,
            },
            None => SensorOutcome::SearchMiss,
        })
    }

    async fn delete_model(&mut self, slot: SlotId) -> Result<SensorOutcome> {
        let mut state = self.state.lock().await;
        if let Some(result) = state.record(SensorCall::DeleteModel(slot)) {
            return result;
        }

        // Modules accept deleting an empty page.
        state.library.remove(&slot.as_u16());
        Ok(SensorOutcome::DeletionOk)
    }

    async fn count_models(&mut self) -> Result<SensorOutcome> {
        let mut state = self.state.lock().await;
        if let Some(result) = state.record(SensorCall::CountModels) {
            return result;
        }

        let count = u16::try_from(state.library.len()).unwrap_or(u16::MAX);
        Ok(SensorOutcome::Count(count))
    }
}

/// Handle for scripting and inspecting a [`MockSensor`].
///
/// Cloneable; every clone controls the same sensor.
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockSensorHandle {
    /// Queue a single capture.
    pub async fn push_capture(&self, capture: Capture) {
        self.state.lock().await.captures.push_back(capture);
    }

    /// Queue a capture that sees `features`.
    pub async fn present_finger(&self, features: Vec<u8>) {
        self.push_capture(Capture::Finger(features)).await;
    }

    /// Queue `count` empty captures.
    pub async fn no_finger(&self, count: usize) {
        let mut state = self.state.lock().await;
        state
            .captures
            .extend(std::iter::repeat_n(Capture::NoFinger, count));
    }

    /// Queue the captures of a clean enrollment: finger, lift, same finger.
    pub async fn script_enrollment(&self, features: Vec<u8>) {
        let mut state = self.state.lock().await;
        state.captures.push_back(Capture::Finger(features.clone()));
        state.captures.push_back(Capture::NoFinger);
        state.captures.push_back(Capture::Finger(features));
    }

    /// Force the next call of `op` to report `outcome`.
    pub async fn inject_outcome(&self, op: SensorOp, outcome: SensorOutcome) {
        self.inject(op, Injected::Outcome(outcome)).await;
    }

    /// Force the next call of `op` to fail at the transport level.
    pub async fn inject_transport_error(&self, op: SensorOp) {
        self.inject(op, Injected::Transport).await;
    }

    async fn inject(&self, op: SensorOp, injected: Injected) {
        self.state
            .lock()
            .await
            .injected
            .entry(op)
            .or_default()
            .push_back(injected);
    }

    /// Confidence reported by matching searches.
    pub async fn set_match_confidence(&self, confidence: u16) {
        self.state.lock().await.confidence = confidence;
    }

    /// Put a template straight into the library.
    pub async fn store_template(&self, slot: SlotId, features: Vec<u8>) {
        self.state
            .lock()
            .await
            .library
            .insert(slot.as_u16(), features);
    }

    /// Whether a slot holds a template.
    pub async fn has_template(&self, slot: SlotId) -> bool {
        self.state.lock().await.library.contains_key(&slot.as_u16())
    }

    pub async fn template_count(&self) -> usize {
        self.state.lock().await.library.len()
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<SensorCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls of `op` made so far.
    pub async fn call_count(&self, op: SensorOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// Captures still waiting in the script.
    pub async fn pending_captures(&self) -> usize {
        self.state.lock().await.captures.len()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: u16) -> SlotId {
        SlotId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_empty_script_reports_no_finger() {
        let (mut sensor, handle) = MockSensor::new();
        for _ in 0..3 {
            assert_eq!(
                sensor.capture_image().await.unwrap(),
                SensorOutcome::NoFingerPresent
            );
        }
        assert_eq!(handle.call_count(SensorOp::CaptureImage).await, 3);
    }

    #[tokio::test]
    async fn test_full_enrollment_then_search() {
        let (mut sensor, handle) = MockSensor::new();
        handle.script_enrollment(vec![7; 8]).await;

        assert_eq!(sensor.capture_image().await.unwrap(), SensorOutcome::Ok);
        assert_eq!(sensor.convert_image(CharBuffer::One).await.unwrap(), SensorOutcome::Ok);
        assert_eq!(
            sensor.capture_image().await.unwrap(),
            SensorOutcome::NoFingerPresent
        );
        assert_eq!(sensor.capture_image().await.unwrap(), SensorOutcome::Ok);
        assert_eq!(sensor.convert_image(CharBuffer::Two).await.unwrap(), SensorOutcome::Ok);
        assert_eq!(sensor.create_model().await.unwrap(), SensorOutcome::Ok);
        assert_eq!(sensor.store_model(slot(5)).await.unwrap(), SensorOutcome::Ok);
        assert!(handle.has_template(slot(5)).await);

        handle.present_finger(vec![7; 8]).await;
        sensor.capture_image().await.unwrap();
        sensor.convert_image(CharBuffer::One).await.unwrap();
        assert_eq!(
            sensor.search_model().await.unwrap(),
            SensorOutcome::SearchMatch {
                id: 5,
                confidence: DEFAULT_MATCH_CONFIDENCE
            }
        );
    }

    #[tokio::test]
    async fn test_mismatched_buffers_fail_model() {
        let (mut sensor, handle) = MockSensor::new();
        handle.present_finger(vec![1]).await;
        handle.present_finger(vec![2]).await;

        sensor.capture_image().await.unwrap();
        sensor.convert_image(CharBuffer::One).await.unwrap();
        sensor.capture_image().await.unwrap();
        sensor.convert_image(CharBuffer::Two).await.unwrap();
        assert_eq!(
            sensor.create_model().await.unwrap(),
            SensorOutcome::ModelCreationError
        );
    }

    #[tokio::test]
    async fn test_convert_without_image() {
        let (mut sensor, _handle) = MockSensor::new();
        assert_eq!(
            sensor.convert_image(CharBuffer::One).await.unwrap(),
            SensorOutcome::ConversionError
        );
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let (mut sensor, handle) = MockSensor::new();
        handle.store_template(slot(1), vec![1]).await;
        handle.store_template(slot(2), vec![2]).await;
        handle.store_template(slot(3), vec![3]).await;

        assert_eq!(sensor.count_models().await.unwrap(), SensorOutcome::Count(3));
        assert_eq!(sensor.delete_model(slot(2)).await.unwrap(), SensorOutcome::DeletionOk);
        assert_eq!(sensor.delete_model(slot(50)).await.unwrap(), SensorOutcome::DeletionOk);
        assert_eq!(sensor.count_models().await.unwrap(), SensorOutcome::Count(2));
    }

    #[tokio::test]
    async fn test_injected_outcomes_apply_once() {
        let (mut sensor, handle) = MockSensor::new();
        handle
            .inject_outcome(SensorOp::DeleteModel, SensorOutcome::DeletionError)
            .await;
        handle.inject_transport_error(SensorOp::CountModels).await;

        assert_eq!(
            sensor.delete_model(slot(4)).await.unwrap(),
            SensorOutcome::DeletionError
        );
        assert_eq!(sensor.delete_model(slot(4)).await.unwrap(), SensorOutcome::DeletionOk);
        assert!(sensor.count_models().await.is_err());
        assert_eq!(sensor.count_models().await.unwrap(), SensorOutcome::Count(0));
    }

    #[tokio::test]
    async fn test_call_log_records_arguments() {
        let (mut sensor, handle) = MockSensor::new();
        sensor.store_model(slot(9)).await.unwrap();
        sensor.convert_image(CharBuffer::Two).await.unwrap();

        assert_eq!(
            handle.calls().await,
            vec![
                SensorCall::StoreModel(slot(9)),
                SensorCall::ConvertImage(CharBuffer::Two)
            ]
        );
        handle.clear_calls().await;
        assert!(handle.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_capture_failure() {
        let (mut sensor, handle) = MockSensor::new();
        handle.push_capture(Capture::Fail).await;
        assert_eq!(sensor.capture_image().await.unwrap(), SensorOutcome::ImageError);
        assert_eq!(handle.pending_captures().await, 0);
    }
}
