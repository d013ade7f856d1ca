//! Single-shot handlers: verify, delete and count.
//!
//! None of these poll. Verify takes exactly one image; if nobody is touching
//! the sensor at that moment it is reported as a miss like any other.

use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use fingerkey_core::SlotId;
use fingerkey_core::constants::{
    MSG_DELETE_FAILED_PREFIX, MSG_DELETED_PREFIX, MSG_MATCHED, MSG_NO_MATCH, MSG_TEMPLATE_COUNT,
};
use fingerkey_hardware::{CharBuffer, SensorError, SensorOutcome, SensorPort};
use fingerkey_protocol::Response;

use crate::progress::Progress;

/// Why a verify did not match. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Miss {
    Capture(SensorOutcome),
    Conversion(SensorOutcome),
    Search(SensorOutcome),
}

/// Capture, convert into buffer one, search the library.
pub async fn verify<S, W>(sensor: &mut S, progress: &mut Progress<'_, W>) -> Response
where
    S: SensorPort,
    W: AsyncWrite + Unpin,
{
    progress.say("Place finger to verify...").await;

    match identify(sensor).await {
        Ok(Ok((id, confidence))) => {
            info!("Verify matched slot {} (confidence {})", id, confidence);
            Response::success(id, confidence, MSG_MATCHED)
        }
        Ok(Err(miss)) => {
            info!("Verify failed: {:?}", miss);
            Response::failure(0, MSG_NO_MATCH)
        }
        Err(e) => {
            warn!("Sensor error during verify: {}", e);
            Response::failure(0, MSG_NO_MATCH)
        }
    }
}

async fn identify<S: SensorPort>(
    sensor: &mut S,
) -> Result<Result<(u16, u16), Miss>, SensorError> {
    let outcome = sensor.capture_image().await?;
    if !outcome.is_ok() {
        return Ok(Err(Miss::Capture(outcome)));
    }

    let outcome = sensor.convert_image(CharBuffer::One).await?;
    if !outcome.is_ok() {
        return Ok(Err(Miss::Conversion(outcome)));
    }

    match sensor.search_model().await? {
        SensorOutcome::SearchMatch { id, confidence } => Ok(Ok((id, confidence))),
        other => Ok(Err(Miss::Search(other))),
    }
}

/// Delete the template in `slot`. No existence check is made first.
pub async fn delete<S: SensorPort>(sensor: &mut S, slot: SlotId) -> Response {
    let id = slot.as_u16();
    let outcome = sensor.delete_model(slot).await;
    debug!("Delete slot {} -> {:?}", slot, outcome);

    match outcome {
        Ok(SensorOutcome::DeletionOk) => {
            info!("Deleted slot {}", slot);
            Response::success(id, 0, format!("{MSG_DELETED_PREFIX}{id}"))
        }
        Ok(other) => {
            info!("Delete of slot {} failed: {}", slot, other);
            Response::failure(id, format!("{MSG_DELETE_FAILED_PREFIX}{id}"))
        }
        Err(e) => {
            warn!("Sensor error during delete of slot {}: {}", slot, e);
            Response::failure(id, format!("{MSG_DELETE_FAILED_PREFIX}{id}"))
        }
    }
}

/// Report the number of stored templates. Always an Info response.
pub async fn count<S: SensorPort>(sensor: &mut S) -> Response {
    let templates = match sensor.count_models().await {
        Ok(SensorOutcome::Count(n)) => n,
        Ok(other) => {
            warn!("Unexpected count outcome: {}", other);
            0
        }
        Err(e) => {
            warn!("Sensor error during count: {}", e);
            0
        }
    };
    info!("Template count {}", templates);
    Response::info(templates, MSG_TEMPLATE_COUNT)
}
