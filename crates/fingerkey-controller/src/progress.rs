//! Human-readable progress lines written between responses.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{trace, warn};

use fingerkey_protocol::{DeviceLine, LineCodec};

/// Writes optional progress text to the host link.
///
/// Progress lines are best-effort: a failed write disables further
/// progress for this command instead of failing it.
pub struct Progress<'a, W> {
    out: Option<&'a mut FramedWrite<W, LineCodec>>,
}

impl<'a, W: AsyncWrite + Unpin> Progress<'a, W> {
    pub fn new(out: &'a mut FramedWrite<W, LineCodec>, enabled: bool) -> Self {
        Self {
            out: enabled.then_some(out),
        }
    }

    /// A sink that drops everything.
    pub fn silent() -> Self {
        Self { out: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.out.is_some()
    }

    pub async fn say(&mut self, text: impl Into<String>) {
        let text = text.into();
        trace!("Progress: {}", text);

        let Some(out) = self.out.as_mut() else {
            return;
        };
        if let Err(e) = out.send(DeviceLine::Diagnostic(text)).await {
            warn!("Dropping progress output: {}", e);
            self.out = None;
        }
    }
}
