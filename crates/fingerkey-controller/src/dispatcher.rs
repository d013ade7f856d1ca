//! Command dispatcher: one command in, one terminal response and one Ready
//! out.
//!
//! ```text
//!         ┌──────────────┐   Command   ┌────────────┐  SensorPort  ┌────────┐
//! host ──>│CommandReader │ ──────────> │ Dispatcher │ ───────────> │ sensor │
//!         └──────────────┘             └─────┬──────┘              └────────┘
//!                                            │ Response + Ready
//!                                            v
//!                                   FramedWrite<LineCodec> ──> host
//! ```
//!
//! The dispatcher owns the sensor and handles each command to completion
//! before reading the next one. Input received in the meantime is dropped
//! before the Ready goes out. Sensor problems become Failure responses;
//! only a broken host link ends [`Dispatcher::run`].

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use fingerkey_core::Result;
use fingerkey_core::constants::{MSG_INVALID_ID, MSG_UNKNOWN_COMMAND};
use fingerkey_hardware::SensorPort;
use fingerkey_protocol::{Command, CommandTag, LineCodec, Response};

use crate::progress::Progress;
use crate::reader::CommandReader;
use crate::{ControllerConfig, enrollment, handlers};

/// Routes commands to handlers and writes their responses.
///
/// # Examples
///
/// ```
/// use fingerkey_controller::{ControllerConfig, Dispatcher};
/// use fingerkey_hardware::mock::MockSensor;
/// use tokio::io::AsyncReadExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> fingerkey_core::Result<()> {
/// let (sensor, _handle) = MockSensor::new();
/// let (device, mut host) = tokio::io::duplex(1024);
///
/// let config = ControllerConfig::default().progress_messages(false);
/// let mut dispatcher = Dispatcher::new(sensor, device, config);
/// dispatcher.run(&b"C\n"[..]).await?;
/// drop(dispatcher);
///
/// let mut transcript = String::new();
/// host.read_to_string(&mut transcript).await?;
/// assert_eq!(
///     transcript,
///     "R,Y,0,0,Fingerprint system ready\n\
///      R,R,0,0,Template count\n\
///      R,Y,0,0,Ready for next command\n"
/// );
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<P, W> {
    sensor: P,
    out: FramedWrite<W, LineCodec>,
    config: ControllerConfig,
}

impl<P, W> Dispatcher<P, W>
where
    P: SensorPort,
    W: AsyncWrite + Unpin,
{
    pub fn new(sensor: P, writer: W, config: ControllerConfig) -> Self {
        Self {
            sensor,
            out: FramedWrite::new(writer, LineCodec::new()),
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn sensor(&self) -> &P {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut P {
        &mut self.sensor
    }

    /// Give back the sensor and the writer.
    pub fn into_parts(self) -> (P, W) {
        (self.sensor, self.out.into_inner())
    }

    /// Serve commands from `input` until it ends.
    ///
    /// Writes the startup Ready first.
    ///
    /// # Errors
    ///
    /// Returns an error only when reading commands or writing responses
    /// fails.
    pub async fn run<R: AsyncRead + Unpin>(&mut self, input: R) -> Result<()> {
        let mut reader = CommandReader::new(input, self.config.argument_wait);
        self.announce().await?;

        while let Some(command) = reader.next_command().await? {
            self.respond(command).await?;
            reader.discard_pending()?;
            self.ready().await?;
        }

        info!("Command stream ended");
        Ok(())
    }

    /// Write the startup Ready.
    pub async fn announce(&mut self) -> Result<()> {
        debug!("Announcing readiness");
        self.out.send(Response::system_ready()).await
    }

    /// Handle one command: terminal response, then Ready.
    ///
    /// Returns the terminal response.
    pub async fn handle(&mut self, command: Command) -> Result<Response> {
        let response = self.respond(command).await?;
        self.ready().await?;
        Ok(response)
    }

    /// Run `command` and write its terminal response.
    async fn respond(&mut self, command: Command) -> Result<Response> {
        info!("Handling command {}", command);
        let response = self.dispatch(command).await;
        info!("Command {} -> {}", command, response);

        self.out.send(response.clone()).await?;
        Ok(response)
    }

    /// Tell the host the next command may be sent.
    async fn ready(&mut self) -> Result<()> {
        self.out.send(Response::next_ready()).await
    }

    async fn dispatch(&mut self, command: Command) -> Response {
        let mut progress = Progress::new(&mut self.out, self.config.progress_messages);

        match command.tag {
            CommandTag::Enroll => match command.slot() {
                Ok(slot) => {
                    enrollment::run(&mut self.sensor, slot, &self.config, &mut progress).await
                }
                Err(e) => {
                    warn!("Rejected enroll: {}", e);
                    Response::failure(0, MSG_INVALID_ID)
                }
            },
            CommandTag::Verify => handlers::verify(&mut self.sensor, &mut progress).await,
            CommandTag::Delete => match command.slot() {
                Ok(slot) => handlers::delete(&mut self.sensor, slot).await,
                Err(e) => {
                    warn!("Rejected delete: {}", e);
                    Response::failure(0, MSG_INVALID_ID)
                }
            },
            CommandTag::Count => handlers::count(&mut self.sensor).await,
            CommandTag::Unknown(token) => {
                warn!("Unknown command token {:?}", token);
                Response::failure(0, MSG_UNKNOWN_COMMAND)
            }
        }
    }
}
