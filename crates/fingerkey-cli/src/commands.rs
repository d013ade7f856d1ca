//! What each subcommand does, apart from argument parsing and printing.

use anyhow::{Context, Result};
use tracing::{info, warn};

use fingerkey_controller::{ControllerConfig, Dispatcher};
use fingerkey_core::SlotId;
use fingerkey_hardware::mock::MockSensor;
use fingerkey_hardware::{AnySensor, R30xSensor, SerialConfig};
use fingerkey_network::{CommandServer, CommandServerConfig, HostClient, HostClientConfig};
use fingerkey_protocol::Response;
use fingerkey_storage::{Database, DatabaseConfig, Fingerprint, Registry, VerifiedIdentity};

use crate::config::SensorBackend;

/// Open the configured sensor.
///
/// A serial sensor must answer the password handshake, otherwise serving
/// is pointless.
pub async fn open_sensor(backend: SensorBackend, serial: &SerialConfig) -> Result<AnySensor> {
    match backend {
        SensorBackend::Serial => {
            let sensor = R30xSensor::connect(serial)
                .await
                .with_context(|| format!("Fingerprint sensor not found on {}", serial.path))?;
            info!("Found fingerprint sensor on {}", serial.path);
            Ok(AnySensor::Serial(sensor))
        }
        SensorBackend::Mock => {
            let (sensor, _handle) = MockSensor::new();
            warn!("Using mock sensor: no finger is ever presented");
            Ok(AnySensor::Mock(sensor))
        }
    }
}

/// Serve the controller over TCP until interrupted or out of sessions.
pub async fn serve_tcp(
    sensor: AnySensor,
    server: CommandServerConfig,
    controller: ControllerConfig,
) -> Result<()> {
    let server = CommandServer::bind(server).await?;

    tokio::select! {
        result = server.serve(sensor, controller) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}

/// Serve the controller on stdin/stdout, as a device on a serial console
/// would.
pub async fn serve_stdio(sensor: AnySensor, controller: ControllerConfig) -> Result<()> {
    let mut dispatcher = Dispatcher::new(sensor, tokio::io::stdout(), controller);

    tokio::select! {
        result = dispatcher.run(tokio::io::stdin()) => {
            result.context("Command stream failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}

pub async fn open_registry(config: DatabaseConfig) -> Result<Registry> {
    let path = config.database_path.clone();
    let db = Database::new(config)
        .await
        .with_context(|| format!("Failed to open registry database {path}"))?;
    Ok(Registry::new(db))
}

/// A connected controller plus the registry its outcomes are recorded in.
pub struct Host {
    client: HostClient,
    registry: Registry,
}

impl Host {
    pub async fn connect(config: HostClientConfig, registry: Registry) -> Result<Self> {
        let addr = config.server_addr;
        let mut client = HostClient::new(config);
        client
            .connect()
            .await
            .with_context(|| format!("Failed to connect to controller at {addr}"))?;
        Ok(Self { client, registry })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Enroll `slot` and register `name` if the sensor accepted it.
    pub async fn enroll(
        &mut self,
        slot: SlotId,
        name: &str,
    ) -> Result<(Response, Option<Fingerprint>)> {
        let name = Registry::validate_name(name)?;
        let response = self.client.enroll(slot).await?;
        let stored = self.registry.record_enrollment(slot, name, &response).await?;
        Ok((response, stored))
    }

    pub async fn verify(&mut self) -> Result<(Response, Option<VerifiedIdentity>)> {
        let response = self.client.verify().await?;
        let identity = self.registry.record_verification(&response).await?;
        Ok((response, identity))
    }

    /// Delete `slot` from the sensor, then from the registry.
    pub async fn delete(&mut self, slot: SlotId) -> Result<Response> {
        let response = self.client.delete(slot).await?;
        self.registry.record_deletion(slot, &response).await?;
        Ok(response)
    }

    pub async fn count(&mut self) -> Result<u16> {
        Ok(self.client.count().await?)
    }

    pub async fn close(mut self) -> Result<()> {
        self.client.close().await?;
        self.registry.database().close().await;
        Ok(())
    }
}
