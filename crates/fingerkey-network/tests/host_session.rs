//! Integration tests for CommandServer and HostClient
//!
//! A real TCP session between the host client and a server driving the
//! mock sensor.

use std::time::Duration;

use fingerkey_controller::ControllerConfig;
use fingerkey_core::SlotId;
use fingerkey_hardware::mock::{MockSensor, SensorOp};
use fingerkey_network::{
    CommandServer, CommandServerConfig, HostClient, HostClientConfig, HostClientError,
};
use fingerkey_protocol::{Command, CommandTag, DeviceLine, LineCodec, Response, ResponseKind};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

fn fast_controller() -> ControllerConfig {
    ControllerConfig::default()
        .poll_interval(Duration::from_millis(5))
        .removal_settle(Duration::from_millis(10))
}

async fn server(sessions: usize) -> (CommandServer, HostClientConfig) {
    let config = CommandServerConfig::default()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .max_sessions(Some(sessions));
    let server = CommandServer::bind(config).await.unwrap();
    let client = HostClientConfig::default()
        .server_addr(server.local_addr().unwrap())
        .response_timeout(Duration::from_secs(2))
        .enroll_timeout(Duration::from_secs(5));
    (server, client)
}

fn slot(id: u16) -> SlotId {
    SlotId::new(id).unwrap()
}

#[tokio::test]
async fn test_enroll_delete_verify_over_tcp() {
    let (server, client_config) = server(1).await;
    let (sensor, handle) = MockSensor::new();

    let host = async {
        let mut client = HostClient::new(client_config);
        client.connect().await.unwrap();

        handle.script_enrollment(vec![1, 2, 3]).await;
        let enrolled = client.enroll(slot(5)).await.unwrap();
        assert_eq!(enrolled.to_line(), "R,S,5,0,Fingerprint enrolled successfully");
        assert_eq!(client.count().await.unwrap(), 1);

        let deleted = client.delete(slot(5)).await.unwrap();
        assert_eq!(deleted.to_line(), "R,S,5,0,Deleted fingerprint ID #5");

        handle.present_finger(vec![1, 2, 3]).await;
        let verified = client.verify().await.unwrap();
        assert_eq!(verified, Response::failure(0, "No match found"));

        client.close().await.unwrap();
    };

    let (served, ()) = tokio::join!(server.serve(sensor, fast_controller()), host);
    served.unwrap();
}

#[tokio::test]
async fn test_failures_are_responses_not_errors() {
    let (server, client_config) = server(1).await;
    let (sensor, handle) = MockSensor::new();

    let host = async {
        let mut client = HostClient::new(client_config);
        client.connect().await.unwrap();

        let rejected = client
            .send_command(Command::new(CommandTag::Delete, Some(200)))
            .await
            .unwrap();
        assert_eq!(rejected.to_line(), "R,F,0,0,Invalid ID. Must be between 1-127");

        let unknown = client
            .send_command(Command::new(CommandTag::Unknown('Z'), None))
            .await
            .unwrap();
        assert_eq!(unknown.to_line(), "R,F,0,0,Unknown command");

        client.close().await.unwrap();
    };

    let (served, ()) = tokio::join!(server.serve(sensor, fast_controller()), host);
    served.unwrap();
    assert!(handle.calls().await.is_empty());
}

#[tokio::test]
async fn test_sensor_survives_sessions() {
    let (server, client_config) = server(2).await;
    let (sensor, handle) = MockSensor::new();

    let hosts = async {
        let mut first = HostClient::new(client_config.clone());
        first.connect().await.unwrap();
        handle.script_enrollment(vec![9]).await;
        assert!(first.enroll(slot(9)).await.unwrap().is_success());
        first.close().await.unwrap();

        let mut second = HostClient::new(client_config);
        second.connect().await.unwrap();
        handle.present_finger(vec![9]).await;
        let matched = second.verify().await.unwrap();
        assert_eq!(matched.kind(), ResponseKind::Success);
        assert_eq!(matched.id(), 9);
        second.close().await.unwrap();
    };

    let (served, ()) = tokio::join!(server.serve(sensor, fast_controller()), hosts);
    served.unwrap();
}

#[tokio::test]
async fn test_count_reports_zero_on_sensor_error() {
    let (server, client_config) = server(1).await;
    let (sensor, handle) = MockSensor::new();
    handle.store_template(slot(1), vec![1]).await;
    handle.inject_transport_error(SensorOp::CountModels).await;

    let host = async {
        let mut client = HostClient::new(client_config);
        client.connect().await.unwrap();
        assert_eq!(client.count().await.unwrap(), 0);
        assert_eq!(client.count().await.unwrap(), 1);
        client.close().await.unwrap();
    };

    let (served, ()) = tokio::join!(server.serve(sensor, fast_controller()), host);
    served.unwrap();
}

/// Listener standing in for a controller that misbehaves on cue.
async fn fake_controller() -> (HostClientConfig, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = HostClientConfig::default()
        .server_addr(listener.local_addr().unwrap())
        .connect_timeout(Duration::from_millis(500))
        .response_timeout(Duration::from_millis(200));
    (config, listener)
}

#[tokio::test]
async fn test_client_skips_progress_text() {
    let (config, listener) = fake_controller().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LineCodec::new());
        framed.send(Response::system_ready()).await.unwrap();

        let line = framed.next().await.unwrap().unwrap();
        assert!(matches!(line, DeviceLine::Diagnostic(ref c) if c == "V"));

        let mut stream = framed.into_inner();
        stream
            .write_all(
                b"Place finger to verify...\r\n\
                  R,S,3,120,Fingerprint matched\r\n\
                  R,Y,0,0,Ready for next command\r\n",
            )
            .await
            .unwrap();
        stream.flush().await.unwrap();
        // Hold the connection open until the client hangs up.
        let _ = stream.read(&mut [0u8; 8]).await;
    });

    let mut client = HostClient::new(config);
    client.connect().await.unwrap();
    let response = client.verify().await.unwrap();
    assert_eq!(response, Response::success(3, 120, "Fingerprint matched"));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_client_times_out_without_ready() {
    let (config, listener) = fake_controller().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LineCodec::new());
        framed.send(Response::system_ready()).await.unwrap();
        let _ = framed.next().await;
        framed.send(Response::info(2, "Template count")).await.unwrap();
        // No Ready follows.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut client = HostClient::new(config);
    client.connect().await.unwrap();
    let result = client.count().await;
    assert!(matches!(result, Err(HostClientError::ResponseTimeout(200))));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_late_reply_not_taken_for_next_answer() {
    let (config, listener) = fake_controller().await;
    let config = config.response_timeout(Duration::from_millis(100));

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LineCodec::new());
        framed.send(Response::system_ready()).await.unwrap();
        let _ = framed.next().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        // The client may already have hung up.
        let _ = framed.send(Response::info(4, "Template count")).await;
        let _ = framed.send(Response::next_ready()).await;
        let _ = framed.next().await;
    });

    let mut client = HostClient::new(config);
    client.connect().await.unwrap();
    let result = client.count().await;
    assert!(matches!(result, Err(HostClientError::ResponseTimeout(100))));
    assert!(!client.is_connected());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let result = client.verify().await;
    assert!(matches!(result, Err(HostClientError::NotConnected)));
}

#[tokio::test]
async fn test_client_rejects_missing_startup_ready() {
    let (config, listener) = fake_controller().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LineCodec::new());
        framed.send(Response::failure(0, "Unknown command")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let mut client = HostClient::new(config);
    let result = client.connect().await;
    assert!(matches!(result, Err(HostClientError::UnexpectedResponse(_))));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_client_reports_closed_connection() {
    let (config, listener) = fake_controller().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LineCodec::new());
        framed.send(Response::system_ready()).await.unwrap();
        let _ = framed.next().await;
    });

    let mut client = HostClient::new(config);
    client.connect().await.unwrap();
    let result = client.count().await;
    assert!(matches!(result, Err(HostClientError::ConnectionLost(_))));
    assert!(!client.is_connected());
}
