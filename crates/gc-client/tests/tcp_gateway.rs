//! End-to-end handshake over TCP
//!
//! Runs a minimal in-process gateway that issues a challenge, verifies the
//! device signature the way a real gateway does, and answers the connect
//! request.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use gc_client::handshake::{attempt_tcp, HandshakeError, HandshakeStage};
use gc_client::{connect_with_retry, ConnectTemplate, ExponentialBackoff};
use gc_core::config::GatecheckConfig;
use gc_core::identity::verify_assertion;
use gc_core::TransportError;
use gc_protocol::{ConnectParams, JsonLinesCodec};

const GATEWAY_TOKEN: &str = "30bfd2b063ab78d7";

/// Start a gateway that serves `connections` handshakes, then exits.
///
/// Returns the bound port.
async fn spawn_gateway(connections: usize, device_required: bool) -> u16 {
    spawn_gateway_with_prelude(connections, device_required, b"").await
}

/// Like [`spawn_gateway`], but writes `prelude` verbatim before each challenge
async fn spawn_gateway_with_prelude(
    connections: usize,
    device_required: bool,
    prelude: &'static [u8],
) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        for _ in 0..connections {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = socket;
            socket.write_all(prelude).await.unwrap();
            let mut framed = Framed::new(socket, JsonLinesCodec::new());

            let nonce = format!("nonce-{}", rand_suffix());
            let ts = 1_737_264_000_000u64;
            framed
                .send(
                    json!({
                        "type": "event",
                        "event": "connect.challenge",
                        "payload": {"nonce": nonce, "ts": ts}
                    })
                    .to_string(),
                )
                .await
                .unwrap();

            let line = match framed.next().await {
                Some(Ok(line)) => line,
                _ => continue,
            };
            let request: Value = serde_json::from_slice(&line).unwrap();
            let id = request["id"].clone();
            let params: ConnectParams =
                serde_json::from_value(request["params"].clone()).unwrap();

            let response = match check_connect(&params, &nonce, ts, device_required) {
                Ok(()) => json!({
                    "type": "res",
                    "id": id,
                    "ok": true,
                    "payload": {
                        "type": "hello-ok",
                        "protocol": "3",
                        "auth": {"deviceToken": format!("dt-{}", params.client.id)},
                        "policy": {"maxPayload": 1048576}
                    }
                }),
                Err(code) => json!({
                    "type": "res",
                    "id": id,
                    "ok": false,
                    "error": {"code": code, "message": "connect refused"}
                }),
            };
            framed.send(response.to_string()).await.unwrap();
        }
    });

    port
}

fn rand_suffix() -> u32 {
    rand::random()
}

fn check_connect(
    params: &ConnectParams,
    nonce: &str,
    ts: u64,
    device_required: bool,
) -> Result<(), &'static str> {
    if params.auth.token != GATEWAY_TOKEN {
        return Err("AUTH_INVALID");
    }
    match &params.device {
        Some(device) => verify_assertion(device, nonce, ts).map_err(|_| "DEVICE_AUTH_INVALID"),
        None if device_required => Err("DEVICE_REQUIRED"),
        None => Ok(()),
    }
}

fn config_for(port: u16) -> GatecheckConfig {
    let mut config = GatecheckConfig::default();
    config.gateway.port = port;
    config.gateway.token = Some(GATEWAY_TOKEN.to_string());
    config.handshake.timeout = Duration::from_secs(5);
    config.probe.timeout = Duration::from_secs(2);
    config
}

#[tokio::test]
async fn test_handshake_over_tcp() {
    let port = spawn_gateway(1, true).await;
    let config = config_for(port);
    let template = ConnectTemplate::from_config(&config).unwrap();

    let report = attempt_tcp(&config, template, CancellationToken::new()).await;

    let hello = report.outcome.hello().expect("handshake failed");
    assert_eq!(hello.device_token, "dt-cli");
    assert_eq!(hello.protocol_version, 3);
    assert_eq!(hello.policy, Some(json!({"maxPayload": 1048576})));
    assert!(report.device.unwrap().id.starts_with("device_"));
    assert_eq!(report.peer, format!("tcp://127.0.0.1:{}", port));
}

#[tokio::test]
async fn test_unreadable_bytes_before_challenge_are_ignored() {
    let port = spawn_gateway_with_prelude(1, true, b"\xff\xfe garbage\n").await;
    let config = config_for(port);
    let template = ConnectTemplate::from_config(&config).unwrap();

    let report = attempt_tcp(&config, template, CancellationToken::new()).await;

    assert_eq!(report.outcome.device_token(), Some("dt-cli"));
    assert_eq!(report.ignored_frames, 1);
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let port = spawn_gateway(1, true).await;
    let mut config = config_for(port);
    config.gateway.token = Some("wrong".to_string());
    let template = ConnectTemplate::from_config(&config).unwrap();

    let report = attempt_tcp(&config, template, CancellationToken::new()).await;

    let failure = report.outcome.failure().unwrap();
    assert_eq!(
        failure.error,
        HandshakeError::Rejected {
            code: Some("AUTH_INVALID".to_string()),
            message: Some("connect refused".to_string()),
        }
    );
}

#[tokio::test]
async fn test_token_only_against_device_gateway() {
    let port = spawn_gateway(1, true).await;
    let mut config = config_for(port);
    config.handshake.device_auth = false;
    let template = ConnectTemplate::from_config(&config).unwrap();

    let report = attempt_tcp(&config, template, CancellationToken::new()).await;

    let failure = report.outcome.failure().unwrap();
    assert!(matches!(
        &failure.error,
        HandshakeError::Rejected { code: Some(code), .. } if code == "DEVICE_REQUIRED"
    ));
    assert!(report.device.is_none());
}

#[tokio::test]
async fn test_token_only_against_permissive_gateway() {
    let port = spawn_gateway(1, false).await;
    let mut config = config_for(port);
    config.handshake.device_auth = false;
    let template = ConnectTemplate::from_config(&config).unwrap();

    let report = attempt_tcp(&config, template, CancellationToken::new()).await;
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn test_nothing_listening() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = config_for(port);
    let template = ConnectTemplate::from_config(&config).unwrap();
    let report = attempt_tcp(&config, template, CancellationToken::new()).await;

    let failure = report.outcome.failure().unwrap();
    assert_eq!(failure.stage, HandshakeStage::Connect);
    assert!(matches!(
        failure.error,
        HandshakeError::Transport(TransportError::ConnectFailed { .. })
    ));
}

#[tokio::test]
async fn test_retry_stops_on_rejection() {
    let port = spawn_gateway(2, true).await;
    let config = config_for(port);
    let template = ConnectTemplate::from_config(&config).unwrap();
    let cancel = CancellationToken::new();

    let backoff = ExponentialBackoff::new(
        Duration::from_millis(10),
        Duration::from_millis(50),
        2.0,
        0.0,
    );

    // Rejection is final: one attempt only
    let mut wrong = config.clone();
    wrong.gateway.token = Some("wrong".to_string());
    let wrong_template = ConnectTemplate::from_config(&wrong).unwrap();
    let mut attempts = 0;
    let report = connect_with_retry(
        |_| {
            attempts += 1;
            attempt_tcp(&wrong, wrong_template.clone(), cancel.clone())
        },
        backoff.clone(),
        3,
        &cancel,
    )
    .await;
    assert!(!report.outcome.is_success());
    assert_eq!(attempts, 1);

    let report = connect_with_retry(
        |_| attempt_tcp(&config, template.clone(), cancel.clone()),
        backoff,
        3,
        &cancel,
    )
    .await;
    assert!(report.outcome.is_success());
}
