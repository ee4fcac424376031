//! Handshake state machine
//!
//! A pure transition function over `(state, input) -> effects`. The machine
//! owns no transport and no timer: the harness feeds it inputs and performs
//! the effects it returns.
//!
//! ```text
//! AwaitingChallenge --challenge--> AwaitingResponse --matching res--> Succeeded
//!        |                                |
//!        +--- close / error / timeout / cancel / ok:false ---> Failed
//! ```
//!
//! Exactly one challenge is answered and exactly one connect request is
//! sent. Duplicate challenges, responses with a foreign id, unrelated
//! events and undecodable frames are discarded without a transition. Once
//! terminal, every further input is a no-op.

use gc_core::{DeviceIdentity, TransportError};
use gc_protocol::{
    Challenge, ErrorShape, GatewayFrame, HelloPayload, Inbound, RequestId, RequestIdGenerator,
    CONNECT_METHOD,
};
use serde_json::Value;

use super::error::{HandshakeError, HandshakeStage};
use super::outcome::{HandshakeOutcome, HelloOk};
use super::params::ConnectTemplate;

/// Current handshake state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Connected, waiting for `connect.challenge`
    AwaitingChallenge,
    /// Connect request sent, waiting for the response with this id
    AwaitingResponse {
        /// Correlation id of the pending connect request
        request_id: RequestId,
    },
    /// Terminal: the gateway issued a device token
    Succeeded,
    /// Terminal: the attempt failed
    Failed,
}

impl HandshakeState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Succeeded | HandshakeState::Failed)
    }
}

/// Something the harness observed
#[derive(Debug)]
pub enum Input {
    /// A decoded and classified inbound frame
    Frame(Inbound),
    /// An inbound frame that could not be decoded
    DecodeFailed(String),
    /// The transport failed
    TransportError(TransportError),
    /// The peer closed the transport
    TransportClosed,
    /// The handshake bound elapsed
    Timeout,
    /// The caller cancelled the attempt
    Cancel,
}

/// Something the harness must do
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send this frame on the transport
    Send(GatewayFrame),
    /// The attempt is over
    Complete(HandshakeOutcome),
}

/// Explicit handshake state machine for one attempt
#[derive(Debug)]
pub struct HandshakeMachine {
    state: HandshakeState,
    template: ConnectTemplate,
    identity: Option<DeviceIdentity>,
    ids: RequestIdGenerator,
    /// Challenge consumed, kept for diagnostics
    challenge: Option<Challenge>,
    /// Frames discarded over the whole attempt
    ignored: usize,
    /// Most recent decode failure in the current state
    decode_failure: Option<String>,
}

impl HandshakeMachine {
    /// Create a machine in `AwaitingChallenge`.
    ///
    /// Without an identity the connect request carries no `device` block.
    pub fn new(template: ConnectTemplate, identity: Option<DeviceIdentity>) -> Self {
        Self {
            state: HandshakeState::AwaitingChallenge,
            template,
            identity,
            ids: RequestIdGenerator::new(),
            challenge: None,
            ignored: 0,
            decode_failure: None,
        }
    }

    /// Current state
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// The challenge that was answered, if any
    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    /// Number of frames discarded so far
    pub fn ignored_frames(&self) -> usize {
        self.ignored
    }

    /// Number of connect requests sent (zero or one)
    pub fn requests_sent(&self) -> u64 {
        self.ids.issued()
    }

    /// Stage a failure in the current state would be attributed to
    pub fn stage(&self) -> HandshakeStage {
        match self.state {
            HandshakeState::AwaitingChallenge => HandshakeStage::AwaitingChallenge,
            _ => HandshakeStage::AwaitingResponse,
        }
    }

    /// Apply one input and return the effects to perform, in order
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        if self.state.is_terminal() {
            tracing::debug!("Handshake already finished, ignoring {:?}", input);
            return Vec::new();
        }

        match input {
            Input::Frame(inbound) => self.on_frame(inbound),
            Input::DecodeFailed(reason) => {
                tracing::warn!("Ignoring undecodable frame: {}", reason);
                self.ignored += 1;
                self.decode_failure = Some(reason);
                Vec::new()
            }
            Input::TransportError(error) => self.fail(HandshakeError::Transport(error)),
            Input::TransportClosed => self.fail(HandshakeError::Transport(TransportError::Closed)),
            Input::Timeout => {
                // A malformed frame that was the only thing to arrive is the
                // more useful diagnosis.
                let error = match self.decode_failure.take() {
                    Some(reason) => HandshakeError::Decode(reason),
                    None => HandshakeError::Timeout,
                };
                self.fail(error)
            }
            Input::Cancel => self.fail(HandshakeError::Cancelled),
        }
    }

    fn on_frame(&mut self, inbound: Inbound) -> Vec<Effect> {
        match (&self.state, inbound) {
            (HandshakeState::AwaitingChallenge, Inbound::Challenge(challenge)) => {
                self.answer(challenge)
            }
            (_, Inbound::Challenge(challenge)) => {
                tracing::debug!("Ignoring duplicate challenge (nonce {})", challenge.nonce);
                self.ignored += 1;
                Vec::new()
            }
            (
                HandshakeState::AwaitingResponse { request_id },
                Inbound::Response {
                    id,
                    ok,
                    payload,
                    error,
                },
            ) => {
                if &id != request_id {
                    tracing::debug!("Ignoring response for foreign id {}", id);
                    self.ignored += 1;
                    return Vec::new();
                }
                self.on_response(ok, payload, error)
            }
            (_, Inbound::Response { id, .. }) => {
                tracing::debug!("Ignoring response {} before any request was sent", id);
                self.ignored += 1;
                Vec::new()
            }
            (_, Inbound::Event { name, .. }) => {
                tracing::debug!("Ignoring event {}", name);
                self.ignored += 1;
                Vec::new()
            }
            (_, Inbound::Request { method, .. }) => {
                tracing::debug!("Ignoring server request {}", method);
                self.ignored += 1;
                Vec::new()
            }
            (_, Inbound::Unrecognized { raw }) => {
                tracing::debug!("Ignoring unrecognized frame: {}", raw);
                self.ignored += 1;
                Vec::new()
            }
        }
    }

    fn answer(&mut self, challenge: Challenge) -> Vec<Effect> {
        tracing::info!("Received challenge (ts {})", challenge.issued_at);

        let device = match &self.identity {
            Some(identity) => match identity.sign_assertion(&challenge.nonce, challenge.issued_at) {
                Ok(assertion) => Some(assertion),
                Err(e) => return self.fail(HandshakeError::Crypto(e)),
            },
            None => None,
        };

        let params = match serde_json::to_value(self.template.build(device)) {
            Ok(params) => params,
            Err(e) => return self.fail(HandshakeError::Encode(e.to_string())),
        };

        let request_id = self.ids.next_id();
        let frame = GatewayFrame::Request {
            id: request_id.clone(),
            method: CONNECT_METHOD.to_string(),
            params: Some(params),
        };

        tracing::info!("Sending connect request {}", request_id);
        self.challenge = Some(challenge);
        self.decode_failure = None;
        self.state = HandshakeState::AwaitingResponse { request_id };
        vec![Effect::Send(frame)]
    }

    fn on_response(
        &mut self,
        ok: bool,
        payload: Option<Value>,
        error: Option<ErrorShape>,
    ) -> Vec<Effect> {
        if !ok {
            let error = error.unwrap_or_default();
            return self.fail(HandshakeError::Rejected {
                code: error.code,
                message: error.message,
            });
        }

        match self.evaluate_hello(payload) {
            Ok(hello) => {
                tracing::info!("Handshake succeeded (protocol {})", hello.protocol_version);
                self.state = HandshakeState::Succeeded;
                vec![Effect::Complete(HandshakeOutcome::Succeeded(hello))]
            }
            Err(error) => self.fail(error),
        }
    }

    fn evaluate_hello(&self, payload: Option<Value>) -> Result<HelloOk, HandshakeError> {
        let payload = payload
            .ok_or_else(|| HandshakeError::MalformedSuccess("missing payload".to_string()))?;
        let hello: HelloPayload = serde_json::from_value(payload)
            .map_err(|e| HandshakeError::MalformedSuccess(e.to_string()))?;

        if !hello.is_hello_ok() {
            return Err(HandshakeError::MalformedSuccess(format!(
                "unexpected payload type {:?}",
                hello.kind.as_deref().unwrap_or("<none>")
            )));
        }

        let protocol = hello
            .protocol
            .as_ref()
            .ok_or_else(|| HandshakeError::MalformedSuccess("missing protocol".to_string()))?;
        let version = protocol.as_version().ok_or_else(|| {
            HandshakeError::MalformedSuccess(format!("protocol {} is not an integer", protocol))
        })?;

        let range = self.template.protocol;
        if !range.contains(version) {
            return Err(HandshakeError::VersionMismatch {
                reported: version,
                min: range.min,
                max: range.max,
            });
        }

        let device_token = hello.device_token().ok_or_else(|| {
            HandshakeError::MalformedSuccess("missing or empty auth.deviceToken".to_string())
        })?;

        Ok(HelloOk {
            protocol_version: version,
            device_token: device_token.to_string(),
            policy: hello.policy,
        })
    }

    fn fail(&mut self, error: HandshakeError) -> Vec<Effect> {
        let stage = self.stage();
        tracing::info!("Handshake failed at {}: {}", stage, error);
        self.state = HandshakeState::Failed;
        vec![Effect::Complete(HandshakeOutcome::failed(error, stage))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::identity::verify_assertion;
    use gc_protocol::{decode_inbound, ClientInfo, ConnectParams};
    use serde_json::json;

    fn template() -> ConnectTemplate {
        ConnectTemplate::new(
            "gateway-token",
            ClientInfo {
                id: "cli".to_string(),
                version: "1.0.0".to_string(),
                platform: "linux".to_string(),
                mode: "cli".to_string(),
            },
        )
    }

    fn machine() -> HandshakeMachine {
        HandshakeMachine::new(template(), Some(DeviceIdentity::create().unwrap()))
    }

    fn frame(value: Value) -> Input {
        Input::Frame(decode_inbound(&value.to_string()).unwrap())
    }

    fn challenge(nonce: &str, ts: u64) -> Input {
        frame(json!({
            "type": "event",
            "event": "connect.challenge",
            "payload": {"nonce": nonce, "ts": ts}
        }))
    }

    fn hello_ok(id: &RequestId, protocol: Value, token: &str) -> Input {
        frame(json!({
            "type": "res",
            "id": id,
            "ok": true,
            "payload": {"type": "hello-ok", "protocol": protocol, "auth": {"deviceToken": token}}
        }))
    }

    /// Drive to AwaitingResponse and return the sent request
    fn send_challenge(machine: &mut HandshakeMachine) -> (RequestId, ConnectParams) {
        let effects = machine.handle(challenge("abc123", 1000));
        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Send(GatewayFrame::Request { id, method, params }) => {
                assert_eq!(method, CONNECT_METHOD);
                let params: ConnectParams =
                    serde_json::from_value(params.clone().unwrap()).unwrap();
                (id.clone(), params)
            }
            other => panic!("expected connect request, got {:?}", other),
        }
    }

    fn outcome(effects: Vec<Effect>) -> HandshakeOutcome {
        match effects.as_slice() {
            [Effect::Complete(outcome)] => outcome.clone(),
            other => panic!("expected a single completion, got {:?}", other),
        }
    }

    #[test]
    fn test_challenge_produces_signed_connect() {
        let mut machine = machine();
        let (id, params) = send_challenge(&mut machine);

        assert_eq!(
            machine.state(),
            &HandshakeState::AwaitingResponse { request_id: id }
        );
        assert_eq!(params.auth.token, "gateway-token");
        let device = params.device.unwrap();
        assert_eq!(device.nonce, "abc123");
        assert_eq!(device.signed_at, 1000);
        verify_assertion(&device, "abc123", 1000).unwrap();
    }

    #[test]
    fn test_success() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);

        let result = outcome(machine.handle(hello_ok(&id, json!("3"), "tok-xyz")));
        assert_eq!(result.device_token(), Some("tok-xyz"));
        assert_eq!(result.hello().unwrap().protocol_version, 3);
        assert_eq!(machine.state(), &HandshakeState::Succeeded);
    }

    #[test]
    fn test_numeric_protocol_accepted() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);
        let result = outcome(machine.handle(hello_ok(&id, json!(3), "tok")));
        assert!(result.is_success());
    }

    #[test]
    fn test_duplicate_challenge_sends_once() {
        let mut machine = machine();
        send_challenge(&mut machine);

        assert!(machine.handle(challenge("abc123", 1000)).is_empty());
        assert!(machine.handle(challenge("other", 2000)).is_empty());
        assert_eq!(machine.requests_sent(), 1);
        assert_eq!(machine.challenge().unwrap().nonce, "abc123");
    }

    #[test]
    fn test_foreign_response_is_ignored() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);

        let foreign = RequestId::new("req_000000000000");
        assert!(machine.handle(hello_ok(&foreign, json!("3"), "tok")).is_empty());
        assert!(matches!(
            machine.state(),
            HandshakeState::AwaitingResponse { .. }
        ));
        assert_eq!(machine.ignored_frames(), 1);

        assert!(outcome(machine.handle(hello_ok(&id, json!("3"), "tok"))).is_success());
    }

    #[test]
    fn test_response_before_challenge_is_ignored() {
        let mut machine = machine();
        let stray = RequestId::new("req_1");
        assert!(machine.handle(hello_ok(&stray, json!("3"), "tok")).is_empty());
        assert_eq!(machine.state(), &HandshakeState::AwaitingChallenge);
    }

    #[test]
    fn test_unrelated_events_are_ignored() {
        let mut machine = machine();
        assert!(machine
            .handle(frame(json!({"type": "event", "event": "tick", "payload": {}})))
            .is_empty());
        assert!(machine
            .handle(frame(json!({"type": "hello", "x": 1})))
            .is_empty());
        assert_eq!(machine.state(), &HandshakeState::AwaitingChallenge);
    }

    #[test]
    fn test_rejection_preserves_server_error() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);

        let result = outcome(machine.handle(frame(json!({
            "type": "res",
            "id": id,
            "ok": false,
            "error": {"code": "AUTH_INVALID", "message": "bad token"}
        }))));
        let failure = result.failure().unwrap();
        assert_eq!(failure.stage, HandshakeStage::AwaitingResponse);
        assert_eq!(
            failure.error,
            HandshakeError::Rejected {
                code: Some("AUTH_INVALID".to_string()),
                message: Some("bad token".to_string()),
            }
        );
    }

    #[test]
    fn test_empty_device_token_is_malformed_success() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);
        let result = outcome(machine.handle(hello_ok(&id, json!("3"), "")));
        assert!(matches!(
            result.failure().unwrap().error,
            HandshakeError::MalformedSuccess(_)
        ));
    }

    #[test]
    fn test_wrong_payload_type_is_malformed_success() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);
        let result = outcome(machine.handle(frame(json!({
            "type": "res", "id": id, "ok": true,
            "payload": {"type": "welcome", "protocol": "3", "auth": {"deviceToken": "t"}}
        }))));
        assert!(matches!(
            result.failure().unwrap().error,
            HandshakeError::MalformedSuccess(_)
        ));
    }

    #[test]
    fn test_version_outside_range() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);
        let result = outcome(machine.handle(hello_ok(&id, json!("4"), "tok")));
        assert_eq!(
            result.failure().unwrap().error,
            HandshakeError::VersionMismatch {
                reported: 4,
                min: 3,
                max: 3
            }
        );
    }

    #[test]
    fn test_non_numeric_protocol_is_malformed() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);
        let result = outcome(machine.handle(hello_ok(&id, json!("v3"), "tok")));
        assert!(matches!(
            result.failure().unwrap().error,
            HandshakeError::MalformedSuccess(_)
        ));
    }

    #[test]
    fn test_timeout_before_challenge() {
        let mut machine = machine();
        let result = outcome(machine.handle(Input::Timeout));
        let failure = result.failure().unwrap();
        assert_eq!(failure.error, HandshakeError::Timeout);
        assert_eq!(failure.stage, HandshakeStage::AwaitingChallenge);
    }

    #[test]
    fn test_timeout_after_decode_failure_reports_decode() {
        let mut machine = machine();
        assert!(machine
            .handle(Input::DecodeFailed("malformed challenge: missing field `nonce`".to_string()))
            .is_empty());
        let result = outcome(machine.handle(Input::Timeout));
        assert!(matches!(
            result.failure().unwrap().error,
            HandshakeError::Decode(_)
        ));
    }

    #[test]
    fn test_close_while_awaiting_response() {
        let mut machine = machine();
        send_challenge(&mut machine);
        let result = outcome(machine.handle(Input::TransportClosed));
        let failure = result.failure().unwrap();
        assert_eq!(failure.error, HandshakeError::Transport(TransportError::Closed));
        assert_eq!(failure.stage, HandshakeStage::AwaitingResponse);
    }

    #[test]
    fn test_terminal_state_is_inert() {
        let mut machine = machine();
        let (id, _) = send_challenge(&mut machine);
        assert!(outcome(machine.handle(hello_ok(&id, json!("3"), "tok"))).is_success());

        assert!(machine.handle(Input::Timeout).is_empty());
        assert!(machine.handle(Input::Cancel).is_empty());
        assert!(machine.handle(Input::TransportClosed).is_empty());
        assert!(machine.handle(challenge("again", 1)).is_empty());
        assert_eq!(machine.state(), &HandshakeState::Succeeded);
    }

    #[test]
    fn test_failed_state_ignores_late_challenge() {
        let mut machine = machine();
        let result = outcome(machine.handle(Input::TransportClosed));
        assert_eq!(result.failure().unwrap().stage, HandshakeStage::AwaitingChallenge);

        assert!(machine.handle(challenge("late", 2000)).is_empty());
        assert_eq!(machine.state(), &HandshakeState::Failed);
        assert!(machine.challenge().is_none());
        assert_eq!(machine.requests_sent(), 0);
    }

    #[test]
    fn test_cancel_from_any_state() {
        let mut machine = machine();
        let result = outcome(machine.handle(Input::Cancel));
        assert_eq!(result.failure().unwrap().error, HandshakeError::Cancelled);

        let mut machine = self::machine();
        send_challenge(&mut machine);
        let result = outcome(machine.handle(Input::Cancel));
        assert_eq!(
            result.failure().unwrap().stage,
            HandshakeStage::AwaitingResponse
        );
    }

    #[test]
    fn test_without_identity_omits_device_block() {
        let mut machine = HandshakeMachine::new(template(), None);
        let (_, params) = send_challenge(&mut machine);
        assert!(params.device.is_none());
    }
}
