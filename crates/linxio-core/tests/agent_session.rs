//! Agent state machine against a mock JSON transport

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use linxio_core::agent::{Agent, AgentError, SessionState};
use linxio_core::transport::{ConnectionHandler, Transport, TransportError, WireFormat};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// One exchange as the mock transport saw it
#[derive(Debug, Clone)]
struct Exchange {
    endpoint: String,
    payload: Vec<u8>,
    format: WireFormat,
}

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<Exchange>>,
    replies: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
}

impl MockState {
    fn queue_json(&self, reply: Value) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string().into_bytes()));
    }

    fn queue_raw(&self, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(body.as_bytes().to_vec()));
    }

    fn sent(&self) -> Vec<Exchange> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_body(&self, index: usize) -> Value {
        serde_json::from_slice(&self.sent()[index].payload).expect("request body should be JSON")
    }
}

struct MockTransport {
    state: Arc<MockState>,
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn write_read(
        &self,
        _address: &str,
        endpoint: &str,
        payload: &[u8],
        format: WireFormat,
    ) -> Result<Vec<u8>, TransportError> {
        self.state.sent.lock().unwrap().push(Exchange {
            endpoint: endpoint.to_string(),
            payload: payload.to_vec(),
            format,
        });
        self.state
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::Timeout))
    }
}

fn mock_agent() -> (Agent, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let transport = MockTransport {
        state: Arc::clone(&state),
    };
    let agent = Agent::with_connection(
        "agent.local:44300",
        ConnectionHandler::with_transport(Box::new(transport)),
    );
    (agent, state)
}

#[tokio::test]
async fn set_active_device_appends_and_activates() {
    let (mut agent, state) = mock_agent();
    state.queue_json(json!({"agent": [{"statusCode": 0}]}));

    agent.set_active_device("dev1").await.unwrap();

    assert_eq!(agent.devices().len(), 1);
    assert_eq!(agent.active_device_index(), Some(0));
    assert_eq!(agent.state(), SessionState::DeviceActive);

    // The device binds to the agent's own (normalized) address.
    let device = agent.active_device().expect("device should be active");
    assert_eq!(device.address(), "http://agent.local:44300");

    assert_eq!(
        state.sent_body(0),
        json!({"agent": [{"command": "setActiveDevice", "device": "dev1"}]})
    );
}

#[tokio::test]
async fn failed_activation_leaves_devices_untouched() {
    let (mut agent, state) = mock_agent();
    state.queue_json(json!({"agent": [{"statusCode": 1}]}));

    let err = agent.set_active_device("dev1").await.unwrap_err();
    assert!(matches!(err, AgentError::CommandFailed(_)));

    assert!(agent.devices().is_empty());
    assert_eq!(agent.active_device_index(), None);
    assert_eq!(agent.state(), SessionState::Idle);
}

#[tokio::test]
async fn any_failing_element_fails_the_reply() {
    let (agent, state) = mock_agent();
    state.queue_json(json!({"agent": [{"statusCode": 0}, {"statusCode": 3}]}));

    let err = agent.get_agent_info().await.unwrap_err();
    match err {
        AgentError::CommandFailed(reply) => {
            assert_eq!(reply["agent"][1]["statusCode"], 3);
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_agent_array_is_malformed() {
    let (agent, state) = mock_agent();
    state.queue_json(json!({"status": "ok"}));

    let err = agent.get_agent_info().await.unwrap_err();
    assert!(matches!(err, AgentError::MalformedReply(_)));
}

#[tokio::test]
async fn unparseable_reply_is_a_json_error() {
    let (agent, state) = mock_agent();
    state.queue_raw("not json at all");

    let err = agent.get_agent_info().await.unwrap_err();
    assert!(matches!(err, AgentError::Json(_)));
}

#[tokio::test]
async fn enumerate_devices_advances_the_state_machine() {
    let (mut agent, state) = mock_agent();
    state.queue_json(json!({"agent": [{"statusCode": 0, "devices": ["dev1", "dev2"]}]}));

    let reply = agent.enumerate_devices().await.unwrap();
    assert_eq!(agent.state(), SessionState::DevicesEnumerated);
    assert_eq!(reply["agent"][0]["devices"][1], "dev2");

    assert_eq!(
        state.sent_body(0),
        json!({"agent": [{"command": "enumerateDevices"}]})
    );
}

#[tokio::test]
async fn get_agent_info_uses_the_wire_command_name() {
    let (agent, state) = mock_agent();
    state.queue_json(json!({"agent": [{"statusCode": 0, "version": "2.1"}]}));

    agent.get_agent_info().await.unwrap();
    assert_eq!(state.sent_body(0), json!({"agent": [{"command": "getInfo"}]}));
}

#[tokio::test]
async fn release_returns_to_idle_but_keeps_handles() {
    let (mut agent, state) = mock_agent();
    state.queue_json(json!({"agent": [{"statusCode": 0}]}));
    state.queue_json(json!({"agent": [{"statusCode": 0}]}));

    agent.set_active_device("dev1").await.unwrap();
    agent.release_active_device().await.unwrap();

    assert_eq!(agent.state(), SessionState::Idle);
    assert_eq!(agent.active_device_index(), None);
    assert!(agent.active_device().is_none());
    assert_eq!(agent.devices().len(), 1);

    assert_eq!(
        state.sent_body(1),
        json!({"agent": [{"command": "releaseActiveDevice"}]})
    );
}

#[tokio::test]
async fn control_traffic_targets_the_config_endpoint_as_json() {
    let (agent, state) = mock_agent();
    state.queue_json(json!({"agent": [{"statusCode": 0}]}));

    agent.get_active_device().await.unwrap();

    let sent = state.sent();
    assert_eq!(sent[0].endpoint, "/config");
    assert_eq!(sent[0].format, WireFormat::Json);
}

#[tokio::test]
async fn transport_failure_surfaces_as_agent_error() {
    let (agent, _state) = mock_agent();
    // No reply queued: the mock answers with a timeout.
    let err = agent.get_agent_info().await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Transport(TransportError::Timeout)
    ));
}
