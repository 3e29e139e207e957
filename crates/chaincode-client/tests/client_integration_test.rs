//! Integration tests for the chaincode client against a scripted peer.
//!
//! A mock transport answers every request from an injectable handler and
//! records what was sent, so the tests can assert on wire-level envelopes,
//! target peers, and request timing. Tests that involve retry delays or the
//! height monitor run with tokio's paused clock.

use async_trait::async_trait;
use chaincode_client::chaincode_types::config::{
    ChaincodeOptions, LoadOptions, NetworkConfig, NetworkOptions, PeerConfig, UserConfig,
};
use chaincode_client::chaincode_types::error::{ErrorKind, SdkError};
use chaincode_client::transport::HttpMethod;
use chaincode_client::{
    ChaincodeClient, ClientConfig, DeployOptions, Transport, TransportFailure, TransportRequest,
    TransportResponse,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

// ---------------------------------------------------------------------------
// Mock Transport: scripted responses, captured requests
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&TransportRequest) -> Result<Value, TransportFailure> + Send + Sync>;

struct MockTransport {
    handler: Handler,
    /// Every request seen, with the (possibly paused) clock time it arrived.
    sent: Mutex<Vec<(Instant, TransportRequest)>>,
}

impl MockTransport {
    fn new(
        handler: impl Fn(&TransportRequest) -> Result<Value, TransportFailure> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn times_for(&self, path: &str) -> Vec<Instant> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.path == path)
            .map(|(at, _)| *at)
            .collect()
    }

    fn count(&self, path: &str) -> usize {
        self.times_for(path).len()
    }

    fn last(&self) -> TransportRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        (self.handler)(&request).map(|body| TransportResponse { status: 200, body })
    }
}

fn fail(status: u16, cause: &str) -> TransportFailure {
    TransportFailure {
        status,
        cause: cause.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn peers() -> Vec<PeerConfig> {
    (0..2u16)
        .map(|n| PeerConfig {
            id: format!("f2b1a7c3d9e8_vp{n}"),
            api_host: format!("peer{n}.example.com"),
            api_port: Some(5000 + n),
            api_port_tls: Some(7051 + n),
        })
        .collect()
}

fn chaincode() -> ChaincodeOptions {
    ChaincodeOptions {
        deployed_name: Some("mycc".to_string()),
        git_url: "github.com/example/marbles".to_string(),
        version: Some("1.0".to_string()),
        invoke: vec!["init".to_string(), "write".to_string()],
        query: vec!["read".to_string()],
    }
}

fn options(max_retry: u32) -> NetworkOptions {
    NetworkOptions {
        max_retry,
        ..Default::default()
    }
}

fn client_in(dir: &Path, transport: Arc<MockTransport>) -> ChaincodeClient {
    let config = ClientConfig {
        state_dir: dir.to_path_buf(),
        ..Default::default()
    };
    ChaincodeClient::with_transport(config, transport)
}

/// A client with two peers and the test chaincode declared.
fn ready_client(dir: &Path, transport: Arc<MockTransport>) -> ChaincodeClient {
    let client = client_in(dir, transport);
    client.network(&peers(), Some(options(2))).unwrap();
    client.load_chaincode(&chaincode());
    client
}

fn query_ok(request: &TransportRequest) -> Result<Value, TransportFailure> {
    match request.path.as_str() {
        "/chaincode" => Ok(json!({"jsonrpc": "2.0", "result": {"status": "OK", "message": "42"}})),
        _ => Ok(json!({"OK": "done"})),
    }
}

// ---------------------------------------------------------------------------
// Peer selection and envelopes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_switch_peer_routes_next_call() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport.clone());

    assert_ok!(client.invoke("write", vec!["a".into(), "1".into()], None).await);
    let first = transport.last();
    assert_eq!(first.target.host, "peer0.example.com");
    assert_eq!(first.target.port, 7051);

    assert!(client.switch_peer(1));
    assert_ok!(client.invoke("write", vec!["a".into(), "2".into()], None).await);
    let second = transport.last();
    assert_eq!(second.target.host, "peer1.example.com");
    assert_eq!(second.target.port, 7052);
    assert!(second.target.tls);

    assert!(!client.switch_peer(9));
    assert_eq!(client.selected_peer().unwrap().host, "peer1.example.com");
}

#[tokio::test]
async fn test_invoke_envelope_shape() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport.clone());

    assert_ok!(client.invoke("write", vec!["k".into(), "v".into()], None).await);
    assert_ok!(client.invoke("write", vec!["k".into(), "w".into()], None).await);

    let requests = transport.requests();
    let first = requests[0].body.clone().unwrap();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].path, "/chaincode");
    assert_eq!(first["jsonrpc"], "2.0");
    assert_eq!(first["method"], "invoke");
    assert_eq!(first["params"]["type"], 1);
    assert_eq!(first["params"]["chaincodeID"]["name"], "mycc");
    assert_eq!(first["params"]["ctorMsg"]["function"], "write");
    assert_eq!(first["params"]["ctorMsg"]["args"], json!(["k", "v"]));
    assert!(first["params"].get("secureContext").is_none());

    let second = requests[1].body.clone().unwrap();
    assert!(second["id"].as_u64().unwrap() > first["id"].as_u64().unwrap());
}

// ---------------------------------------------------------------------------
// Capability registry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_duplicate_declarations_bind_once() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport.clone());

    let mut again = chaincode();
    again.invoke.push("write".to_string());
    let descriptor = client.load_chaincode(&again);
    assert_eq!(descriptor.invoke_names, vec!["init", "write"]);
    assert!(!client.bind_invoke("init"));
    assert!(client.bind_invoke("transfer"));

    let stub = client.invoke_fn("transfer").unwrap();
    assert_eq!(stub.name(), "transfer");
    assert_ok!(stub.call(vec!["a".into()], None).await);
    assert!(client.query_fn("transfer").is_none());
}

#[tokio::test]
async fn test_unbound_function_is_rejected_without_a_request() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport.clone());

    let err = assert_err!(client.invoke("read", vec![], None).await);
    assert!(matches!(err, SdkError::UnknownFunction(ref name) if name == "read"));
    assert_eq!(err.status_code(), 400);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_query_normalizes_response() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport.clone());

    let value = assert_ok!(client.query_fn("read").unwrap().call(vec!["k".into()], None).await);
    assert_eq!(value, json!("42"));
    assert_eq!(transport.last().body.unwrap()["method"], "query");
    // Queries never feed the monitor.
    assert_eq!(client.pending_actions(), 0);
}

#[tokio::test]
async fn test_malformed_query_response_is_502() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Ok(json!({"jsonrpc": "2.0", "result": {"status": "OK"}})));
    let client = ready_client(dir.path(), transport);

    let err = assert_err!(client.query("read", vec![], None).await);
    assert_eq!(err.status_code(), 502);
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_query_transport_failure_keeps_status() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Err(fail(404, "no such chaincode")));
    let client = ready_client(dir.path(), transport);

    let err = assert_err!(client.query("read", vec![], None).await);
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_successful_invoke_records_pending_action() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport);

    assert_ok!(client.invoke("write", vec![], None).await);
    assert_ok!(client.invoke("init", vec![], None).await);
    assert_eq!(client.pending_actions(), 2);
}

#[tokio::test]
async fn test_failed_invoke_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Err(fail(500, "connection refused")));
    let client = ready_client(dir.path(), transport);

    let err = assert_err!(client.invoke("write", vec![], None).await);
    assert!(matches!(err, SdkError::InvokeFailed { status: 500, .. }));
    assert_eq!(client.pending_actions(), 0);
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_register_without_retries_gives_up_after_one_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Err(fail(503, "membership unavailable")));
    let client = ready_client(dir.path(), transport.clone());

    let err = assert_err!(client.register(0, "alice", "secret", Some(0)).await);
    assert_eq!(err.kind(), ErrorKind::RegistrationExhausted);
    assert!(matches!(err, SdkError::RegistrationFailed { attempts: 1, status: 503, .. }));
    assert_eq!(transport.count("/registrar"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_register_retries_with_fixed_delay() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Err(fail(503, "membership unavailable")));
    let client = ready_client(dir.path(), transport.clone());

    let err = assert_err!(client.register(0, "alice", "secret", None).await);
    assert!(matches!(err, SdkError::RegistrationFailed { attempts: 3, .. }));

    let times = transport.times_for("/registrar");
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(30));
    }
    assert_eq!(times[2] - times[0], Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_register_recovers_on_retry() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let seen = calls.clone();
    let transport = MockTransport::new(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(fail(500, "starting up"))
        } else {
            Ok(json!({"OK": "Login successful for user 'alice'."}))
        }
    });
    let client = ready_client(dir.path(), transport.clone());

    assert_ok!(client.register(0, "alice", "secret", Some(2)).await);
    assert_eq!(transport.count("/registrar"), 2);
    assert_eq!(client.peers()[0].identity.as_deref(), Some("alice"));

    let body = transport.last().body.unwrap();
    assert_eq!(body, json!({"enrollId": "alice", "enrollSecret": "secret"}));
}

#[tokio::test]
async fn test_identity_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport.clone());

    assert_ok!(client.register(0, "alice", "secret", Some(0)).await);

    assert_ok!(client.invoke("write", vec![], None).await);
    assert_eq!(transport.last().body.unwrap()["params"]["secureContext"], "alice");

    assert_ok!(client.invoke("write", vec![], Some("bob")).await);
    assert_eq!(transport.last().body.unwrap()["params"]["secureContext"], "bob");

    // Peer 1 never registered anyone.
    client.switch_peer(1);
    assert_ok!(client.invoke("write", vec![], None).await);
    assert!(transport.last().body.unwrap()["params"].get("secureContext").is_none());

    client.switch_peer(0);
    assert_ok!(client.unregister(0, "alice").await);
    let request = transport.last();
    assert_eq!(request.method, HttpMethod::Delete);
    assert_eq!(request.path, "/registrar/alice");
    assert_ok!(client.invoke("write", vec![], None).await);
    assert!(transport.last().body.unwrap()["params"].get("secureContext").is_none());
}

#[tokio::test]
async fn test_registrar_paths_encode_the_identity() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = ready_client(dir.path(), transport.clone());

    assert_ok!(client.check_registration(0, "ops/admin?x#y").await);
    assert_eq!(transport.last().path, "/registrar/ops%2Fadmin%3Fx%23y");
    assert_ok!(client.unregister(0, "ops/admin?x#y").await);
    assert_eq!(transport.last().path, "/registrar/ops%2Fadmin%3Fx%23y");
    assert_ok!(client.get_transaction("a/b").await);
    assert_eq!(transport.last().path, "/transactions/a%2Fb");
}

#[tokio::test]
async fn test_check_registration_is_single_shot() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Err(fail(401, "User alice must log in.")));
    let client = ready_client(dir.path(), transport.clone());

    let err = assert_err!(client.check_registration(1, "alice").await);
    assert_eq!(err.status_code(), 401);
    assert_eq!(transport.count("/registrar/alice"), 1);
    assert_eq!(transport.last().target.port, 7052);

    let err = assert_err!(client.check_registration(7, "alice").await);
    assert!(matches!(err, SdkError::PeerNotFound(7)));
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn load_options(users: Vec<UserConfig>, max_retry: u32) -> LoadOptions {
    LoadOptions {
        network: Some(NetworkConfig {
            peers: Some(peers()),
            users,
            options: Some(options(max_retry)),
        }),
        chaincode: chaincode(),
    }
}

fn users() -> Vec<UserConfig> {
    ["alice", "bob"]
        .iter()
        .map(|id| UserConfig {
            enroll_id: id.to_string(),
            enroll_secret: format!("{id}-secret"),
        })
        .collect()
}

#[tokio::test]
async fn test_load_registers_each_user_against_its_peer() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = client_in(dir.path(), transport.clone());

    let descriptor = assert_ok!(client.load(load_options(users(), 0)).await);
    assert_eq!(descriptor.deployed_name, "mycc");
    assert_eq!(descriptor.query_names, vec!["read"]);

    let peers = client.peers();
    assert_eq!(peers[0].identity.as_deref(), Some("alice"));
    assert_eq!(peers[1].identity.as_deref(), Some("bob"));
    assert_eq!(transport.count("/registrar"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_load_fails_when_any_registration_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|request| {
        if request.target.port == 7052 {
            Err(fail(503, "membership unavailable"))
        } else {
            Ok(json!({"OK": "ok"}))
        }
    });
    let client = client_in(dir.path(), transport);

    let err = assert_err!(client.load(load_options(users(), 0)).await);
    match err {
        SdkError::RegistrationFailed { enroll_id, .. } => assert_eq!(enroll_id, "bob"),
        other => panic!("expected registration failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_load_without_users_skips_registration() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = client_in(dir.path(), transport.clone());

    assert_ok!(client.load(load_options(Vec::new(), 0)).await);
    assert!(transport.requests().is_empty());
    assert!(client.invoke_fn("write").is_some());
}

#[tokio::test]
async fn test_load_requires_peers() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(query_ok);
    let client = client_in(dir.path(), transport.clone());

    let err = assert_err!(
        client
            .load(LoadOptions {
                network: Some(NetworkConfig::default()),
                chaincode: chaincode(),
            })
            .await
    );
    assert_eq!(err.kind(), ErrorKind::InputValidation);
    assert_eq!(err.status_code(), 400);
    assert!(transport.requests().is_empty());
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

fn deploy_ok(_: &TransportRequest) -> Result<Value, TransportFailure> {
    Ok(json!({"jsonrpc": "2.0", "result": {"status": "OK", "message": "abc123"}, "id": 1}))
}

fn no_delay() -> DeployOptions {
    DeployOptions {
        delay: Some(Duration::ZERO),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_deploy_persists_deployed_name() {
    let dir = tempfile::tempdir().unwrap();
    let extra = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(deploy_ok);
    let client = ready_client(dir.path(), transport.clone());

    let options = DeployOptions {
        save_path: Some(extra.path().join("copies")),
        ..no_delay()
    };
    assert_ok!(client.deploy("init", vec!["a".into(), "100".into()], options, None).await);
    assert_eq!(client.descriptor().deployed_name, "abc123");

    let body = transport.last().body.unwrap();
    assert_eq!(body["method"], "deploy");
    assert_eq!(body["params"]["chaincodeID"]["path"], "github.com/example/marbles");
    assert_eq!(body["params"]["ctorMsg"]["args"], json!(["a", "100"]));

    for file in [dir.path().join("abc123.json"), extra.path().join("copies/abc123.json")] {
        let saved: Value = serde_json::from_slice(&std::fs::read(&file).unwrap()).unwrap();
        assert_eq!(saved["details"]["deployedName"], "abc123");
    }

    // Later calls target the new name.
    assert_ok!(client.invoke("write", vec![], None).await);
    assert_eq!(transport.last().body.unwrap()["params"]["chaincodeID"]["name"], "abc123");
}

#[tokio::test(start_paused = true)]
async fn test_deploy_waits_settling_delay() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(deploy_ok);
    let client = ready_client(dir.path(), transport);

    let start = Instant::now();
    assert_ok!(client.deploy("init", vec![], DeployOptions::default(), None).await);
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_deploy_without_name_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Ok(json!({"result": {"status": "OK", "message": ""}})));
    let client = ready_client(dir.path(), transport);

    let err = assert_err!(client.deploy("init", vec![], no_delay(), None).await);
    assert!(matches!(err, SdkError::DeployResponseInvalid { .. }));
    assert_eq!(err.status_code(), 502);
    assert_eq!(client.descriptor().deployed_name, "mycc");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_deploy_rejects_name_that_leaves_state_dir() {
    let root = tempfile::tempdir().unwrap();
    let state = root.path().join("state");
    let transport =
        MockTransport::new(|_| Ok(json!({"result": {"status": "OK", "message": "../escaped"}})));
    let client = ready_client(&state, transport);

    let err = assert_err!(client.deploy("init", vec![], no_delay(), None).await);
    assert!(matches!(err, SdkError::DeployResponseInvalid { .. }));
    assert_eq!(err.status_code(), 502);
    assert!(!root.path().join("escaped.json").exists());
    assert!(!state.exists());
    assert_eq!(client.descriptor().deployed_name, "mycc");
}

#[tokio::test]
async fn test_deploy_transport_failure() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Err(fail(408, "timed out")));
    let client = ready_client(dir.path(), transport.clone());

    let err = assert_err!(client.deploy("init", vec![], no_delay(), None).await);
    assert!(matches!(err, SdkError::DeployFailed { status: 408, .. }));
    assert_eq!(transport.count("/chaincode"), 1);
}

#[tokio::test]
async fn test_saved_descriptor_restores_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(deploy_ok);
    let client = ready_client(dir.path(), transport.clone());
    assert_ok!(client.deploy("init", vec![], no_delay(), None).await);

    let fresh = client_in(dir.path(), transport.clone());
    fresh.network(&peers(), None).unwrap();
    let restored = assert_ok!(fresh.load_saved(&dir.path().join("abc123.json")).await);
    assert_eq!(restored.deployed_name, "abc123");
    assert!(fresh.query_fn("read").is_some());

    assert_ok!(fresh.clear().await);
    assert!(!dir.path().exists());
}

// ---------------------------------------------------------------------------
// Chain observation and the height monitor
// ---------------------------------------------------------------------------

fn chain_at(height: Arc<AtomicU64>) -> impl Fn(&TransportRequest) -> Result<Value, TransportFailure> {
    move |request: &TransportRequest| match request.path.as_str() {
        "/chain" => Ok(json!({
            "height": height.load(Ordering::SeqCst),
            "currentBlockHash": "RrndKwuojRMjOz/rdD7rJD/NUupiuBuCtQwnZG7Vdi/XXcTd2MDyAMsFAZ1ntZL2",
        })),
        "/chaincode" => Ok(json!({"result": {"status": "OK", "message": "tx-1"}})),
        _ => Ok(json!({"stateHash": "abc", "transactions": []})),
    }
}

#[tokio::test]
async fn test_chain_observation_paths() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(chain_at(Arc::new(AtomicU64::new(7))));
    let client = ready_client(dir.path(), transport.clone());

    let stats = assert_ok!(client.chain_stats().await);
    assert_eq!(stats.height, 7);
    assert!(stats.current_block_hash.is_some());

    assert_ok!(client.block_stats(0).await);
    assert_eq!(transport.last().path, "/chain/blocks/0");
    assert_ok!(client.get_transaction("4f8b9e2c").await);
    assert_eq!(transport.last().path, "/transactions/4f8b9e2c");
    assert_eq!(transport.last().method, HttpMethod::Get);
}

#[tokio::test]
async fn test_unparseable_chain_stats_is_malformed_response() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Ok(json!({"height": "tall"})));
    let client = ready_client(dir.path(), transport);

    let err = assert_err!(client.chain_stats().await);
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert_eq!(err.status_code(), 502);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_passes_full_stats_payload() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| {
        Ok(json!({"height": 3, "currentBlockHash": "h", "peerExtra": "keep-me"}))
    });
    let client = ready_client(dir.path(), transport);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handle = client.monitor_blockheight(move |stats| {
        sink.lock().unwrap().push(serde_json::to_value(stats).unwrap())
    });
    tokio::time::sleep(Duration::from_millis(600)).await;
    handle.join().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["peerExtra"], "keep-me");
    assert_eq!(seen[0]["height"], 3);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_fires_once_per_distinct_height() {
    let dir = tempfile::tempdir().unwrap();
    let height = Arc::new(AtomicU64::new(5));
    let transport = MockTransport::new(chain_at(height.clone()));
    let client = ready_client(dir.path(), transport.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handle = client.monitor_blockheight(move |stats| sink.lock().unwrap().push(stats.height));
    assert!(handle.is_running());

    // First tick always polls.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(*seen.lock().unwrap(), vec![5]);

    // Idle: the next poll waits for the slow cadence, and the unchanged
    // height does not fire again.
    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(transport.count("/chain"), 1);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(transport.count("/chain"), 2);
    assert_eq!(*seen.lock().unwrap(), vec![5]);

    height.store(6, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(11_000)).await;
    assert_eq!(*seen.lock().unwrap(), vec![5, 6]);
    assert_eq!(client.last_observed_height(), 6);

    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_monitor_resolves_action_on_new_block() {
    let dir = tempfile::tempdir().unwrap();
    let height = Arc::new(AtomicU64::new(5));
    let transport = MockTransport::new(chain_at(height.clone()));
    let client = ready_client(dir.path(), transport.clone());

    let handle = client.monitor_blockheight(|_| {});
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_ok!(client.invoke("write", vec![], None).await);
    assert_eq!(client.pending_actions(), 1);

    // Fast polls start on the next tick; the block lands a little later.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(transport.count("/chain") > 1);
    height.store(6, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(client.pending_actions(), 0);
    assert_eq!(client.last_observed_height(), 6);

    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_expired_action_stops_fast_polling() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(chain_at(Arc::new(AtomicU64::new(5))));
    let client = ready_client(dir.path(), transport.clone());

    let handle = client.monitor_blockheight(|_| {});
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_ok!(client.invoke("write", vec![], None).await);

    tokio::time::sleep(Duration::from_millis(3_600)).await;
    let after_expiry = transport.count("/chain");
    assert!(after_expiry >= 6, "fresh action should drive fast polls");
    assert_eq!(client.pending_actions(), 0);

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(transport.count("/chain"), after_expiry);

    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_monitor_swallows_poll_failures() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new(|_| Err(fail(500, "connection refused")));
    let client = ready_client(dir.path(), transport.clone());

    let handle = client.monitor_blockheight(|_| panic!("no height was ever reported"));
    tokio::time::sleep(Duration::from_millis(21_000)).await;
    assert!(handle.is_running());
    assert_eq!(transport.count("/chain"), 2);

    handle.stop();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!handle.is_running());
}
