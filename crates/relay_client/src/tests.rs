//! Plugin host behaviour and end-to-end runs against a live relay.

use crate::*;
use command_bus::Envelope;
use relay_server::{create_server_with_options, ServerOptions};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

/// Records which hooks ran, tagged with the plugin name
struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn on_connect(&self, _context: &PluginContext) -> Result<(), PluginError> {
        self.log.lock().unwrap().push(format!("{}:connect", self.name));
        Ok(())
    }

    fn on_command(&self, _context: &PluginContext, command: &Envelope) -> Result<(), PluginError> {
        self.log.lock().unwrap().push(format!("{}:command:{}", self.name, command.kind));
        Ok(())
    }

    fn before_send(&self, envelope: &mut Envelope) -> Result<Disposition, PluginError> {
        self.log.lock().unwrap().push(format!("{}:send:{}", self.name, envelope.kind));
        Ok(Disposition::Send)
    }
}

/// Panics in every hook
struct Exploding;

impl Plugin for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::new("explode", |_, _| panic!("capability exploded"))]
    }

    fn on_connect(&self, _context: &PluginContext) -> Result<(), PluginError> {
        panic!("on_connect exploded")
    }

    fn on_command(&self, _context: &PluginContext, _command: &Envelope) -> Result<(), PluginError> {
        panic!("on_command exploded")
    }

    fn before_send(&self, envelope: &mut Envelope) -> Result<Disposition, PluginError> {
        envelope.payload = json!("tampered");
        panic!("before_send exploded")
    }
}

/// Drops every envelope of one type
struct Muffle(&'static str);

impl Plugin for Muffle {
    fn name(&self) -> &str {
        "muffle"
    }

    fn before_send(&self, envelope: &mut Envelope) -> Result<Disposition, PluginError> {
        if envelope.kind == self.0 {
            Ok(Disposition::Suppress)
        } else {
            Ok(Disposition::Send)
        }
    }
}

fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Recorder {
    Recorder { name, log: log.clone() }
}

#[test]
fn test_hooks_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = Client::default();
    client
        .use_plugin(recorder("a", &log))
        .and_then(|c| c.use_plugin(recorder("b", &log)))
        .expect("add plugins");

    let transport = Arc::new(MemoryTransport::new());
    client.attach_transport(transport).expect("attach");
    client.send("ping", Value::Null).expect("send");
    client.dispatch_inbound(&Envelope::new("pong", Value::Null));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["a:connect", "b:connect", "a:send:ping", "b:send:ping", "a:command:pong", "b:command:pong"]
    );
}

#[test]
fn test_failing_hooks_are_isolated() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = Client::default();
    client
        .use_plugin(Exploding)
        .and_then(|c| c.use_plugin(recorder("after", &log)))
        .expect("add plugins");

    let transport = Arc::new(MemoryTransport::new());
    client.attach_transport(transport.clone()).expect("attach");
    assert_eq!(client.send("log", json!({ "message": "intact" })).expect("send"), Delivery::Sent);
    client.dispatch_inbound(&Envelope::new("custom", Value::Null));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["after:connect", "after:send:log", "after:command:custom"]
    );

    // The panicking before_send hook's rewrite is discarded
    let sent = transport.envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, json!({ "message": "intact" }));
}

#[test]
fn test_panicking_capability_reports_error() {
    let client = Client::default();
    client.use_plugin(Exploding).expect("add plugin");

    let err = client.invoke("explode", Vec::new()).unwrap_err();
    assert_eq!(err, PluginError::Panicked("capability exploded".to_string()));

    // Still usable afterwards
    assert_eq!(client.send("log", Value::Null).expect("send"), Delivery::Queued);
}

#[test]
fn test_unknown_capability() {
    let client = Client::default();
    let err = client.invoke("apiResponse", Vec::new()).unwrap_err();
    assert_eq!(err, PluginError::CapabilityNotFound("apiResponse".to_string()));
}

#[test]
fn test_suppressed_envelopes_never_reach_transport() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = Client::default();
    client
        .use_plugin(Muffle("noise"))
        .and_then(|c| c.use_plugin(recorder("later", &log)))
        .expect("add plugins");
    let transport = Arc::new(MemoryTransport::new());
    client.attach_transport(transport.clone()).expect("attach");

    assert_eq!(client.send("noise", Value::Null).expect("send"), Delivery::Suppressed);
    assert_eq!(client.send("signal", Value::Null).expect("send"), Delivery::Sent);

    let kinds: Vec<String> = transport.envelopes().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec!["signal"]);
    // Hooks after the suppressing one never saw it
    assert!(!log.lock().unwrap().iter().any(|e| e == "later:send:noise"));
}

#[test]
fn test_capabilities_compose_through_context() {
    let client = Client::default();
    client
        .use_plugin(LoggerPlugin)
        .expect("add logger");

    struct Timed;
    impl Plugin for Timed {
        fn name(&self) -> &str {
            "timed"
        }
        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::new("timed", |context, args| {
                context.invoke("log", vec![json!(format!("took {}ms", args[0]))])
            })]
        }
    }
    client.use_plugin(Timed).expect("add timed");

    let transport = Arc::new(MemoryTransport::new());
    client.attach_transport(transport.clone()).expect("attach");
    client.invoke("timed", vec![json!(5)]).expect("invoke");

    let sent = transport.envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, json!({ "level": "debug", "message": "took 5ms" }));
}

#[test]
fn test_queue_flushes_in_order() {
    let client = Client::default();
    for n in 0..5 {
        assert_eq!(client.send("tick", json!(n)).expect("send"), Delivery::Queued);
    }
    assert_eq!(client.pending_len(), 5);
    assert!(!client.is_connected());

    let transport = Arc::new(MemoryTransport::new());
    assert_eq!(client.attach_transport(transport.clone()).expect("attach"), 5);
    assert_eq!(client.pending_len(), 0);

    let payloads: Vec<Value> = transport.envelopes().into_iter().map(|e| e.payload).collect();
    assert_eq!(payloads, (0..5).map(|n| json!(n)).collect::<Vec<_>>());
}

/// Parks `on_connect` until the test lets it continue
struct Gate {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl Plugin for Gate {
    fn name(&self) -> &str {
        "gate"
    }

    fn on_connect(&self, _context: &PluginContext) -> Result<(), PluginError> {
        self.entered.wait();
        self.release.wait();
        Ok(())
    }
}

#[test]
fn test_send_during_attach_stays_behind_queued_frames() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let client = Client::default();
    client
        .use_plugin(Gate { entered: entered.clone(), release: release.clone() })
        .expect("add plugin");
    assert_eq!(client.send("first", Value::Null).expect("send"), Delivery::Queued);

    let transport = Arc::new(MemoryTransport::new());
    let attaching = {
        let client = client.clone();
        let transport = transport.clone();
        std::thread::spawn(move || client.attach_transport(transport))
    };

    entered.wait();
    assert_eq!(client.send("second", Value::Null).expect("send"), Delivery::Queued);
    assert!(!client.is_connected());
    release.wait();

    assert_eq!(attaching.join().expect("attach thread").expect("attach"), 2);
    let kinds: Vec<String> = transport.envelopes().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec!["first", "second"]);
    assert_eq!(client.send("third", Value::Null).expect("send"), Delivery::Sent);
}

/// Logs through a capability from `on_connect`
struct Greeter;

impl Plugin for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    fn on_connect(&self, context: &PluginContext) -> Result<(), PluginError> {
        context.invoke("log", vec![json!("hello")])
    }
}

#[test]
fn test_capabilities_invoked_from_on_connect_go_first() {
    let client = Client::default();
    client
        .use_plugin(LoggerPlugin)
        .and_then(|c| c.use_plugin(Greeter))
        .expect("add plugins");
    client.send("queued", Value::Null).expect("send");

    let transport = Arc::new(MemoryTransport::new());
    assert_eq!(client.attach_transport(transport.clone()).expect("attach"), 1);

    let kinds: Vec<String> = transport.envelopes().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec!["log", "queued"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_closed_transport_rejects_sends() {
    let client = Client::default();
    let transport = Arc::new(MemoryTransport::new());
    client.attach_transport(transport.clone()).expect("attach");

    transport.close().await;
    assert!(matches!(client.send("late", Value::Null), Err(ClientError::Closed)));

    client.disconnect().await;
    assert!(!client.is_connected());
    assert_eq!(client.send("later", Value::Null).expect("send"), Delivery::Queued);
}

/// Counts inbound commands of one type
struct Listener {
    kind: &'static str,
    seen: Arc<AtomicUsize>,
}

impl Plugin for Listener {
    fn name(&self) -> &str {
        "listener"
    }

    fn on_command(&self, _context: &PluginContext, command: &Envelope) -> Result<(), PluginError> {
        if command.kind == self.kind {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_to_end_with_relay() {
    let commands = Arc::new(Mutex::new(Vec::new()));
    let sink = commands.clone();
    let server = create_server_with_options(
        ServerOptions::new()
            .host("127.0.0.1")
            .port(0u16)
            .on_command(move |command| sink.lock().unwrap().push(command.clone())),
    )
    .expect("valid config");
    let addr = server.start().await.expect("start");

    let seen = Arc::new(AtomicUsize::new(0));
    let client = Client::new(ClientOptions::new("React Native Demo").with_version("1.0.0"));
    client
        .use_plugin(ClientIntroPlugin)
        .and_then(|c| c.use_plugin(ApiResponsePlugin))
        .and_then(|c| c.use_plugin(Listener { kind: "state.values.request", seen: seen.clone() }))
        .expect("add plugins");

    client.send("log", json!({ "level": "debug", "message": "queued" })).expect("send");
    client.connect(&format!("ws://{addr}")).await.expect("connect");
    client
        .api_response(json!({ "a": 1 }), json!({ "b": 2 }), 12)
        .expect("apiResponse");

    assert!(eventually(|| commands.lock().unwrap().len() == 3).await);
    {
        let commands = commands.lock().unwrap();
        let kinds: Vec<&str> = commands.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["client.intro", "log", "api.response"]);
        let ids: Vec<u64> = commands.iter().map(|c| c.message_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(commands[2].payload["duration"], 12);
    }

    let connections = server.connections().await;
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].name.as_deref(), Some("React Native Demo"));
    assert_eq!(connections[0].version.as_deref(), Some("1.0.0"));

    assert_eq!(server.send("state.values.request", json!({ "path": "user" })).await, 1);
    assert!(eventually(|| seen.load(Ordering::SeqCst) == 1).await);

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_flushes_written_frames() {
    let server = create_server_with_options(ServerOptions::new().host("127.0.0.1").port(0u16)).expect("valid config");
    let addr = server.start().await.expect("start");

    let client = Client::new(ClientOptions::new("flush"));
    client.connect(&format!("ws://{addr}")).await.expect("connect");
    for n in 0..50 {
        client.send("tick", json!({ "n": n })).expect("send");
    }
    client.disconnect().await;

    assert!(eventually(|| server.history().len() == 50).await);
    let last = server.history().last().map(|c| c.payload["n"].clone());
    assert_eq!(last, Some(json!(49)));

    server.stop().await;
}
