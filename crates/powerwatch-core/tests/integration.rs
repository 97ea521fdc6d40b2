//! Integration tests driving the monitor against an in-process controller
//! simulator: a real WebSocket server that scripts telemetry frames and
//! records the commands it receives.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use powerwatch_core::{
    Error, Monitor, MonitorConfig, MonitorEvent, NewRoom, ReconnectOptions, UnknownRoomPolicy,
};

const TICK: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    (listener, endpoint)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    timeout(WAIT, accept_async(stream)).await.unwrap().unwrap()
}

fn test_config(endpoint: &str) -> MonitorConfig {
    MonitorConfig::new(endpoint).reconnect(ReconnectOptions::fixed_delay(Duration::from_millis(50)))
}

/// Poll until the predicate holds, failing the test once WAIT elapses.
async fn wait_for(what: &str, mut predicate: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !predicate() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(TICK).await;
    }
}

/// Read the next text frame from the simulator side of the link.
async fn next_text(socket: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let message = timeout(WAIT, socket.next())
            .await
            .expect("no frame within the wait limit")
            .expect("connection closed")
            .expect("transport error");
        if let Message::Text(text) = message {
            return text;
        }
    }
}

#[tokio::test]
async fn telemetry_flows_into_registry_and_window() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut device = accept(&listener).await;

    device
        .send(Message::Text(
            r#"[
                {"id":"1","display_power":2600.0,"isCutoff":true,"bypassDetected":false},
                {"id":"2","display_power":450.0,"isCutoff":false,"bypassDetected":false}
            ]"#
            .to_string(),
        ))
        .await
        .unwrap();

    wait_for("two rooms registered", || monitor.rooms().len() == 2).await;

    let room = monitor.room("1").unwrap();
    assert!(room.cutoff_active);
    assert!(!room.bypass_detected);

    let series = monitor.series("1");
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].power, 2600.0);

    assert!(monitor.is_connected());
    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_rooms_ignored_under_explicit_policy() {
    let (listener, endpoint) = bind().await;
    let config = test_config(&endpoint).unknown_rooms(UnknownRoomPolicy::Ignore);
    let monitor = Monitor::start(config).unwrap();
    let mut device = accept(&listener).await;

    device
        .send(Message::Text(
            r#"[{"id":"9","power":100.0,"cutoff":false,"bypass":false}]"#.to_string(),
        ))
        .await
        .unwrap();

    wait_for("frame counted", || monitor.stats().frames_received >= 1).await;
    assert!(monitor.rooms().is_empty());

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn device_notice_surfaces_as_event() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut events = monitor.subscribe();
    let mut device = accept(&listener).await;

    device
        .send(Message::Text(
            r#"{"status":"error","message":"unknown room"}"#.to_string(),
        ))
        .await
        .unwrap();

    let notice = loop {
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        if let MonitorEvent::Notice { notice } = event {
            break notice;
        }
    };
    assert_eq!(notice.message, "unknown room");
    assert!(monitor.rooms().is_empty(), "notices never mutate room state");

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut device = accept(&listener).await;

    device
        .send(Message::Text("not even json".to_string()))
        .await
        .unwrap();
    device
        .send(Message::Text(
            r#"[{"id":"1","power":500.0,"cutoff":false,"bypass":false}]"#.to_string(),
        ))
        .await
        .unwrap();

    // The bad frame was dropped; the good one on the same connection landed.
    wait_for("good frame applied", || monitor.rooms().len() == 1).await;
    assert_eq!(monitor.stats().protocol_errors, 1);
    assert!(monitor.is_connected());

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn reconnects_after_drop_preserving_state() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();

    let mut device = accept(&listener).await;
    device
        .send(Message::Text(
            r#"[
                {"id":"1","power":1000.0,"cutoff":false,"bypass":false},
                {"id":"2","power":2000.0,"cutoff":false,"bypass":false}
            ]"#
            .to_string(),
        ))
        .await
        .unwrap();
    wait_for("initial rooms", || monitor.rooms().len() == 2).await;

    // Kill the connection from the device side.
    drop(device);
    wait_for("link observed down", || !monitor.is_connected()).await;

    // The client must come back within the (shortened) backoff.
    let mut device = accept(&listener).await;
    wait_for("link back up", || monitor.is_connected()).await;

    // Prior state survived the reconnect: same two rooms, no duplicates,
    // series intact (the default 60 s window has not elapsed).
    assert_eq!(monitor.rooms().len(), 2);
    assert_eq!(monitor.series("1").len(), 1);
    assert_eq!(monitor.series("2").len(), 1);

    device
        .send(Message::Text(
            r#"[{"id":"1","power":1100.0,"cutoff":false,"bypass":false}]"#.to_string(),
        ))
        .await
        .unwrap();
    wait_for("post-reconnect sample", || monitor.series("1").len() == 2).await;

    assert_eq!(monitor.rooms().len(), 2);
    assert_eq!(monitor.stats().connections_established, 2);

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejected_threshold_never_reaches_the_wire() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut device = accept(&listener).await;

    device
        .send(Message::Text(
            r#"[{"id":"1","power":500.0,"cutoff":false,"bypass":false}]"#.to_string(),
        ))
        .await
        .unwrap();
    wait_for("room seeded", || monitor.room("1").is_some()).await;

    // 50 W is below the 100 W minimum: rejected locally.
    let err = monitor.update_threshold("1", 50.0).unwrap_err();
    assert!(matches!(err, Error::ThresholdOutOfRange { .. }));

    // A valid update afterwards must be the first (and only) frame the
    // device sees.
    monitor.update_threshold("1", 1800.0).unwrap();
    let text = next_text(&mut device).await;
    let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(frame["action"], "update");
    assert_eq!(frame["room_id"], "1");
    assert_eq!(frame["threshold"], 1800.0);
    assert_eq!(monitor.stats().commands_sent, 1);

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn reset_command_is_sent_verbatim() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut device = accept(&listener).await;

    device
        .send(Message::Text(
            r#"[{"id":"2","power":3200.0,"cutoff":true,"bypass":false}]"#.to_string(),
        ))
        .await
        .unwrap();
    wait_for("room seeded", || monitor.room("2").is_some()).await;

    monitor.reset("2").unwrap();

    let frame: serde_json::Value = serde_json::from_str(&next_text(&mut device).await).unwrap();
    assert_eq!(frame["action"], "reconnect");
    assert_eq!(frame["room_id"], "2");

    // No local effect: cutoff stays until fresh telemetry clears it.
    assert!(monitor.room("2").unwrap().cutoff_active);

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn add_room_echo_round_trip_yields_exactly_one_room() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut device = accept(&listener).await;

    monitor
        .add_room(NewRoom {
            id: "4".to_string(),
            name: "Garage".to_string(),
            threshold: 3000.0,
            measurement_pin: 29,
            cutoff_pin: 30,
        })
        .unwrap();

    // The device received the provisioning command...
    let frame: serde_json::Value = serde_json::from_str(&next_text(&mut device).await).unwrap();
    assert_eq!(frame["action"], "add");
    assert_eq!(frame["room_id"], "4");
    assert_eq!(frame["name"], "Garage");

    // ...and echoes telemetry for the same id.
    device
        .send(Message::Text(
            r#"[{"id":"4","power":120.0,"cutoff":false,"bypass":false}]"#.to_string(),
        ))
        .await
        .unwrap();
    wait_for("echo applied", || !monitor.series("4").is_empty()).await;

    // Exactly one room, with the operator-set fields intact.
    assert_eq!(monitor.rooms().len(), 1);
    let room = monitor.room("4").unwrap();
    assert_eq!(room.name, "Garage");
    assert_eq!(room.threshold, 3000.0);
    assert_eq!(room.measurement_pin, Some(29));

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn commands_are_dropped_while_disconnected() {
    // Bind and immediately drop the listener so connects are refused.
    let (listener, endpoint) = bind().await;
    drop(listener);

    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    wait_for("at least one failed attempt", || {
        monitor.stats().reconnect_attempts >= 1
    })
    .await;

    let err = monitor
        .add_room(NewRoom {
            id: "1".to_string(),
            name: "Living Room".to_string(),
            threshold: 2500.0,
            measurement_pin: 25,
            cutoff_pin: 26,
        })
        .unwrap_err();
    assert!(matches!(err, Error::NotConnected));
    assert!(monitor.rooms().is_empty(), "no optimistic insert on a dropped command");

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_closes_the_connection() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut device = accept(&listener).await;

    monitor.shutdown().await.unwrap();

    // The simulator observes an orderly close (or end of stream), not a hang.
    let observed_close = timeout(WAIT, async {
        loop {
            match device.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(observed_close.is_ok(), "connection was left half-open");
}

#[tokio::test]
async fn connected_and_disconnected_events_fire() {
    let (listener, endpoint) = bind().await;
    let monitor = Monitor::start(test_config(&endpoint)).unwrap();
    let mut events = monitor.subscribe();

    let device = accept(&listener).await;
    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(event, MonitorEvent::Connected { .. }));

    drop(device);
    let event = loop {
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        if !matches!(event, MonitorEvent::Connected { .. }) {
            break event;
        }
    };
    assert!(matches!(event, MonitorEvent::Disconnected { .. }));

    monitor.shutdown().await.unwrap();
}
