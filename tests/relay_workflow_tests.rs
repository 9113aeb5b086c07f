use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use racing_relay::{liveness::sweep_stale, serve_socket};

mod utils;

use utils::*;

fn wheel_registration(device_id: &str) -> serde_json::Value {
    json!({
        "type": "device_registration",
        "deviceId": device_id,
        "deviceType": "esp32_wheel",
        "capabilities": ["steering", "button"],
        "version": "1.0.0"
    })
}

#[tokio::test]
async fn test_client_registration_lists_connected_devices() {
    let relay = TestRelay::new();
    let _wheel = relay.device("wheel-1").await;
    let mut phone = relay.connect().await;
    phone.drain();

    relay
        .send(
            &phone,
            json!({
                "type": "client_registration",
                "clientId": "phone-1",
                "clientType": "android_app",
                "playerName": "Alice"
            }),
        )
        .await;

    let reply = FrameAssertion::for_peer(&mut phone).received_once("registration_success");
    assert_eq!(reply["clientId"], "phone-1");
    assert_eq!(reply["availableDevices"], json!(["wheel-1"]));
}

#[tokio::test]
async fn test_new_connection_is_greeted_with_its_id() {
    let relay = TestRelay::new();
    let mut peer = relay.connect().await;

    let welcome = FrameAssertion::for_peer(&mut peer).received_once("connection_established");
    assert_eq!(welcome["clientId"], peer.id.as_str());
    assert!(welcome["timestamp"].is_i64());
}

#[tokio::test]
async fn test_device_registration_notifies_every_client_and_no_device() {
    let relay = TestRelay::new();
    let mut phone_1 = relay.client("phone-1").await;
    let mut phone_2 = relay.client("phone-2").await;
    let mut other_wheel = relay.device("wheel-0").await;
    phone_1.drain();
    phone_2.drain();

    let mut wheel = relay.connect().await;
    wheel.drain();
    relay.send(&wheel, wheel_registration("wheel-1")).await;

    for phone in [&mut phone_1, &mut phone_2] {
        let announced = FrameAssertion::for_peer(phone).received_once("device_connected");
        assert_eq!(
            announced["device"],
            json!({
                "deviceId": "wheel-1",
                "deviceType": "esp32_wheel",
                "capabilities": ["steering", "button"]
            })
        );
    }
    FrameAssertion::for_peer(&mut other_wheel).received_nothing();

    let reply = FrameAssertion::for_peer(&mut wheel);
    reply.received_none("device_connected");
    assert_eq!(reply.received_once("registration_success")["deviceId"], "wheel-1");
}

#[tokio::test]
async fn test_create_room_without_id_generates_one() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;

    relay.create_room(&phone, None).await;

    let created = FrameAssertion::for_peer(&mut phone).received_once("room_created");
    let room_id = created["roomId"].as_str().unwrap();
    assert!(room_id.starts_with("room_"));
    assert_eq!(created["room"]["roomId"], room_id);
    assert_eq!(created["room"]["createdBy"], "phone-1");
    assert_eq!(created["room"]["players"], json!(["phone-1"]));
    assert_eq!(created["room"]["devices"], json!([]));
    assert_eq!(created["room"]["status"], "waiting");
}

#[tokio::test]
async fn test_control_data_reaches_room_clients_only() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;
    let mut bystander = relay.client("phone-2").await;
    let mut wheel = relay.device("wheel-1").await;
    relay.create_room(&phone, Some("track-1")).await;
    relay.join_room(&wheel, "track-1").await;
    phone.drain();
    bystander.drain();
    wheel.drain();

    relay.steer(&wheel, 512, 0.5, false).await;

    let update = FrameAssertion::for_peer(&mut phone).received_once("control_update");
    assert_eq!(update["deviceId"], "wheel-1");
    assert_eq!(update["steering"], 512);
    assert_eq!(update["normalizedSteering"], 0.5);
    assert_eq!(update["button"], false);
    FrameAssertion::for_peer(&mut bystander).received_nothing();
    FrameAssertion::for_peer(&mut wheel).received_nothing();
}

#[tokio::test]
async fn test_game_command_reaches_room_devices() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;
    let mut wheel = relay.device("wheel-1").await;
    let mut idle_wheel = relay.device("wheel-2").await;
    relay.create_room(&phone, Some("track-1")).await;
    relay.join_room(&wheel, "track-1").await;
    phone.drain();
    wheel.drain();

    relay
        .send(
            &phone,
            json!({"type": "game_command", "command": "vibrate", "data": {"ms": 200}}),
        )
        .await;

    let feedback = FrameAssertion::for_peer(&mut wheel).received_once("game_feedback");
    assert_eq!(feedback["command"], "vibrate");
    assert_eq!(feedback["data"], json!({"ms": 200}));
    FrameAssertion::for_peer(&mut idle_wheel).received_none("game_feedback");
    FrameAssertion::for_peer(&mut phone).received_nothing();
}

#[tokio::test]
async fn test_device_disconnect_cleans_rooms_and_notifies_once() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;
    let mut other_phone = relay.client("phone-2").await;
    let wheel = relay.device("wheel-1").await;
    relay.create_room(&phone, Some("track-1")).await;
    relay.join_room(&wheel, "track-1").await;
    phone.drain();
    other_phone.drain();

    relay.disconnect(&wheel).await;
    // A second close for the same connection is a no-op
    relay.disconnect(&wheel).await;

    for peer in [&mut phone, &mut other_phone] {
        let gone = FrameAssertion::for_peer(peer).received_once("device_disconnected");
        assert_eq!(gone["deviceId"], "wheel-1");
    }

    let hub = relay.hub.lock().await;
    assert!(hub.registry().lookup_by_device_id("wheel-1").is_none());
    assert!(hub.rooms().get("track-1").unwrap().devices.is_empty());
}

#[tokio::test]
async fn test_last_member_leaving_deletes_room() {
    let relay = TestRelay::new();
    let phone = relay.client("phone-1").await;
    let wheel = relay.device("wheel-1").await;
    relay.create_room(&phone, Some("track-1")).await;
    relay.join_room(&wheel, "track-1").await;

    relay.disconnect(&phone).await;
    assert!(relay.hub.lock().await.rooms().get("track-1").is_some());

    relay.disconnect(&wheel).await;
    assert!(relay.hub.lock().await.rooms().is_empty());
}

#[tokio::test]
async fn test_silent_connection_is_evicted_with_full_cleanup() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;
    let wheel = relay.device("wheel-1").await;
    relay.create_room(&phone, Some("track-1")).await;
    relay.join_room(&wheel, "track-1").await;
    phone.drain();

    let later = chrono::Utc::now() + chrono::Duration::seconds(61);
    {
        let mut hub = relay.hub.lock().await;
        // The phone answered a ping just now; the wheel stayed quiet
        hub.route_frame(&phone.id, &json!({"type": "pong"}).to_string(), later);
        let report = sweep_stale(&mut hub, later, Duration::from_secs(60));
        assert_eq!(report.evicted, vec![wheel.id.clone()]);
        hub.dispatch(report.deliveries);
        assert!(hub.rooms().get("track-1").unwrap().devices.is_empty());
    }

    let gone = FrameAssertion::for_peer(&mut phone).received_once("device_disconnected");
    assert_eq!(gone["deviceId"], "wheel-1");
}

#[tokio::test]
async fn test_control_data_from_client_is_rejected() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;
    let mut other_phone = relay.client("phone-2").await;
    let wheel = relay.device("wheel-1").await;
    relay.create_room(&phone, Some("track-1")).await;
    relay.join_room(&other_phone, "track-1").await;
    relay.join_room(&wheel, "track-1").await;
    phone.drain();
    other_phone.drain();

    relay.steer(&phone, 512, 0.5, false).await;

    FrameAssertion::for_peer(&mut phone).received_error("Only devices can send control data");
    FrameAssertion::for_peer(&mut other_phone).received_nothing();
}

#[tokio::test]
async fn test_joining_unknown_room_changes_nothing() {
    let relay = TestRelay::new();
    let phone = relay.client("phone-1").await;
    let mut wheel = relay.device("wheel-1").await;
    relay.create_room(&phone, Some("track-1")).await;
    let before = relay.hub.lock().await.rooms().get("track-1").cloned();

    relay.join_room(&wheel, "track-9").await;

    FrameAssertion::for_peer(&mut wheel).received_error("Room not found");
    let hub = relay.hub.lock().await;
    assert_eq!(hub.rooms().len(), 1);
    assert_eq!(hub.rooms().get("track-1").cloned(), before);
}

#[tokio::test]
async fn test_invalid_frames_get_errors_and_keep_connection() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;

    relay.send_raw(&phone, "{not json").await;
    let reply = FrameAssertion::for_peer(&mut phone);
    assert!(reply.received_once("error")["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid message"));

    relay.send(&phone, json!({"type": "teleport"})).await;
    FrameAssertion::for_peer(&mut phone).received_error("Unknown message type");

    relay.create_room(&phone, Some("track-1")).await;
    FrameAssertion::for_peer(&mut phone).received_once("room_created");
}

#[tokio::test]
async fn test_unregistered_connection_cannot_route() {
    let relay = TestRelay::new();
    let mut stranger = relay.connect().await;
    stranger.drain();

    relay.create_room(&stranger, Some("track-1")).await;

    FrameAssertion::for_peer(&mut stranger).received_once("error");
    assert!(relay.hub.lock().await.rooms().is_empty());
}

#[tokio::test]
async fn test_socket_session_routes_frames_and_cleans_up_on_close() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;
    let (socket, mut wheel) = MockSocket::new();

    let session = tokio::spawn(serve_socket(Box::new(socket), relay.hub.clone()));
    wheel.send(wheel_registration("wheel-1"));
    sleep(Duration::from_millis(50)).await;

    let sent = wheel.sent_frames().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["type"], "connection_established");
    assert_eq!(sent[1]["type"], "registration_success");
    assert_eq!(sent[1]["deviceId"], "wheel-1");
    FrameAssertion::for_peer(&mut phone).received_once("device_connected");

    wheel.hang_up();
    let connection_id = timeout(Duration::from_secs(1), session)
        .await
        .unwrap()
        .unwrap();

    assert!(wheel.was_closed().await);
    {
        let hub = relay.hub.lock().await;
        assert!(hub.registry().get(&connection_id).is_none());
        assert!(hub.registry().lookup_by_device_id("wheel-1").is_none());
    }
    FrameAssertion::for_peer(&mut phone).received_once("device_disconnected");
}

#[tokio::test]
async fn test_reregistering_device_replaces_old_session() {
    let relay = TestRelay::new();
    let mut phone = relay.client("phone-1").await;
    let (socket, old_wheel) = MockSocket::new();

    let session = tokio::spawn(serve_socket(Box::new(socket), relay.hub.clone()));
    old_wheel.send(wheel_registration("wheel-1"));
    sleep(Duration::from_millis(50)).await;
    phone.drain();

    // The wheel reboots and reconnects before its old socket times out
    let new_wheel = relay.device("wheel-1").await;

    // The replaced session ends on its own without a disconnect broadcast
    timeout(Duration::from_secs(1), session)
        .await
        .unwrap()
        .unwrap();
    assert!(old_wheel.was_closed().await);

    let hub = relay.hub.lock().await;
    assert_eq!(
        hub.registry().lookup_by_device_id("wheel-1").unwrap().id,
        new_wheel.id
    );
    drop(hub);

    let frames = FrameAssertion::for_peer(&mut phone);
    frames.received_none("device_disconnected");
    frames.received_once("device_connected");
}
