mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use futures::{AsyncReadExt, AsyncWriteExt};
use libp2p::{Multiaddr, PeerId};
use meshlink_mesh::{DEFAULT_TEXT_PROTOCOL, MeshConfig, MeshError, Response};
use meshlink_net_api::{Overlay, OverlayError};
use meshlink_test_utils::{MockOverlay, eventually, local_addr};
use serde_json::{Value, json};

use common::{harness, harness_with};

fn to_json(response: Response) -> Value {
    serde_json::to_value(response).unwrap()
}

fn error_of(response: Response) -> String {
    assert!(!response.success, "expected failure, got {response:?}");
    assert!(response.data.is_none() && response.address.is_none());
    response.error.unwrap()
}

#[tokio::test]
async fn test_unknown_command_type() {
    let h = harness();
    let response = h
        .node
        .handle_request(r#"{"type":"frobnicate","payload":null}"#)
        .await;
    assert_eq!(
        to_json(response),
        json!({"success": false, "error": "Unknown message type"})
    );
}

#[tokio::test]
async fn test_malformed_request() {
    let h = harness();
    let response = h.node.handle_request("{not json").await;
    assert_eq!(error_of(response), "Invalid message format");

    // The node keeps serving after a bad request.
    let response = h.node.handle_request(r#"{"type":"get_network_stats"}"#).await;
    assert!(response.success);
}

#[tokio::test]
async fn test_payload_type_mismatch() {
    let h = harness();
    let response = h
        .node
        .handle_request(r#"{"type":"connect","payload":{"addr":"x"}}"#)
        .await;
    assert_eq!(error_of(response), "Invalid peer address: expected string");
}

#[tokio::test]
async fn test_join_topic_is_idempotent() {
    let h = harness();
    let request = r#"{"type":"join_topic","payload":"x"}"#;

    assert_eq!(to_json(h.node.handle_request(request).await), json!({"success": true}));
    assert_eq!(to_json(h.node.handle_request(request).await), json!({"success": true}));

    assert_eq!(h.overlay.join_count("x"), 1);
    assert_eq!(h.overlay.subscription_count("x"), 1);
    assert_eq!(h.node.topics().await, vec!["x".to_string()]);
    assert!(h.node.is_pumping("x").await);
}

#[tokio::test]
async fn test_publish_requires_join() {
    let h = harness();
    let response = h
        .node
        .handle_request(r#"{"type":"publish_to_topic","payload":{"topic":"x","data":"hi"}}"#)
        .await;
    assert_eq!(
        to_json(response),
        json!({"success": false, "error": "not subscribed to topic: x"})
    );
    assert!(h.overlay.published().is_empty());
}

#[tokio::test]
async fn test_publish_after_join() {
    let h = harness();
    h.node.join_topic("x").await.unwrap();

    let response = h
        .node
        .handle_request(r#"{"type":"publish_to_topic","payload":{"topic":"x","data":"hi"}}"#)
        .await;
    assert!(response.success);
    assert_eq!(h.overlay.published(), vec![("x".to_string(), b"hi".to_vec())]);
}

#[tokio::test]
async fn test_own_messages_are_not_observed() {
    let h = harness();
    let remote = PeerId::random();
    h.node.join_topic("x").await.unwrap();

    // Looped back by the overlay with the local peer as origin.
    h.node.publish_to_topic("x", b"mine".to_vec()).await.unwrap();
    h.node.publish_to_topic("x", b"mine again".to_vec()).await.unwrap();
    assert_eq!(h.overlay.inject_topic_message("x", remote, b"theirs"), 1);

    let seen = h.observer.wait_for_topic(1).await;
    assert_eq!(seen, vec![("x".to_string(), remote, b"theirs".to_vec())]);
}

#[tokio::test]
async fn test_pump_survives_lag_and_stops_on_close() {
    let h = harness();
    let remote = PeerId::random();
    h.node.join_topic("x").await.unwrap();

    h.overlay.inject_lag("x", 3);
    h.overlay.inject_topic_message("x", remote, b"after lag");
    let seen = h.observer.wait_for_topic(1).await;
    assert_eq!(seen.len(), 1);
    assert!(h.node.is_pumping("x").await);

    h.overlay.close_subscriptions("x");
    let mut stopped = false;
    for _ in 0..500 {
        if !h.node.is_pumping("x").await {
            stopped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stopped);
    // The topic stays registered; publishing still works.
    assert!(h.node.publish_to_topic("x", b"still here".to_vec()).await.is_ok());
}

#[tokio::test]
async fn test_join_failures_are_wrapped() {
    let h = harness();
    h.overlay.fail_join("boom");
    assert_eq!(
        error_of(h.node.handle_request(r#"{"type":"join_topic","payload":"x"}"#).await),
        "failed to join topic: boom"
    );

    let h = harness();
    h.overlay.fail_subscribe("no slots");
    assert_eq!(
        error_of(h.node.handle_request(r#"{"type":"join_topic","payload":"y"}"#).await),
        "failed to subscribe to topic: no slots"
    );
    // A failed join leaves nothing behind.
    assert!(h.node.topics().await.is_empty());
    assert_matches!(
        h.node.publish_to_topic("y", Vec::new()).await,
        Err(MeshError::NotSubscribed(topic)) if topic == "y"
    );
}

#[tokio::test]
async fn test_publish_failure_is_verbatim() {
    let h = harness();
    h.node.join_topic("x").await.unwrap();
    h.overlay.fail_publish("gossip down");
    assert_eq!(
        error_of(
            h.node
                .handle_request(r#"{"type":"publish_to_topic","payload":{"topic":"x","data":"d"}}"#)
                .await
        ),
        "gossip down"
    );
}

#[tokio::test]
async fn test_network_stats_without_peers() {
    let h = harness();
    let response = h.node.handle_request(r#"{"type":"get_network_stats"}"#).await;
    assert_eq!(
        to_json(response),
        json!({"success": true, "data": {"connected_peers": 0, "bandwidth": 0, "peer_list": []}})
    );

    let response = h.node.handle_request(r#"{"type":"get_peers"}"#).await;
    assert_eq!(to_json(response), json!({"success": true, "data": []}));
}

#[tokio::test]
async fn test_peer_directory_view() {
    let h = harness();
    let a = PeerId::random();
    let b = PeerId::random();
    h.overlay.add_connected_peer(a, vec![local_addr(1)]);
    h.overlay.add_connected_peer(b, Vec::new());
    h.overlay.set_protocols(a, vec!["/ipfs/ping/1.0.0".to_string()]);
    h.overlay.set_latency(a, Duration::from_millis(2));
    h.overlay.set_latency(b, Duration::ZERO);

    let response = h.node.handle_request(r#"{"type":"get_peers"}"#).await;
    assert_eq!(
        to_json(response),
        json!({"success": true, "data": [
            {
                "id": a.to_string(),
                "addresses": ["/ip4/127.0.0.1/tcp/1"],
                "protocols": ["/ipfs/ping/1.0.0"],
                "latency": "2ms",
            },
            {
                "id": b.to_string(),
                "addresses": [],
                "protocols": [],
            },
        ]})
    );

    let stats = h.node.get_network_stats();
    assert_eq!(stats.connected_peers, 2);
    assert_eq!(stats.bandwidth, 0);
    assert_eq!(stats.peer_list, vec![a.to_string(), b.to_string()]);
}

#[tokio::test]
async fn test_get_address() {
    let h = harness();
    let id = h.overlay.local_peer_id().to_string();
    let response = h.node.handle_request(r#"{"type":"get_address"}"#).await;
    let expected = format!("/ip4/127.0.0.1/tcp/4001/p2p/{id}");
    assert_eq!(
        to_json(response),
        json!({"success": true, "address": expected, "data": {"peer_id": id, "addresses": [expected]}})
    );

    let h = harness_with(
        MockOverlay::new().with_listen_addrs(Vec::new()),
        MeshConfig::default(),
    );
    assert_eq!(
        error_of(h.node.handle_request(r#"{"type":"get_address"}"#).await),
        "no listen addresses"
    );
}

#[tokio::test]
async fn test_connect_rejects_invalid_address() {
    let h = harness();
    let error = error_of(
        h.node
            .handle_request(r#"{"type":"connect","payload":"not-a-valid-multiaddress"}"#)
            .await,
    );
    assert!(error.starts_with("invalid peer address: "), "{error}");
    assert!(h.overlay.dials().is_empty());
    assert!(h.node.get_peers().is_empty());

    let error = error_of(
        h.node
            .handle_request(r#"{"type":"connect","payload":"/ip4/127.0.0.1/tcp/4001"}"#)
            .await,
    );
    assert!(error.starts_with("invalid peer info: "), "{error}");
    assert!(h.overlay.dials().is_empty());
}

#[tokio::test]
async fn test_connect() {
    let h = harness();
    let peer = PeerId::random();
    let request = json!({"type": "connect", "payload": format!("/ip4/10.0.0.2/tcp/4001/p2p/{peer}")});

    let response = h.node.handle_request(&request.to_string()).await;
    assert!(response.success);
    let dials = h.overlay.dials();
    assert_eq!(dials.len(), 1);
    assert_eq!(dials[0].peer_id, peer);
    assert_eq!(dials[0].addrs, vec!["/ip4/10.0.0.2/tcp/4001".parse::<Multiaddr>().unwrap()]);
    assert_eq!(h.node.get_network_stats().peer_list, vec![peer.to_string()]);

    h.overlay.fail_connect("connection refused");
    let response = h.node.handle_request(&request.to_string()).await;
    assert_eq!(error_of(response), "connection failed: connection refused");
}

#[tokio::test]
async fn test_disconnect_peer() {
    let h = harness();
    let peer = PeerId::random();
    h.overlay.add_connected_peer(peer, vec![local_addr(1)]);

    let error = error_of(
        h.node
            .handle_request(r#"{"type":"disconnect_peer","payload":"garbage"}"#)
            .await,
    );
    assert!(error.starts_with("invalid peer ID: "), "{error}");
    assert_eq!(h.node.get_network_stats().connected_peers, 1);

    let request = json!({"type": "disconnect_peer", "payload": peer.to_string()}).to_string();
    assert!(h.node.handle_request(&request).await.success);
    assert_eq!(h.node.get_network_stats().connected_peers, 0);

    h.overlay.fail_close();
    assert_eq!(
        error_of(h.node.handle_request(&request).await),
        OverlayError::Shutdown.to_string()
    );
}

#[tokio::test]
async fn test_broadcast_skips_unreachable_peers() {
    let h = harness();
    let a = PeerId::random();
    let b = PeerId::random();
    h.overlay.add_connected_peer(a, Vec::new());
    h.overlay.add_connected_peer(b, Vec::new());
    h.overlay.refuse_streams(a);

    let response = h
        .node
        .handle_request(r#"{"type":"broadcast","payload":"hello"}"#)
        .await;
    assert_eq!(to_json(response), json!({"success": true}));

    let overlay = h.overlay.clone();
    let lines = eventually(Duration::from_secs(5), || {
        let lines = overlay.received_lines(&b);
        (!lines.is_empty()).then_some(lines)
    })
    .await;
    assert_eq!(lines, Some(vec!["hello".to_string()]));
    assert!(h.overlay.received_lines(&a).is_empty());

    let report = h.node.broadcast("again").await;
    assert_eq!(report.delivered, vec![b]);
    assert_eq!(report.skipped, vec![a]);
}

#[tokio::test]
async fn test_broadcast_without_peers() {
    let h = harness();
    let report = h.node.broadcast("nobody").await;
    assert!(report.delivered.is_empty() && report.skipped.is_empty());
}

#[tokio::test]
async fn test_broadcast_is_not_held_up_by_a_stalled_peer() {
    let h = harness_with(
        MockOverlay::new(),
        MeshConfig {
            command_timeout: Some(Duration::from_millis(200)),
            peer_send_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let a = PeerId::random();
    let b = PeerId::random();
    h.overlay.add_connected_peer(a, Vec::new());
    h.overlay.add_connected_peer(b, Vec::new());
    h.overlay.stall_streams(a);

    let response = h
        .node
        .handle_request(r#"{"type":"broadcast","payload":"hello"}"#)
        .await;
    assert_eq!(to_json(response), json!({"success": true}));

    let overlay = h.overlay.clone();
    let lines = eventually(Duration::from_secs(5), || {
        let lines = overlay.received_lines(&b);
        (!lines.is_empty()).then_some(lines)
    })
    .await;
    assert_eq!(lines, Some(vec!["hello".to_string()]));

    let report = h.node.broadcast("again").await;
    assert_eq!(report.delivered, vec![b]);
    assert_eq!(report.skipped, vec![a]);
}

#[tokio::test]
async fn test_broadcast_ignores_command_deadline() {
    // Per-peer bound longer than the command deadline: broadcast still succeeds.
    let h = harness_with(
        MockOverlay::new(),
        MeshConfig {
            command_timeout: Some(Duration::from_millis(20)),
            peer_send_timeout: Duration::from_millis(100),
            ..Default::default()
        },
    );
    let a = PeerId::random();
    h.overlay.add_connected_peer(a, Vec::new());
    h.overlay.stall_streams(a);

    let response = h
        .node
        .handle_request(r#"{"type":"broadcast","payload":"hello"}"#)
        .await;
    assert_eq!(to_json(response), json!({"success": true}));
}

#[tokio::test]
async fn test_direct_handler_drops_stream_on_oversized_line() {
    let h = harness_with(
        MockOverlay::new(),
        MeshConfig {
            max_direct_line_bytes: 16,
            ..Default::default()
        },
    );
    let peer = PeerId::random();
    let _handler = h.node.start_direct_handler().unwrap();

    let mut stream = h
        .overlay
        .inject_stream(peer, &DEFAULT_TEXT_PROTOCOL)
        .unwrap();
    let mut payload = b"ok\n".to_vec();
    payload.extend(std::iter::repeat_n(b'x', 100));
    payload.extend_from_slice(b"\nafter\n");
    stream.write_all(&payload).await.unwrap();

    // The reader hangs up, so the remote end sees EOF.
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("reader did not close the stream")
        .unwrap();

    assert_eq!(
        h.observer.direct.lock().clone(),
        vec![(peer, "ok".to_string())]
    );

    // Other streams are unaffected.
    let mut next = h
        .overlay
        .inject_stream(peer, &DEFAULT_TEXT_PROTOCOL)
        .unwrap();
    next.write_all(b"fine\n").await.unwrap();
    let seen = h.observer.wait_for_direct(2).await;
    assert_eq!(seen.last(), Some(&(peer, "fine".to_string())));
}

#[tokio::test]
async fn test_direct_handler_relays_lines() {
    let h = harness();
    let peer = PeerId::random();
    let _handler = h.node.start_direct_handler().unwrap();
    assert_matches!(
        h.node.start_direct_handler(),
        Err(OverlayError::ProtocolTaken(_))
    );

    let mut stream = h
        .overlay
        .inject_stream(peer, &DEFAULT_TEXT_PROTOCOL)
        .unwrap();
    stream.write_all(b"hi\n\nthere\n").await.unwrap();
    stream.close().await.unwrap();

    let seen = h.observer.wait_for_direct(2).await;
    assert_eq!(
        seen,
        vec![(peer, "hi".to_string()), (peer, "there".to_string())]
    );
}

#[tokio::test]
async fn test_command_deadline() {
    let h = harness_with(
        MockOverlay::new(),
        MeshConfig {
            command_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        },
    );
    h.overlay.stall_connect();

    let request = json!({"type": "connect", "payload": format!("/ip4/10.0.0.2/tcp/4001/p2p/{}", PeerId::random())});
    let response = h.node.handle_request(&request.to_string()).await;
    assert_eq!(to_json(response), json!({"success": false, "error": "timeout"}));

    // Other commands are unaffected.
    assert!(h.node.handle_request(r#"{"type":"get_peers"}"#).await.success);
}

#[tokio::test]
async fn test_responses_follow_request_order() {
    let h = harness();
    let requests = [
        r#"{"type":"join_topic","payload":"a"}"#,
        r#"{"type":"bogus"}"#,
        r#"{"type":"publish_to_topic","payload":{"topic":"b","data":"x"}}"#,
        r#"{"type":"get_network_stats"}"#,
    ];

    let mut responses = Vec::new();
    for request in requests {
        responses.push(h.node.handle_request(request).await);
    }

    assert_eq!(responses.len(), requests.len());
    assert!(responses[0].success);
    assert_eq!(responses[1].error.as_deref(), Some("Unknown message type"));
    assert_eq!(responses[2].error.as_deref(), Some("not subscribed to topic: b"));
    assert!(responses[3].data.is_some());
}
