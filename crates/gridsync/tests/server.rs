//! Integration tests for the gridsync server, handler, and admin console.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use gridsync::prelude::*;
use gridsync::run_console;
use gridsync_transport::frame::{encode_frame, read_frame};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on an ephemeral port and returns its address and store.
async fn start_server(idle_timeout: Option<Duration>) -> (String, Arc<StateStore>) {
    let server = SyncServer::builder()
        .bind("127.0.0.1:0")
        .initial_map(MapId::new("default.csv"))
        .idle_timeout(idle_timeout)
        .build()
        .await
        .unwrap();

    let addr = server.local_addr().unwrap().to_string();
    let store = server.store();
    tokio::spawn(server.run());
    (addr, store)
}

async fn send_raw(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(&encode_frame(payload).unwrap()).await.unwrap();
}

async fn recv_raw(stream: &mut TcpStream) -> Option<Vec<u8>> {
    tokio::time::timeout(Duration::from_secs(5), read_frame(stream, None))
        .await
        .expect("server did not answer in time")
        .unwrap()
}

async fn recv_json(stream: &mut TcpStream) -> Value {
    serde_json::from_slice(&recv_raw(stream).await.unwrap()).unwrap()
}

// =========================================================================
// Wire-level request/response
// =========================================================================

#[tokio::test]
async fn test_place_token_scenario_over_the_wire() {
    let (addr, _store) = start_server(None).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    send_raw(&mut stream, br#"{"op":"get","arg":"map"}"#).await;
    assert_eq!(recv_json(&mut stream).await, json!("default.csv"));

    send_raw(&mut stream, br#"{"op":"get","arg":"tokens"}"#).await;
    assert_eq!(recv_json(&mut stream).await, json!({}));

    send_raw(
        &mut stream,
        br#"{"op":"set","arg":"place_token","data":{"name":"Hero","row":0,"col":0,"img":"black_circle"}}"#,
    )
    .await;
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"ack");

    send_raw(&mut stream, br#"{"op":"get","arg":"tokens"}"#).await;
    assert_eq!(
        recv_json(&mut stream).await,
        json!({"Hero": {"row": 0, "col": 0, "img": "black_circle"}})
    );

    send_raw(&mut stream, br#"{"op":"admin","arg":"set_map","data":"cave.csv"}"#).await;
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"ack");

    send_raw(&mut stream, br#"{"op":"get","arg":"map"}"#).await;
    assert_eq!(recv_json(&mut stream).await, json!("cave.csv"));

    send_raw(&mut stream, br#"{"op":"get","arg":"tokens"}"#).await;
    assert_eq!(recv_json(&mut stream).await, json!({}));
}

#[tokio::test]
async fn test_unplaced_token_stays_listed() {
    let (addr, _store) = start_server(None).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    send_raw(
        &mut stream,
        br#"{"op":"set","arg":"place_token","data":{"name":"A","row":2,"col":3,"img":"knight"}}"#,
    )
    .await;
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"ack");

    send_raw(
        &mut stream,
        br#"{"op":"set","arg":"place_token","data":{"name":"A","row":null,"col":null,"img":"knight"}}"#,
    )
    .await;
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"ack");

    send_raw(&mut stream, br#"{"op":"get","arg":"tokens"}"#).await;
    assert_eq!(
        recv_json(&mut stream).await,
        json!({"A": {"row": null, "col": null, "img": "knight"}})
    );
}

#[tokio::test]
async fn test_malformed_payload_gets_err_and_connection_survives() {
    let (addr, store) = start_server(None).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    send_raw(&mut stream, br#"{"op":"get","arg":"ma"#).await;
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"err");

    send_raw(&mut stream, br#"{"op":"get","arg":"dice"}"#).await;
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"err");

    send_raw(&mut stream, br#"{"op":"admin","arg":"set_map","data":42}"#).await;
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"err");
    assert_eq!(store.get_map(), MapId::new("default.csv"));

    // Still the same connection.
    send_raw(&mut stream, br#"{"op":"get","arg":"map"}"#).await;
    assert_eq!(recv_json(&mut stream).await, json!("default.csv"));
}

#[tokio::test]
async fn test_close_request_is_acked_then_closed() {
    let (addr, _store) = start_server(None).await;

    for close in [&br#"{"op":"session","arg":"close"}"#[..], b"quit"] {
        let mut stream = TcpStream::connect(&addr).await.unwrap();
        send_raw(&mut stream, close).await;
        assert_eq!(recv_raw(&mut stream).await.unwrap(), b"ack");
        assert_eq!(recv_raw(&mut stream).await, None);
    }
}

#[tokio::test]
async fn test_bad_length_prefix_gets_err_then_close() {
    let (addr, _store) = start_server(None).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    stream.write_all(b"length??{}").await.unwrap();
    assert_eq!(recv_raw(&mut stream).await.unwrap(), b"err");
    assert_eq!(recv_raw(&mut stream).await, None);
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let (addr, _store) = start_server(None).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    let frame = encode_frame(br#"{"op":"get","arg":"map"}"#).unwrap();
    for chunk in frame.chunks(3) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(recv_json(&mut stream).await, json!("default.csv"));
}

#[tokio::test]
async fn test_idle_connection_is_dropped() {
    let (addr, _store) = start_server(Some(Duration::from_millis(100))).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    assert_eq!(recv_raw(&mut stream).await, None);
}

#[tokio::test]
async fn test_stalled_partial_frame_is_dropped() {
    let (addr, _store) = start_server(Some(Duration::from_millis(100))).await;

    for partial in [&b"0"[..], b"99999999", b"00000010abc"] {
        let mut stream = TcpStream::connect(&addr).await.unwrap();
        stream.write_all(partial).await.unwrap();

        let closed = tokio::time::timeout(Duration::from_secs(2), read_frame(&mut stream, None))
            .await
            .expect("server kept a stalled connection open");
        assert!(matches!(closed, Ok(None)), "{partial:?}: {closed:?}");
    }
}

#[tokio::test]
async fn test_one_bad_client_does_not_affect_others() {
    let (addr, _store) = start_server(None).await;
    let mut good = ClientSession::connect(&addr).await.unwrap();

    let mut bad = TcpStream::connect(&addr).await.unwrap();
    bad.write_all(b"garbage!").await.unwrap();
    drop(bad);

    assert_eq!(good.fetch_map().await.unwrap(), MapId::new("default.csv"));
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test]
async fn test_many_clients_share_one_store() {
    let (addr, store) = start_server(None).await;

    let placers = (0..20).map(|i| {
        let addr = addr.clone();
        async move {
            let mut session = ClientSession::connect(&addr).await.unwrap();
            let ack = session
                .push_token_move(format!("P{i}"), Some(Position::new(i, i)), "pawn")
                .await
                .unwrap();
            assert!(ack.is_accepted());
            session.close().await.unwrap();
        }
    });
    join_all(placers).await;

    let tokens = store.get_tokens();
    assert_eq!(tokens.len(), 20);
    assert_eq!(
        tokens.get("P7").and_then(|t| t.position),
        Some(Position::new(7, 7))
    );

    let mut viewer = ClientSession::connect(&addr).await.unwrap();
    assert_eq!(viewer.fetch_tokens().await.unwrap(), tokens);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_set_map_races_with_placements() {
    let (addr, store) = start_server(None).await;

    let placer = |name: &'static str| {
        let addr = addr.clone();
        tokio::spawn(async move {
            let mut session = ClientSession::connect(&addr).await.unwrap();
            for round in 0..50u32 {
                let ack = session
                    .push_token_move(name, Some(Position::new(round, 0)), "pawn")
                    .await
                    .unwrap();
                assert!(ack.is_accepted());
            }
        })
    };
    let handles = [placer("A"), placer("B"), placer("C")];

    let mut admin = ClientSession::connect(&addr).await.unwrap();
    for i in 0..20 {
        let ack = admin
            .push_admin_set_map(MapId::new(format!("map{i}.csv")))
            .await
            .unwrap();
        assert!(ack.is_accepted());
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // The last switch wins, and the board never holds anything but the
    // three placers' tokens.
    let (map, tokens) = store.snapshot();
    assert_eq!(map, MapId::new("map19.csv"));
    assert!(tokens.len() <= 3);
    assert!(tokens.iter().all(|(name, _)| ["A", "B", "C"].contains(&name)));

    // A fresh switch clears whatever the race left behind.
    admin.push_admin_set_map(MapId::new("final.csv")).await.unwrap();
    assert!(store.get_tokens().is_empty());
}

// =========================================================================
// Admin console
// =========================================================================

#[tokio::test]
async fn test_admin_console_switches_map() {
    let (addr, store) = start_server(None).await;
    store.place_token("Hero", Some(Position::new(0, 0)), "black_circle");

    let mut output = Vec::new();
    run_console(&addr, &b"map cave.csv\n\nhelp\nquit\nmap never.csv\n"[..], &mut output)
        .await
        .unwrap();

    assert_eq!(store.get_map(), MapId::new("cave.csv"));
    assert!(store.get_tokens().is_empty());

    let output = String::from_utf8(output).unwrap();
    assert!(output.starts_with("connected to server\n"), "{output}");
    assert!(output.contains("changing map to cave.csv"), "{output}");
    assert!(output.contains("unknown command \"help\""), "{output}");
    assert!(!output.contains("never.csv"), "{output}");
}

#[tokio::test]
async fn test_admin_console_stops_at_end_of_input() {
    let (addr, store) = start_server(None).await;

    let mut output = Vec::new();
    run_console(&addr, &b"map a.csv\nmap b.csv"[..], &mut output)
        .await
        .unwrap();

    assert_eq!(store.get_map(), MapId::new("b.csv"));
}

#[tokio::test]
async fn test_admin_console_unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = run_console(&addr, &b"quit\n"[..], Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GridsyncError::Client(ref e) if e.is_connection_lost()), "{err}");
}

#[tokio::test]
async fn test_admin_console_reconnects_after_lost_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // First connection: read one request and hang up without answering.
    // Second connection: acknowledge everything.
    tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        read_frame(&mut first, None).await.unwrap();
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        while let Ok(Some(_)) = read_frame(&mut second, None).await {
            second.write_all(&encode_frame(b"ack").unwrap()).await.unwrap();
        }
    });

    let mut output = Vec::new();
    run_console(&addr, &b"map lost.csv\nmap found.csv\nquit\n"[..], &mut output)
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("connection lost"), "{output}");
    assert!(output.contains("changing map to found.csv"), "{output}");
    assert_eq!(output.matches("Update not acknowledged").count(), 0, "{output}");
}
