//! Integration tests for live progress publication and transfer rows.

mod common;

use common::{multipart_body, upload_request, TestHarness};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wifidrop::state::TransferEvent;

/// Drain currently queued events without blocking on new ones.
fn drain(rx: &mut tokio::sync::broadcast::Receiver<TransferEvent>) -> Vec<TransferEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn progress_is_monotonic_and_reaches_one() {
    let (h, addr) = TestHarness::with_server().await;
    let mut rx = h.hub.subscribe();

    let payload = vec![0xabu8; 4096];
    let body = multipart_body("X", &[("big.bin", &payload)]);
    let raw = upload_request("X", &body, "");

    // Headers first, then the body in small chunks with gaps, so several
    // reads land on the server side.
    let split = raw.len() - body.len();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&raw[..split]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    for chunk in body.chunks(700) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut resp = Vec::new();
    stream.read_to_end(&mut resp).await.unwrap();
    assert!(String::from_utf8_lossy(&resp).starts_with("HTTP/1.1 200 OK\r\n"));

    let mut progress = Vec::new();
    for event in drain(&mut rx) {
        if let TransferEvent::TransferProgress { progress: p, .. } = event {
            progress.push(p);
        }
    }

    assert!(progress.len() >= 2, "expected several updates, got {progress:?}");
    assert!(
        progress.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {progress:?}"
    );
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
    // The last update before dispatch reports exactly 1.0.
    assert_eq!(*progress.last().unwrap(), 1.0);
}

#[tokio::test]
async fn x_filename_header_names_the_row_early() {
    let (h, addr) = TestHarness::with_server().await;
    let mut rx = h.hub.subscribe();

    let body = multipart_body("X", &[("raw-name.bin", b"DATA")]);
    let raw = upload_request("X", &body, "X-Filename: my%20movie.mp4\r\n");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&raw).await.unwrap();
    let mut resp = Vec::new();
    stream.read_to_end(&mut resp).await.unwrap();

    let started_name = drain(&mut rx).into_iter().find_map(|e| match e {
        TransferEvent::TransferStarted { transfer } => Some(transfer.display_name),
        _ => None,
    });
    assert_eq!(started_name.as_deref(), Some("my movie.mp4"));
}

#[tokio::test]
async fn stalled_connection_times_out_and_clears_row() {
    let (h, addr) = TestHarness::with_idle_timeout(1).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Headers plus a sliver of the body, then go quiet.
    let body = multipart_body("X", &[("slow.bin", &[0u8; 2048])]);
    let raw = upload_request("X", &body, "");
    let split = raw.len() - body.len();
    stream.write_all(&raw[..split + 100]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.hub.active_transfers().len(), 1);

    // Past the idle limit the server drops the connection without a
    // response and the in-flight row is removed.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(h.hub.active_transfers().is_empty());

    let mut resp = Vec::new();
    let n = stream.read_to_end(&mut resp).await.unwrap();
    assert_eq!(n, 0, "expected a bare close, got: {resp:?}");
}

#[tokio::test]
async fn terminal_rows_linger_then_disappear() {
    let (h, addr) = TestHarness::with_server().await;

    let body = multipart_body("X", &[("keep.bin", b"DATA")]);
    let raw = upload_request("X", &body, "");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&raw).await.unwrap();
    let mut resp = Vec::new();
    stream.read_to_end(&mut resp).await.unwrap();

    // Right after the response the terminal row is still visible.
    let rows = h.hub.active_transfers();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].progress, 1.0);
    assert!(rows[0].saved_path.is_some());

    // After the linger interval it is cleaned up.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(h.hub.active_transfers().is_empty());
}
