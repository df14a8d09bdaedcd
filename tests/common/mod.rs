//! Shared harness for integration tests: a real server on an ephemeral
//! port, a scratch documents directory, and raw-socket request helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wifidrop::config::ServerConfig;
use wifidrop::server::TransferServer;
use wifidrop::state::TransferHub;
use wifidrop::storage::{FileStore, IMPORT_DIR};

pub struct TestHarness {
    pub server: TransferServer,
    pub hub: Arc<TransferHub>,
    dir: TempDir,
}

impl TestHarness {
    /// Spin up a server on an ephemeral localhost port.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_idle_timeout(10).await
    }

    /// Same, but with a caller-chosen idle timeout (in seconds).
    pub async fn with_idle_timeout(idle_timeout_secs: u64) -> (Self, SocketAddr) {
        let dir = tempfile::tempdir().unwrap();
        let hub = TransferHub::new();
        let store = Arc::new(FileStore::new(dir.path()));

        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            idle_timeout_secs,
        };
        let mut server = TransferServer::new(&config, Arc::clone(&hub), store);
        server.start(0).await;
        assert!(
            server.wait_until_running(Duration::from_secs(5)).await,
            "server failed to come up"
        );
        let addr = server.bound_addr().unwrap();

        (Self { server, hub, dir }, addr)
    }

    /// Directory completed imports land in.
    pub fn import_dir(&self) -> PathBuf {
        self.dir.path().join(IMPORT_DIR)
    }
}

/// Build a multipart/form-data body with one file part per entry.
pub fn multipart_body(boundary: &str, parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (filename, data) in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        out.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

/// Assemble a raw upload request with the usual headers.
pub fn upload_request(boundary: &str, body: &[u8], extra_headers: &str) -> Vec<u8> {
    let mut raw = format!(
        "POST /upload HTTP/1.1\r\n\
         Host: test\r\n\
         Content-Type: multipart/form-data; boundary={boundary}\r\n\
         Content-Length: {}\r\n\
         {extra_headers}\r\n",
        body.len()
    )
    .into_bytes();
    raw.extend_from_slice(body);
    raw
}

/// Write a raw request and collect the whole response; the server closes
/// the connection after responding.
pub async fn send_request(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut resp = Vec::new();
    stream.read_to_end(&mut resp).await.unwrap();
    String::from_utf8_lossy(&resp).to_string()
}
