//! Per-connection request handling.
//!
//! Each accepted socket is read incrementally into a growing buffer and
//! driven through a small state machine: `AwaitingHeaders` until the
//! `\r\n\r\n` separator arrives, `AwaitingBody` until the declared
//! Content-Length is satisfied (or the peer closes), then dispatch and
//! close. Connections are independent tasks; ordering only matters within
//! one connection's own read sequence.

use crate::server::multipart;
use crate::server::pages;
use crate::server::request::RequestHead;
use crate::server::response::Response;
use crate::server::scan;
use crate::server::Error;
use crate::state::TransferHub;
use crate::storage::FileStore;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

/// Shared handles every connection task needs.
pub(crate) struct ServerContext {
    pub hub: Arc<TransferHub>,
    pub store: Arc<FileStore>,
    /// `ip:port` embedded into the served upload page.
    pub advertised_addr: String,
    /// Maximum idle gap between reads; `None` leaves stalled peers alone.
    pub idle_timeout: Option<Duration>,
}

enum Phase {
    AwaitingHeaders,
    AwaitingBody {
        head: RequestHead,
        body_start: usize,
        content_length: usize,
    },
}

pub(crate) async fn handle(stream: TcpStream, peer: SocketAddr, ctx: Arc<ServerContext>) {
    match drive(stream, &ctx).await {
        Ok(()) => tracing::debug!(%peer, "Connection closed"),
        Err(e) => tracing::debug!(%peer, error = %e, "Connection aborted"),
    }
}

async fn drive(mut stream: TcpStream, ctx: &ServerContext) -> Result<(), Error> {
    let mut buf = BytesMut::with_capacity(16 * 1024);
    let mut phase = Phase::AwaitingHeaders;
    let mut scan_from = 0usize;
    let mut transfer_id: Option<Uuid> = None;
    let mut eof = false;

    loop {
        match read_chunk(&mut stream, &mut buf, ctx.idle_timeout).await {
            Ok(0) => eof = true,
            Ok(_) => {}
            Err(e) => {
                // The row must not survive a dead connection.
                if let Some(id) = transfer_id {
                    ctx.hub.remove_transfer(id);
                }
                return Err(e);
            }
        }

        if matches!(phase, Phase::AwaitingHeaders) {
            if let Some(sep) = scan::find_from(&buf, b"\r\n\r\n", scan_from) {
                let Some(head) = RequestHead::parse(&buf[..sep]) else {
                    let reason = Error::MalformedRequest("bad request line".to_string());
                    return finish(&mut stream, Response::text(400, reason.to_string())).await;
                };
                let body_start = sep + 4;

                match head.content_length() {
                    Some(len) if len > 0 => {
                        let len = len as usize;
                        let name = early_display_name(&head, &buf[body_start..]);
                        transfer_id = Some(ctx.hub.begin_transfer(name, len as u64));
                        phase = Phase::AwaitingBody {
                            head,
                            body_start,
                            content_length: len,
                        };
                    }
                    _ => {
                        // Header-only request; dispatch with whatever body
                        // bytes (none expected) are present.
                        let resp = route(&head, &buf[body_start..], None, ctx);
                        return finish(&mut stream, resp).await;
                    }
                }
            } else {
                // The separator may straddle a chunk border; re-scan from
                // three bytes back instead of from the start.
                scan_from = buf.len().saturating_sub(3);
            }
        }

        if let Phase::AwaitingBody {
            head,
            body_start,
            content_length,
        } = &phase
        {
            let received = buf.len().saturating_sub(*body_start);
            if let Some(id) = transfer_id {
                let progress = (received as f32 / *content_length as f32).min(1.0);
                ctx.hub.update_progress(id, progress);
            }

            // Dispatch on a complete body, or best-effort at end-of-stream
            // with however many bytes arrived.
            if received >= *content_length || eof {
                let body_end = body_start + received.min(*content_length);
                let resp = route(head, &buf[*body_start..body_end], transfer_id, ctx);
                return finish(&mut stream, resp).await;
            }
        } else if eof {
            // Stream ended before the header separator ever arrived.
            if buf.is_empty() {
                return Ok(());
            }
            let reason = Error::MalformedRequest("missing header separator".to_string());
            return finish(&mut stream, Response::text(400, reason.to_string())).await;
        }
    }
}

/// One incremental read into the buffer, bounded by the idle timeout.
async fn read_chunk(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    idle_timeout: Option<Duration>,
) -> Result<usize, Error> {
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.read_buf(buf)).await {
            Ok(read) => Ok(read?),
            Err(_) => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "idle connection timed out",
            ))),
        },
        None => Ok(stream.read_buf(buf).await?),
    }
}

/// Write the response and close the connection; no keep-alive.
async fn finish(stream: &mut TcpStream, resp: Response) -> Result<(), Error> {
    stream.write_all(&resp.to_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Cosmetic early name for the in-flight row: the percent-encoded
/// `X-Filename` header when the client set one, else the first
/// `filename="…"` token in the body bytes received so far.
fn early_display_name(head: &RequestHead, body: &[u8]) -> Option<String> {
    if let Some(encoded) = head.header("X-Filename") {
        let decoded = multipart::percent_decode(encoded);
        if !decoded.is_empty() {
            return Some(decoded);
        }
    }
    multipart::filename_in(body)
}

fn route(
    head: &RequestHead,
    body: &[u8],
    transfer_id: Option<Uuid>,
    ctx: &ServerContext,
) -> Response {
    match (head.method.as_str(), head.target.as_str()) {
        ("GET", "/") | ("GET", "/index.html") => {
            Response::html(200, pages::upload_page(&ctx.advertised_addr))
        }
        ("POST", "/upload") => handle_upload(head, body, transfer_id, ctx),
        _ => {
            if let Some(id) = transfer_id {
                ctx.hub.remove_transfer(id);
            }
            Response::text(404, "not found")
        }
    }
}

fn handle_upload(
    head: &RequestHead,
    body: &[u8],
    transfer_id: Option<Uuid>,
    ctx: &ServerContext,
) -> Response {
    let boundary = head
        .header("Content-Type")
        .and_then(multipart::boundary_from_content_type);
    let Some(boundary) = boundary else {
        if let Some(id) = transfer_id {
            ctx.hub.remove_transfer(id);
        }
        return Response::text(400, Error::MissingBoundary.to_string());
    };

    let mut saved = Vec::new();
    for part in multipart::parse_parts(body, &boundary) {
        match ctx.store.save(&part.filename, part.data) {
            Ok(path) => saved.push((part.filename, part.data.len() as u64, path)),
            Err(e) => {
                // That file is simply not imported; the rest of the batch
                // is unaffected.
                tracing::warn!(file = %part.filename, "Failed to save upload: {e:#}");
            }
        }
    }

    let count = saved.len();
    if let Some(id) = transfer_id {
        let terminals = ctx.hub.finish_transfer(id, saved);
        for t in &terminals {
            ctx.hub.schedule_removal(t.id);
        }
    }

    if count > 0 {
        Response::html(200, pages::success_page(count))
    } else {
        Response::html(400, pages::failure_page("no files were uploaded"))
    }
}
