//! HTTP/1.1 response serialization.
//!
//! Every response closes the connection; the server never negotiates
//! keep-alive.

/// A fully-materialized HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Response {
    pub fn html(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            // An empty reason-phrase is valid; never borrow a wrong one.
            _ => "",
        }
    }

    /// Serialize the status line, header block and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len()
        );

        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_exact_content_length() {
        let resp = Response::html(200, "<p>ok</p>");
        let bytes = resp.to_bytes();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>ok</p>"));
    }

    #[test]
    fn status_reasons() {
        assert!(String::from_utf8(Response::text(400, "x").to_bytes())
            .unwrap()
            .starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(String::from_utf8(Response::text(404, "x").to_bytes())
            .unwrap()
            .starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn unlisted_status_gets_no_reason_phrase() {
        let text = String::from_utf8(Response::text(403, "x").to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 403 \r\n"));
        assert!(!text.contains("Internal Server Error"));
    }
}
