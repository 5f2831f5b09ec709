//! Per-connection HTTP request parsing and response writing.
//!
//! # Responsibilities
//! - Fill and refill the bounded read buffer from the socket
//! - Parse the request line, query string, and headers
//! - Write status lines, fixed-length bodies, and chunked bodies
//!
//! # Design Decisions
//! - Methods and header names are normalized to lowercase at parse time
//! - Both `\r\n` and bare `\n` line terminators are accepted
//! - Any malformed line or premature EOF surfaces as a parse error the
//!   handler answers with a 400 before closing
//! - Reads block on the socket with no overall header deadline; only the
//!   transaction protocol runs a bounded body-read loop

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response::status_line;

/// Size of the per-connection read buffer. A request whose header lines
/// do not fit is malformed.
pub const READ_BUF_LEN: usize = 8192;

/// Errors while reading or parsing a request.
#[derive(Debug)]
pub enum ParseError {
    Io(std::io::Error),
    /// The peer closed the connection mid-request.
    UnexpectedEof,
    /// A line exceeded the read buffer.
    LineTooLong,
    /// The request line was not `METHOD SP PATH SP VERSION`.
    BadRequestLine,
    /// A header line had no colon.
    BadHeader,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "socket error: {}", e),
            ParseError::UnexpectedEof => write!(f, "connection closed mid-request"),
            ParseError::LineTooLong => write!(f, "request line exceeds buffer"),
            ParseError::BadRequestLine => write!(f, "malformed request line"),
            ParseError::BadHeader => write!(f, "malformed header line"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::Io(e)
    }
}

/// A parsed request: lowercased method, path, query parameters, and
/// lowercase-keyed headers, plus the client address.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub peer: SocketAddr,
}

impl Request {
    /// Header value by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Query parameter value by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Buffered reader/writer over one accepted HTTP connection.
pub struct HttpConnection<S> {
    stream: S,
    peer: SocketAddr,
    buf: Vec<u8>,
    len: usize,
    pos: usize,
    eof: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> HttpConnection<S> {
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            buf: vec![0; READ_BUF_LEN],
            len: 0,
            pos: 0,
            eof: false,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Refill the buffer, compacting consumed bytes first.
    async fn fill(&mut self) -> Result<(), ParseError> {
        if self.eof {
            return Err(ParseError::UnexpectedEof);
        }
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.len, 0);
            self.len -= self.pos;
            self.pos = 0;
        }
        if self.len == self.buf.len() {
            return Err(ParseError::LineTooLong);
        }
        let n = self.stream.read(&mut self.buf[self.len..]).await?;
        if n == 0 {
            self.eof = true;
            return Err(ParseError::UnexpectedEof);
        }
        self.len += n;
        Ok(())
    }

    /// Read one line, accepting `\r\n` or `\n`, without the terminator.
    async fn read_line(&mut self) -> Result<String, ParseError> {
        loop {
            if let Some(nl) = self.buf[self.pos..self.len].iter().position(|&b| b == b'\n') {
                let raw = &self.buf[self.pos..self.pos + nl];
                let line = match raw.last() {
                    Some(b'\r') => &raw[..raw.len() - 1],
                    _ => raw,
                };
                let line = String::from_utf8_lossy(line).into_owned();
                self.pos += nl + 1;
                return Ok(line);
            }
            self.fill().await?;
        }
    }

    /// Parse the request line, query string, and header section.
    pub async fn parse_request(&mut self) -> Result<Request, ParseError> {
        let line = self.read_line().await?;
        let mut parts = line.split_whitespace();
        let (method, target) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            // The version is discarded after the shape check.
            (Some(method), Some(target), Some(_version), None) => (method, target),
            _ => return Err(ParseError::BadRequestLine),
        };
        let method = method.to_lowercase();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query(query)),
            None => (target.to_string(), HashMap::new()),
        };

        let mut headers = HashMap::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or(ParseError::BadHeader)?;
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }

        Ok(Request {
            method,
            path,
            query,
            headers,
            peer: self.peer,
        })
    }

    /// Write a status line and headers, no body.
    pub async fn respond_status(
        &mut self,
        status: u16,
        headers: &[(&str, &str)],
    ) -> std::io::Result<()> {
        let head = build_head(status, headers, &[]);
        self.stream.write_all(head.as_bytes()).await
    }

    /// Write a complete response with a Content-Length body.
    pub async fn respond(
        &mut self,
        status: u16,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> std::io::Result<()> {
        let length = body.len().to_string();
        let head = build_head(status, headers, &[("Content-Length", &length)]);
        self.stream.write_all(head.as_bytes()).await?;
        self.stream.write_all(body).await
    }

    /// Start a chunked response. The caller streams chunks with
    /// `write_chunk` and must terminate the body with `finish_chunked`.
    pub async fn respond_chunked(
        &mut self,
        status: u16,
        headers: &[(&str, &str)],
    ) -> std::io::Result<()> {
        let head = build_head(status, headers, &[("Transfer-Encoding", "chunked")]);
        self.stream.write_all(head.as_bytes()).await
    }

    /// Write one chunk: hex length, CRLF, data, CRLF.
    pub async fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stream
            .write_all(format!("{:x}\r\n", data.len()).as_bytes())
            .await?;
        self.stream.write_all(data).await?;
        self.stream.write_all(b"\r\n").await
    }

    /// Write the terminating zero-length chunk.
    pub async fn finish_chunked(&mut self) -> std::io::Result<()> {
        self.stream.write_all(b"0\r\n\r\n").await
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush().await
    }
}

fn build_head(status: u16, headers: &[(&str, &str)], extra: &[(&str, &str)]) -> String {
    let mut head = status_line(status);
    for (name, value) in headers.iter().chain(extra) {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head
}

fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => params.insert(key.to_string(), value.to_string()),
            // A bare key maps to the empty string.
            None => params.insert(pair.to_string(), String::new()),
        };
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;

    fn peer() -> SocketAddr {
        "192.168.1.50:40000".parse().unwrap()
    }

    async fn parse(raw: &[u8]) -> Result<Request, ParseError> {
        let (mut client, server) = tokio::io::duplex(READ_BUF_LEN * 2);
        client.write_all(raw).await.unwrap();
        client.shutdown().await.unwrap();
        HttpConnection::new(server, peer()).parse_request().await
    }

    #[tokio::test]
    async fn test_parse_simple_get() {
        let req = parse(b"GET /index.html HTTP/1.1\r\nHost: console\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.method, "get");
        assert_eq!(req.path, "/index.html");
        assert_eq!(req.header("host"), Some("console"));
        assert_eq!(req.peer, peer());
    }

    #[tokio::test]
    async fn test_header_names_lowercased() {
        let req = parse(b"GET / HTTP/1.1\r\nUser-Agent: hlink/1.0\r\nX-THING: Up\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.header("user-agent"), Some("hlink/1.0"));
        assert_eq!(req.header("x-thing"), Some("Up"));
    }

    #[tokio::test]
    async fn test_bare_newline_terminators() {
        let req = parse(b"GET /a HTTP/1.1\nHost: x\n\n").await.unwrap();
        assert_eq!(req.path, "/a");
        assert_eq!(req.header("host"), Some("x"));
    }

    #[tokio::test]
    async fn test_query_string_parsed_and_stripped() {
        let req = parse(b"GET /queue?sort=name&raw&page=2 HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.path, "/queue");
        assert_eq!(req.query_param("sort"), Some("name"));
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.query_param("raw"), Some("")); // bare key
        assert_eq!(req.query.len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_request_line() {
        assert!(matches!(
            parse(b"GET /nothing-else\r\n\r\n").await,
            Err(ParseError::BadRequestLine)
        ));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nno colon here\r\n\r\n").await,
            Err(ParseError::BadHeader)
        ));
    }

    #[tokio::test]
    async fn test_premature_eof() {
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nHost: x").await,
            Err(ParseError::UnexpectedEof)
        ));
    }

    async fn drain(client: &mut tokio::io::DuplexStream) -> String {
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_respond_sets_content_length() {
        let (server, mut client) = tokio::io::duplex(READ_BUF_LEN * 2);
        let mut conn = HttpConnection::new(server, peer());
        conn.respond(200, &[("Content-Type", "text/html")], b"hello")
            .await
            .unwrap();
        drop(conn);

        let out = drain(&mut client).await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Type: text/html\r\n"));
        assert!(out.contains("Content-Length: 5\r\n"));
        assert!(out.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn test_chunked_body_format() {
        let (server, mut client) = tokio::io::duplex(READ_BUF_LEN * 2);
        let mut conn = HttpConnection::new(server, peer());
        conn.respond_chunked(200, &[]).await.unwrap();
        conn.write_chunk(b"hello world, this is one chunk").await.unwrap();
        conn.write_chunk(b"tail").await.unwrap();
        conn.finish_chunked().await.unwrap();
        drop(conn);

        let out = drain(&mut client).await;
        assert!(out.contains("Transfer-Encoding: chunked\r\n"));
        assert!(out.contains("1e\r\nhello world, this is one chunk\r\n"));
        assert!(out.contains("4\r\ntail\r\n"));
        assert!(out.ends_with("0\r\n\r\n"));
    }
}
