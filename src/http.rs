//! A deliberately minimal HTTP/1.1 framing layer.
//!
//! This crate does not pull in a full web framework: the wire protocol is
//! "one JSON-RPC call per POST, one status page per GET", so a hand-rolled
//! request line + header parser is all that is needed. The shape mirrors
//! the original `Connection`/`Server`/`ServerHandler` trio almost exactly —
//! only the framing changed, from a length-prefixed binary protocol to
//! HTTP/1.1 request/response.

use log::error;
use std::error::Error as StdError;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use threadpool::ThreadPool;

/// A decoded incoming request: method, path (query string included,
/// unparsed) and a raw body.
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// A response ready to be written back to the client.
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(value: &impl serde::Serialize) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        HttpResponse {
            status: 200,
            reason: "OK",
            content_type: "application/json",
            body,
        }
    }

    pub fn html(body: String) -> Self {
        HttpResponse {
            status: 200,
            reason: "OK",
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
        }
    }

    pub fn not_found() -> Self {
        HttpResponse {
            status: 404,
            reason: "Not Found",
            content_type: "text/plain",
            body: b"not found".to_vec(),
        }
    }

    pub fn server_error(message: &str) -> Self {
        HttpResponse {
            status: 500,
            reason: "Internal Server Error",
            content_type: "text/plain",
            body: message.as_bytes().to_vec(),
        }
    }
}

fn read_request(stream: &mut TcpStream) -> io::Result<HttpRequest> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "missing HTTP method"))?
        .to_string();
    let path = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "missing HTTP path"))?
        .to_string();

    let mut content_length: usize = 0;
    loop {
        let mut header_line = String::new();
        reader.read_line(&mut header_line)?;
        let trimmed = header_line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body)?;
    }

    Ok(HttpRequest { method, path, body })
}

fn write_response(stream: &mut TcpStream, response: &HttpResponse) -> io::Result<()> {
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason,
        response.content_type,
        response.body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

/// Handles one decoded HTTP request and produces a response.
///
/// Mirrors the original `ServerHandler` trait: `handle` does the real
/// work, `handle_error` reports transport-level failures that never made
/// it to a request.
pub trait ServerHandler {
    fn handle(&self, request: HttpRequest) -> HttpResponse;

    fn handle_error(&self, error: &dyn StdError) {
        error!("error serving HTTP connection: {}", error);
    }
}

/// A multithreaded HTTP server: one thread accepting connections, a
/// `threadpool` of workers handling them.
pub struct Server {
    handler: Arc<dyn ServerHandler + Send + Sync>,
}

impl Server {
    pub fn new(handler: Arc<dyn ServerHandler + Send + Sync>) -> Self {
        Server { handler }
    }

    pub fn listen<A: ToSocketAddrs>(
        self,
        addr: A,
        num_workers: usize,
    ) -> io::Result<thread::JoinHandle<()>> {
        let listener = TcpListener::bind(addr)?;
        let handler = self.handler;

        let join_handle = thread::spawn(move || {
            let pool = ThreadPool::new(num_workers);

            for incoming in listener.incoming() {
                let handler = Arc::clone(&handler);
                match incoming {
                    Ok(mut stream) => {
                        pool.execute(move || match read_request(&mut stream) {
                            Ok(request) => {
                                let response = handler.handle(request);
                                if let Err(err) = write_response(&mut stream, &response) {
                                    handler.handle_error(&err);
                                }
                            }
                            Err(err) => handler.handle_error(&err),
                        });
                    }
                    Err(err) => handler.handle_error(&err),
                }
            }
        });

        Ok(join_handle)
    }
}

/// A blocking HTTP/1.1 client, just enough to speak the JSON-RPC call
/// format this crate defines. No connection pooling: every call opens a
/// fresh socket, matching the original's per-request `Connection::open`.
pub fn post(
    addr: &str,
    path: &str,
    body: &[u8],
    timeout: Duration,
) -> io::Result<(u16, Vec<u8>)> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let header = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        path,
        addr,
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;

    read_response(&mut stream)
}

pub fn get(addr: &str, path: &str, timeout: Duration) -> io::Result<(u16, Vec<u8>)> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let header = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(header.as_bytes())?;
    stream.flush()?;

    read_response(&mut stream)
}

fn read_response(stream: &mut TcpStream) -> io::Result<(u16, Vec<u8>)> {
    let mut reader = BufReader::new(stream);

    let mut status_line = String::new();
    reader.read_line(&mut status_line)?;
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let mut content_length: usize = 0;
    loop {
        let mut header_line = String::new();
        reader.read_line(&mut header_line)?;
        let trimmed = header_line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body)?;
    }

    Ok((status, body))
}
