//! HTTP transport behavior against a one-shot local server.
//!
//! Each test serves exactly one canned response and checks how the fetcher
//! classifies it. No retries are expected: the server accepts a single
//! connection.

use deltaboot_fetch::{Fetch, HttpFetcher, TransportError, Url};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

fn serve_once(response: Vec<u8>) -> (Url, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request(&mut stream);
        stream.write_all(&response).unwrap();
        stream.flush().unwrap();
    });
    (Url::parse(&format!("http://{addr}/base.bin")).unwrap(), handle)
}

fn read_request(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
}

fn fetcher() -> HttpFetcher {
    let client = reqwest::blocking::Client::builder().no_proxy().build().unwrap();
    HttpFetcher::with_client(client)
}

#[test]
fn successful_transfer_returns_all_bytes() {
    let body = vec![0x42u8; 5000];
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(&body);
    let (url, server) = serve_once(response);

    assert_eq!(fetcher().fetch(&url).unwrap(), body);
    server.join().unwrap();
}

#[test]
fn non_success_status_is_reported() {
    let (url, server) = serve_once(
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
    );

    let err = fetcher().fetch(&url).unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 404, .. }), "{err}");
    server.join().unwrap();
}

#[test]
fn short_body_is_a_partial_transfer() {
    let mut response =
        b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n".to_vec();
    response.extend_from_slice(&[1u8; 10]);
    let (url, server) = serve_once(response);

    let err = fetcher().fetch(&url).unwrap_err();
    assert!(
        matches!(err, TransportError::Body { .. } | TransportError::Truncated { .. }),
        "{err}"
    );
    server.join().unwrap();
}

#[test]
fn refused_connection_is_a_request_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = Url::parse(&format!("http://127.0.0.1:{port}/base.bin")).unwrap();

    let err = fetcher().fetch(&url).unwrap_err();
    assert!(matches!(err, TransportError::Request { .. }), "{err}");
}
