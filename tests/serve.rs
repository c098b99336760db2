//! End-to-end requests against a running `devroute`

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

struct Server {
    child: Child,
    port: u16,
    _public: tempfile::TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn start(entry: &str, prefix: &str) -> Server {
    let public = tempfile::tempdir().unwrap();
    std::fs::write(public.path().join("app.css"), "h1{}").unwrap();
    let port = free_port();

    let child = Command::new(env!("CARGO_BIN_EXE_devroute"))
        .arg("--config")
        .arg(public.path().join("absent"))
        .args(["--entry", entry, "--host", "127.0.0.1"])
        .arg("--static-dir")
        .arg(public.path())
        .env("PORT", port.to_string())
        .env("SERVICE_ROUTE_PREFIX", prefix)
        .env("SERVICE_ROUTE_PREFIX_STRIP", "1")
        .env("NO_COLOR", "1")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let server = Server {
        child,
        port,
        _public: public,
    };
    wait_until_listening(port);
    server
}

fn wait_until_listening(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("server did not start on port {port}");
}

/// Send one request and return (status, body)
fn get(server: &Server, method: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(("127.0.0.1", server.port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    write!(
        stream,
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
    .unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    (status, body.to_string())
}

#[test]
fn sync_app_behind_prefix() {
    let server = start("main", "/svc");

    // Static file under the prefix
    let (status, body) = get(&server, "GET", "/svc/app.css");
    assert_eq!(status, 200);
    assert_eq!(body, "h1{}");

    // Dynamic route with the prefix stripped
    let (status, body) = get(&server, "GET", "/svc/items");
    assert_eq!(status, 200);
    assert!(body.contains(r#""path":"/items""#), "body: {body}");
    assert!(body.contains(r#""root_path":"/svc""#), "body: {body}");

    // Outside the prefix
    let (_, body) = get(&server, "GET", "/other");
    assert!(body.contains(r#""path":"/other""#), "body: {body}");
    assert!(body.contains(r#""root_path":"""#), "body: {body}");
}

#[test]
fn async_app_with_lifespan() {
    let server = start("hello_async", "/svc");

    let (status, body) = get(&server, "GET", "/svc/app.css");
    assert_eq!(status, 200);
    assert_eq!(body, "h1{}");

    let (status, body) = get(&server, "POST", "/svc/items");
    assert_eq!(status, 200);
    assert!(body.contains(r#""convention":"async""#), "body: {body}");
    assert!(body.contains(r#""path":"/items""#), "body: {body}");
}

#[test]
fn traversal_does_not_escape_static_dir() {
    let server = start("main", "");
    let (status, body) = get(&server, "GET", "/../../etc/passwd");
    // Falls through to the application
    assert_eq!(status, 200);
    assert!(body.contains(r#""convention":"sync""#), "body: {body}");
}
