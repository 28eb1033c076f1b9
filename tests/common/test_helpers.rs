//! Test helper functions and utilities

use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cons3rt_kit::application::services::IpAddressSource;
use cons3rt_kit::domain::value_objects::{CommandResult, CommandSpec};
use cons3rt_kit::infrastructure::process::CommandRunner;
use cons3rt_kit::Result;

/// A request as seen by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub body: String,
}

/// Serves canned HTTP responses in order, one per connection.
pub struct HttpStub {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl HttpStub {
    pub fn start(responses: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let mut responses: VecDeque<Vec<u8>> = responses.into();

        std::thread::spawn(move || {
            while let Some(response) = responses.pop_front() {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                if let Some(request) = read_request(&mut stream) {
                    recorded.lock().unwrap().push(request);
                }
                let _ = stream.write_all(&response);
                let _ = stream.flush();
            }
        });

        Self { port, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(RecordedRequest {
        method,
        target,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

pub fn http_status(code: u16, reason: &str) -> Vec<u8> {
    format!("HTTP/1.1 {code} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .into_bytes()
}

pub fn http_ok(body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

pub fn http_redirect(location: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
    .into_bytes()
}

/// Fixed device-to-IP map standing in for `ifconfig`.
pub struct StaticIpSource(pub BTreeMap<String, String>);

impl StaticIpSource {
    pub fn eth0(ip: &str) -> Self {
        Self(BTreeMap::from([("eth0".to_string(), ip.to_string())]))
    }
}

#[async_trait]
impl IpAddressSource for StaticIpSource {
    async fn ip_addresses(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.0.clone())
    }
}

/// [`CommandRunner`] that records each command line and returns a fixed result.
pub struct RecordingRunner {
    exit_code: i32,
    output: String,
    commands: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn returning(exit_code: i32, output: &str) -> Self {
        Self {
            exit_code,
            output: output.to_string(),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::returning(0, "")
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        self.commands.lock().unwrap().push(spec.command_line());
        Ok(CommandResult::new(self.exit_code, self.output.clone()))
    }
}
