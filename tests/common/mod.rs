//! Shared fixtures: SQLite store files and a blocking HTTP stub server
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use rusqlite::Connection;

use cardscry::store::vec_f32_to_bytes;

/// Write a store file with the standard `cards` table
pub fn write_store(path: &Path, cards: &[(i64, &str, Vec<f32>)]) {
    let conn = Connection::open(path).expect("create fixture store");
    conn.execute(
        "CREATE TABLE cards (nid INTEGER PRIMARY KEY, content TEXT, embedding BLOB)",
        [],
    )
    .expect("create cards table");
    for (nid, content, embedding) in cards {
        conn.execute(
            "INSERT INTO cards (nid, content, embedding) VALUES (?1, ?2, ?3)",
            rusqlite::params![nid, content, vec_f32_to_bytes(embedding)],
        )
        .expect("insert card");
    }
}

/// One request as seen by the stub server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

type Responder = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

/// Blocking HTTP/1.1 server answering one request per connection
///
/// The accept loop runs on a detached thread for the rest of the test binary.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub fn start(responder: impl Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let responder: Arc<Responder> = Arc::new(responder);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                handle(stream, &*responder, &recorded);
            }
        });

        Self { base_url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

fn handle(mut stream: TcpStream, responder: &Responder, recorded: &Mutex<Vec<RecordedRequest>>) {
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let (status, body) = responder(&request);
    recorded.lock().unwrap().push(request);

    let head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body.as_bytes());
    let _ = stream.flush();
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream);

    let mut head = Vec::new();
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).ok()? == 0 {
            return None;
        }
        head.extend_from_slice(&line);
        if line == b"\r\n" {
            break;
        }
    }

    let mut parsed_headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut parsed_headers);
    match req.parse(&head) {
        Ok(httparse::Status::Complete(_)) => {}
        _ => return None,
    }

    let headers: Vec<(String, String)> = req
        .headers
        .iter()
        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    // Exactly Content-Length bytes: the client keeps the socket open
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;

    Some(RecordedRequest {
        method: req.method.unwrap_or("").to_string(),
        path: req.path.unwrap_or("/").to_string(),
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// A listener that accepts TCP connections but never answers
///
/// Keep the returned listener alive for the duration of the test.
pub fn silent_endpoint() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind silent listener");
    let url = format!("http://{}", listener.local_addr().expect("local addr"));
    (listener, url)
}

/// An address nothing listens on
pub fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("local addr"));
    drop(listener);
    url
}
