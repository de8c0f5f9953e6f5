//! Loopback HTTP fixture server for integration tests

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use netpack_http::UrlFetcher;
use reqwest::blocking::Client;

/// A canned response
#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub body: String,
}

pub fn ok(body: &str) -> Route {
    Route {
        status: 200,
        body: body.to_string(),
    }
}

pub fn status(status: u16, body: &str) -> Route {
    Route {
        status,
        body: body.to_string(),
    }
}

/// Serves fixed routes on 127.0.0.1 until the test process exits
pub struct FixtureServer {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub fn start(routes: &[(&str, Route)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: HashMap<String, Route> = routes
            .iter()
            .map(|(path, route)| (path.to_string(), route.clone()))
            .collect();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                handle(stream, &routes, &log);
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Paths requested so far, in order
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    log: &Mutex<Vec<String>>,
) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).ok()? == 0 || header == "\r\n" {
            break;
        }
    }

    let path = request_line.split_whitespace().nth(1)?.to_string();
    let route = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| status(404, "<h1>404 Not Found</h1>"));
    log.lock().unwrap().push(path);
    let response = format!(
        "HTTP/1.1 {} Fixture\r\nContent-Type: text/javascript\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        route.status,
        route.body.len(),
        route.body
    );
    stream.write_all(response.as_bytes()).ok()
}

/// An address nothing listens on
pub fn unreachable_url(path: &str) -> String {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    format!("http://{addr}{path}")
}

/// Fetcher that never goes through an environment proxy
pub fn fetcher() -> UrlFetcher {
    UrlFetcher::with_client(Client::builder().no_proxy().build().unwrap())
}
