//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use openapi_mockserver::config::ServerConfig;
use openapi_mockserver::engine::HttpMockEngine;
use openapi_mockserver::{HandlerRegistry, HttpServer, Shutdown};

/// What the fake engine answers.
pub struct EngineReply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl EngineReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.to_string(),
        }
    }
}

/// Request lines (`GET /path HTTP/1.1`) seen by the fake engine.
pub type Seen = Arc<Mutex<Vec<String>>>;

/// Start a programmable fake contract-mock engine on an ephemeral port.
pub async fn start_fake_engine<F>(f: F) -> (SocketAddr, Seen)
where
    F: Fn(&str) -> EngineReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }

                        let head = String::from_utf8_lossy(&buf).to_string();
                        let request_line = head.lines().next().unwrap_or_default().to_string();
                        let target = request_line.split(' ').nth(1).unwrap_or("/").to_string();
                        recorded.lock().unwrap().push(request_line);

                        let reply = f(&target);
                        let mut response = format!("HTTP/1.1 {} Mock\r\n", reply.status);
                        for (name, value) in &reply.headers {
                            response.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        response.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            reply.body.len(),
                            reply.body
                        ));

                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

/// A running mock server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.addr.port(), path)
    }
}

/// Start the mock server in front of the engine at `engine_addr`.
pub async fn start_server(registry: Option<HandlerRegistry>, engine_addr: SocketAddr) -> TestServer {
    start_server_with(registry, engine_addr, |_| {}).await
}

/// Like [`start_server`], with a hook to adjust the configuration.
pub async fn start_server_with<F>(
    registry: Option<HandlerRegistry>,
    engine_addr: SocketAddr,
    configure: F,
) -> TestServer
where
    F: FnOnce(&mut ServerConfig),
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ServerConfig {
        openapi_url: "openapi.yaml".into(),
        ..ServerConfig::default()
    };
    config.listener.port = addr.port();
    config.engine.url = format!("http://{}", engine_addr);
    config.engine.timeout_secs = 5;
    configure(&mut config);

    let engine = HttpMockEngine::new(&config.engine).unwrap();
    let server = HttpServer::new(config, registry, Arc::new(engine)).unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestServer { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
