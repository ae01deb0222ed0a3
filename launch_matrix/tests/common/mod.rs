//! Shared helpers for the integration-test suite: in-memory launchers and
//! strategies with observable counters, plus a tiny HTTP responder.
#![allow(dead_code)]

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use launch_matrix::*;

/// Launcher whose port is set by the test and whose destroy calls are counted.
#[derive(Debug)]
pub struct StubLauncher {
    working_dir: PathBuf,
    port: AtomicU16,
    started: AtomicBool,
    destroyed: AtomicBool,
    pub destroy_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    fail_destroy: bool,
}

impl StubLauncher {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            port: AtomicU16::new(0),
            started: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            destroy_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            fail_destroy: false,
        }
    }

    pub fn failing(working_dir: &Path) -> Self {
        Self {
            fail_destroy: true,
            ..Self::new(working_dir)
        }
    }

    /// Simulate the server announcing its listening port.
    pub fn announce(&self, port: u16) {
        self.port.store(port, Ordering::SeqCst);
    }

    pub fn destroy_count(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }
}

impl Launcher for StubLauncher {
    fn start(&self) -> MatrixResult<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(MatrixError::LauncherDestroyed {
                working_dir: self.working_dir.clone(),
            });
        }
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn http_port(&self) -> Option<u16> {
        if self.destroyed.load(Ordering::SeqCst) {
            return None;
        }
        match self.port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(port),
        }
    }

    fn state(&self) -> LauncherState {
        if self.destroyed.load(Ordering::SeqCst) {
            LauncherState::Destroyed
        } else if let Some(port) = self.http_port() {
            LauncherState::PortKnown(port)
        } else if self.started.load(Ordering::SeqCst) {
            LauncherState::Started
        } else {
            LauncherState::Unstarted
        }
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn destroy(&self) -> MatrixResult<()> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.destroyed.store(true, Ordering::SeqCst);
        if self.fail_destroy {
            return Err(MatrixError::Internal("process refused to stop".into()));
        }
        Ok(())
    }
}

/// Strategy handing out [`StubLauncher`]s and remembering every one it built.
#[derive(Debug, Clone)]
pub struct StubStrategy {
    kind: &'static str,
    description: &'static str,
    fail_destroy: bool,
    delay: Duration,
    pub built: Arc<Mutex<Vec<Arc<StubLauncher>>>>,
}

impl StubStrategy {
    pub fn new(kind: &'static str, description: &'static str) -> Self {
        Self {
            kind,
            description,
            fail_destroy: false,
            delay: Duration::ZERO,
            built: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every launcher of this strategy fails to destroy.
    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    /// Slow construction, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn constructions(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    pub fn launchers(&self) -> Vec<Arc<StubLauncher>> {
        self.built.lock().unwrap().clone()
    }
}

impl LauncherStrategy for StubStrategy {
    fn kind(&self) -> LauncherStrategyKind {
        self.kind.into()
    }

    fn describe(&self, packaging: Packaging) -> String {
        format!("{} {packaging}", self.description)
    }

    fn create(
        &self,
        _descriptor: ApplicationDescriptor,
        working_dir: &Path,
    ) -> MatrixResult<SharedLauncher> {
        std::thread::sleep(self.delay);
        let launcher = Arc::new(if self.fail_destroy {
            StubLauncher::failing(working_dir)
        } else {
            StubLauncher::new(working_dir)
        });
        self.built.lock().unwrap().push(launcher.clone());
        Ok(launcher)
    }
}

/// Orchestrator with a private temp parent, so tests never share directories.
pub fn orchestrator(registry: LauncherRegistry, parent: &Path) -> MatrixOrchestrator {
    init_test_logging();
    let config = MatrixConfig::builder()
        .temp_parent(parent.to_path_buf())
        .retry(RetryPolicy::new(20, Duration::from_millis(50)))
        .request_timeout(Duration::from_secs(5))
        .build();
    MatrixOrchestrator::new(registry, config).expect("orchestrator")
}

/// Bind an ephemeral port on loopback without serving anything yet.
pub fn reserve_listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").expect("bind loopback")
}

/// One request as seen by the test server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read one full HTTP/1.1 request (request line, headers, sized body).
pub fn read_request(stream: &TcpStream) -> CapturedRequest {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut line = String::new();
    reader.read_line(&mut line).expect("read request");
    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).expect("read header");
        if header == "\r\n" || header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0usize);
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("read body");

    CapturedRequest {
        line: line.trim_end().to_string(),
        headers,
        body,
    }
}

/// Answer `requests` HTTP requests on `listener` with `status` and `body`,
/// then stop. Returns every request received.
pub fn serve_requests(
    listener: TcpListener,
    requests: usize,
    status: u16,
    body: &'static str,
) -> JoinHandle<Vec<CapturedRequest>> {
    std::thread::spawn(move || {
        let mut seen = Vec::new();
        for stream in listener.incoming().take(requests) {
            let mut stream = stream.expect("accept");
            seen.push(read_request(&stream));
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            stream.flush().expect("flush");
        }
        seen
    })
}

/// [`serve_requests`] reduced to the request lines.
pub fn serve(
    listener: TcpListener,
    requests: usize,
    status: u16,
    body: &'static str,
) -> JoinHandle<Vec<String>> {
    let handle = serve_requests(listener, requests, status, body);
    std::thread::spawn(move || {
        handle
            .join()
            .expect("server thread")
            .into_iter()
            .map(|r| r.line)
            .collect()
    })
}

/// Read every request that arrives within `window`, then close the socket
/// without answering. Returns the request lines.
pub fn hang_up_after_reading(listener: TcpListener, window: Duration) -> JoinHandle<Vec<String>> {
    std::thread::spawn(move || {
        listener.set_nonblocking(true).expect("nonblocking listener");
        let deadline = Instant::now() + window;
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            match listener.accept() {
                Ok((stream, _)) => {
                    stream.set_nonblocking(false).expect("blocking stream");
                    seen.push(read_request(&stream).line);
                    drop(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => panic!("accept failed: {e}"),
            }
        }
        seen
    })
}

/// Client for `launcher` that talks to loopback explicitly.
pub fn loopback_client(launcher: SharedLauncher) -> LauncherClient {
    LauncherClient::new(launcher, RetryPolicy::new(20, Duration::from_millis(50)))
        .with_host("127.0.0.1")
        .with_timeout(Duration::from_secs(5))
}
