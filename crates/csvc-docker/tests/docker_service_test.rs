//! Docker adapter tests against a scripted daemon on a Unix socket
//!
//! The daemon answers `/_ping` and replays a fixed build response, so the
//! whole path through bollard's typed feed and the event decoder runs
//! without a real engine.

#![cfg(unix)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use csvc_core::BuildEventRecord;
use csvc_docker::{
    BuildEngine, BuildRequest, DockerConfig, DockerError, DockerService, EventStreamDecoder,
};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// A request the daemon received
#[derive(Debug, Clone)]
struct Received {
    request_line: String,
    body: Vec<u8>,
}

struct FakeDaemon {
    _dir: TempDir,
    socket: PathBuf,
    received: Arc<Mutex<Vec<Received>>>,
}

impl FakeDaemon {
    /// Serve `body` with `status` for every build request
    fn start(status: u16, body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let reply = Arc::new((status, body.to_string()));
        let log = Arc::clone(&received);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let reply = Arc::clone(&reply);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = serve(stream, &reply, &log).await;
                });
            }
        });

        Self { _dir: dir, socket, received }
    }

    fn config(&self) -> DockerConfig {
        DockerConfig { socket_path: Some(self.socket.clone()), timeout: Duration::from_secs(5) }
    }

    fn build_requests(&self) -> Vec<Received> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.request_line.contains("/build"))
            .cloned()
            .collect()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Answer one HTTP request and close the connection
async fn serve(
    mut stream: UnixStream,
    reply: &(u16, String),
    log: &Mutex<Vec<Received>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next().unwrap_or_default().to_string();
    log.lock().unwrap().push(Received {
        request_line: request_line.clone(),
        body: buf[header_end..].to_vec(),
    });

    let (status, body) = if request_line.contains("/_ping") {
        (200, "OK".to_string())
    } else {
        reply.clone()
    };
    let reason = if status == 200 { "OK" } else { "Internal Server Error" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn request() -> BuildRequest {
    BuildRequest {
        tag: "owner/repo".to_string(),
        spec_file_name: "Dockerfile".to_string(),
        remove_intermediate: false,
    }
}

fn archive_with_dockerfile() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let content = b"FROM scratch";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, "Dockerfile", &content[..]).unwrap();
    builder.into_inner().unwrap()
}

async fn decode(daemon: &FakeDaemon) -> Vec<csvc_docker::Result<BuildEventRecord>> {
    let service = DockerService::new(&daemon.config()).await.unwrap();
    let body = service.build_image(&request(), archive_with_dockerfile()).await.unwrap();
    EventStreamDecoder::new(body).collect().await
}

#[tokio::test]
async fn test_progress_records_reach_decoder() {
    let daemon = FakeDaemon::start(
        200,
        concat!(
            "{\"stream\":\"Step 1/1 : FROM scratch\\n\"}\n",
            "{\"status\":\"Downloading\",\"id\":\"base\",\"progressDetail\":{\"current\":3,\"total\":9}}\n",
            "{\"aux\":{\"ID\":\"sha256:0123\"}}\n",
        ),
    );

    let records = decode(&daemon).await;

    assert_eq!(records.len(), 3);
    match &records[0] {
        Ok(BuildEventRecord::LogLine { text, .. }) => assert_eq!(text, "Step 1/1 : FROM scratch\n"),
        other => panic!("expected log line, got {other:?}"),
    }
    match &records[1] {
        Ok(BuildEventRecord::Structured { event, .. }) => {
            assert_eq!(event.id.as_deref(), Some("base"));
            assert_eq!(event.progress_detail.as_ref().and_then(|d| d.total), Some(9));
        }
        other => panic!("expected structured event, got {other:?}"),
    }
    match &records[2] {
        Ok(BuildEventRecord::Structured { event, .. }) => {
            assert_eq!(event.aux, Some(serde_json::json!({"ID": "sha256:0123"})));
        }
        other => panic!("expected aux event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_carries_tag_and_archive() {
    let daemon = FakeDaemon::start(200, "{\"stream\":\"done\\n\"}\n");

    let records = decode(&daemon).await;
    assert_eq!(records.len(), 1);

    let builds = daemon.build_requests();
    assert_eq!(builds.len(), 1);
    let line = &builds[0].request_line;
    assert!(line.starts_with("POST "));
    assert!(line.contains("t=owner%2Frepo"));
    assert!(line.contains("dockerfile=Dockerfile"));

    let mut archive = tar::Archive::new(builds[0].body.as_slice());
    let mut entries = archive.entries().unwrap();
    let mut entry = entries.next().unwrap().unwrap();
    assert_eq!(entry.path().unwrap().to_str(), Some("Dockerfile"));
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    assert_eq!(content, "FROM scratch");
}

#[tokio::test]
async fn test_engine_error_record_is_an_event() {
    let daemon = FakeDaemon::start(
        200,
        concat!(
            "{\"stream\":\"Step 1/2 : FROM alpine\\n\"}\n",
            "{\"errorDetail\":{\"code\":1,\"message\":\"RUN false returned a non-zero code: 1\"},",
            "\"error\":\"RUN false returned a non-zero code: 1\"}\n",
        ),
    );

    let records = decode(&daemon).await;

    assert_eq!(records.len(), 2);
    assert!(matches!(&records[0], Ok(BuildEventRecord::LogLine { .. })));
    match &records[1] {
        Ok(BuildEventRecord::Structured { event, .. }) => {
            assert_eq!(event.error_message(), Some("RUN false returned a non-zero code: 1"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_engine_error_as_first_record_is_not_a_rejection() {
    let daemon = FakeDaemon::start(200, "{\"error\":\"pull access denied for nope\"}\n");

    let records = decode(&daemon).await;

    assert_eq!(records.len(), 1);
    match &records[0] {
        Ok(BuildEventRecord::Structured { event, .. }) => {
            assert_eq!(event.error_message(), Some("pull access denied for nope"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mistyped_record_is_not_fatal() {
    let daemon = FakeDaemon::start(
        200,
        "{\"stream\":\"Step 1\\n\"}\n{\"status\":42}\n{\"stream\":\"after\\n\"}\n",
    );

    let records = decode(&daemon).await;

    assert!(records.iter().all(Result::is_ok), "unexpected error: {records:?}");
    assert!(matches!(&records[0], Ok(BuildEventRecord::LogLine { text, .. }) if text == "Step 1\n"));
    match &records[1] {
        Ok(BuildEventRecord::Unrecognized { raw, .. }) => {
            assert_eq!(raw.get("status"), Some(&serde_json::json!(42)));
        }
        other => panic!("expected unrecognized record, got {other:?}"),
    }
}

#[tokio::test]
async fn test_broken_framing_is_fatal() {
    let daemon = FakeDaemon::start(200, "{\"stream\":\"a\\n\"}\n{not json\n");

    let records = decode(&daemon).await;

    assert_eq!(records.len(), 2);
    assert!(records[0].is_ok());
    assert!(matches!(&records[1], Err(DockerError::Decode { records_processed: 1, .. })));
}

#[tokio::test]
async fn test_rejected_request() {
    let daemon = FakeDaemon::start(
        500,
        "{\"message\":\"dockerfile parse error line 1: unknown instruction: FORM\"}",
    );
    let service = DockerService::new(&daemon.config()).await.unwrap();

    match service.build_image(&request(), archive_with_dockerfile()).await {
        Err(DockerError::BuildFailed { reason }) => {
            assert!(reason.contains("unknown instruction: FORM"), "{reason}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("build request should be rejected"),
    };
}

#[tokio::test]
async fn test_missing_socket_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let config = DockerConfig {
        socket_path: Some(dir.path().join("absent.sock")),
        timeout: Duration::from_secs(1),
    };

    assert!(matches!(DockerService::new(&config).await, Err(DockerError::Unavailable { .. })));
}
