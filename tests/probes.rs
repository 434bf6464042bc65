//! Probe behavior against a mock LibreSpeed backend.

use std::time::Duration;

use librespeed_monitor::client::Client;
use librespeed_monitor::config::{ServerConfig, TestSettings};
use librespeed_monitor::error::SpeedtestError;
use librespeed_monitor::result::ProbeOutcome;
use librespeed_monitor::{download, info, ping, upload};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const GARBAGE: &str = "/backend/garbage.php";
const EMPTY: &str = "/backend/empty.php";
const GET_IP: &str = "/backend/getIP.php";

fn settings() -> TestSettings {
    TestSettings {
        download_size_mb: 1,
        upload_size_mb: 0.01,
        small_upload_size_mb: 0.001,
        ping_count: 4,
        download_timeout_secs: 5,
        upload_timeout_secs: 5,
        ping_timeout_secs: 2,
    }
}

fn client_for(server: &MockServer) -> Client {
    Client::new(&ServerConfig::new(server.uri())).unwrap()
}

fn large_body(req: &Request) -> bool {
    req.body.len() > 5000
}

fn small_body(req: &Request) -> bool {
    req.body.len() <= 5000
}

#[tokio::test]
async fn download_reads_whole_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GARBAGE))
        .and(query_param("ckSize", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1 << 20]))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = download::run(&client_for(&server), &settings())
        .await
        .unwrap();

    assert!(!outcome.is_partial());
    assert!(*outcome.value() > 0.0);
    assert!(outcome.value().is_finite());
}

#[tokio::test]
async fn download_without_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GARBAGE))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024])
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let settings = TestSettings {
        download_timeout_secs: 1,
        ..settings()
    };
    let err = download::run(&client_for(&server), &settings)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SpeedtestError::Timeout {
            operation: "download",
            ..
        }
    ));
}

#[tokio::test]
async fn download_error_status_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GARBAGE))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = download::run(&client_for(&server), &settings())
        .await
        .unwrap_err();
    assert!(matches!(err, SpeedtestError::Http(_)));
}

#[tokio::test]
async fn download_empty_body_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GARBAGE))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = download::run(&client_for(&server), &settings())
        .await
        .unwrap_err();
    assert!(matches!(err, SpeedtestError::NoData("download")));
}

/// What a hand-rolled backend does after sending part of the body.
#[derive(Clone, Copy)]
enum AfterSome {
    Stall,
    Hangup,
}

/// Serve one download that promises 100 MiB, sends `sent` bytes, and then
/// stalls or hangs up.
async fn truncated_backend(sent: usize, after: AfterSome) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            head.extend_from_slice(&buf[..n]);
        }

        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
            100 * 1024 * 1024
        );
        socket.write_all(header.as_bytes()).await.unwrap();
        socket.write_all(&vec![0u8; sent]).await.unwrap();
        socket.flush().await.unwrap();

        match after {
            AfterSome::Stall => tokio::time::sleep(Duration::from_secs(30)).await,
            AfterSome::Hangup => drop(socket),
        }
    });

    format!("http://{addr}/")
}

#[tokio::test]
async fn download_stalled_midway_keeps_partial_speed() {
    let url = truncated_backend(500_000, AfterSome::Stall).await;
    let client = Client::new(&ServerConfig::new(url)).unwrap();
    let settings = TestSettings {
        download_timeout_secs: 1,
        ..settings()
    };

    let outcome = download::run(&client, &settings).await.unwrap();

    assert!(outcome.is_partial());
    assert!(*outcome.value() > 0.0);
    let note = outcome.note().unwrap();
    assert!(note.contains("timed out"), "{note}");
}

#[tokio::test]
async fn download_cut_off_midway_keeps_partial_speed() {
    let url = truncated_backend(200_000, AfterSome::Hangup).await;
    let client = Client::new(&ServerConfig::new(url)).unwrap();

    let outcome = download::run(&client, &settings()).await.unwrap();

    assert!(outcome.is_partial());
    assert!(*outcome.value() > 0.0);
    let note = outcome.note().unwrap();
    assert!(note.contains("interrupted"), "{note}");
}

#[tokio::test]
async fn upload_full_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .and(header("content-type", "application/octet-stream"))
        .and(large_body)
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = upload::run(&client_for(&server), &settings())
        .await
        .unwrap();
    assert!(matches!(outcome, ProbeOutcome::Complete(speed) if speed > 0.0));
}

#[tokio::test]
async fn upload_falls_back_to_small_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .and(large_body)
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .and(small_body)
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = upload::run(&client_for(&server), &settings())
        .await
        .unwrap();

    assert!(outcome.is_partial());
    assert!(outcome.note().unwrap().contains("reduced"));
    assert!(*outcome.value() > 0.0);
}

#[tokio::test]
async fn upload_reports_full_size_error_when_both_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .and(large_body)
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .and(small_body)
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = upload::run(&client_for(&server), &settings())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("500"), "{message}");
    assert!(!message.contains("503"), "{message}");
}

#[tokio::test]
async fn ping_measures_every_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&server)
        .await;

    let outcome = ping::run(&client_for(&server), &settings())
        .await
        .unwrap();

    assert!(!outcome.is_partial());
    assert!(outcome.value().ping_ms >= 0.0);
    assert!(outcome.value().jitter_ms >= 0.0);
}

#[tokio::test]
async fn ping_aborts_after_too_many_failures() {
    let server = MockServer::start().await;
    // floor(10/2) = 5 failures are tolerated; the sixth stops the series
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .respond_with(ResponseTemplate::new(500))
        .expect(6)
        .mount(&server)
        .await;

    let settings = TestSettings {
        ping_count: 10,
        ..settings()
    };
    let err = ping::run(&client_for(&server), &settings)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SpeedtestError::PingThreshold {
            failed: 6,
            count: 10
        }
    ));
}

#[tokio::test]
async fn ping_round_trip_timeout_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMPTY))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let settings = TestSettings {
        ping_count: 1,
        ping_timeout_secs: 1,
        ..settings()
    };
    let err = ping::run(&client_for(&server), &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, SpeedtestError::PingThreshold { failed: 1, count: 1 }));
}

#[tokio::test]
async fn requests_carry_basic_auth_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GET_IP))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(|req: &Request| {
            req.headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ua| ua.starts_with("LibreSpeed-Test-Script/1.0"))
        })
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"processedString": "127.0.0.1 - localhost"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ServerConfig {
        username: Some("user".into()),
        password: Some("pass".into()),
        ..ServerConfig::new(server.uri())
    };
    let info = info::fetch(&Client::new(&config).unwrap()).await.unwrap();

    assert_eq!(info::processed_string(&info), Some("127.0.0.1 - localhost"));
}

#[tokio::test]
async fn blank_password_sends_no_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GET_IP))
        .and(|req: &Request| !req.headers.contains_key("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ServerConfig {
        username: Some("user".into()),
        password: Some(String::new()),
        ..ServerConfig::new(server.uri())
    };
    let info = info::fetch(&Client::new(&config).unwrap()).await.unwrap();
    assert_eq!(info, serde_json::json!({}));
}
