use std::sync::Arc;
use std::time::Duration;

use clockex_capture::{
    AudioBlob, AudioUpload, CaptureSession, FinishOutcome, HttpTimeSource, HttpUploadSink,
    InteractionLog, UploadError, UploadSink,
};
use clockex_core::{EventPayload, RunLabel, SessionMeta};
use clockex_timing::{ManualClock, SyncError, TimeSource};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn timeout() -> Option<Duration> {
    Some(Duration::from_secs(5))
}

#[tokio::test]
async fn json_upload_posts_filename_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/save_text"))
        .and(body_partial_json(json!({ "filename": "alice_A_set1_x.json" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "filename": "alice_A_set1_x.json",
            "bytes": 42,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = HttpUploadSink::new(format!("{}/save_text", server.uri()), timeout()).unwrap();
    let receipt = sink
        .upload_json("alice_A_set1_x.json", &json!({ "meta": {}, "timeline": [] }))
        .await
        .unwrap();
    assert_eq!(receipt.bytes, Some(42));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["payload"], json!({ "meta": {}, "timeline": [] }));
}

#[tokio::test]
async fn ok_false_is_reported_as_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": "bad name" })))
        .mount(&server)
        .await;

    let sink = HttpUploadSink::new(server.uri(), timeout()).unwrap();
    let err = sink.upload_json("x.json", &json!({})).await.unwrap_err();
    assert!(matches!(err, UploadError::Rejected(msg) if msg == "bad name"));
}

#[tokio::test]
async fn audio_upload_is_multipart_with_metadata_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = HttpUploadSink::new(format!("{}/upload_audio", server.uri()), timeout()).unwrap();
    let upload = AudioUpload {
        blob: AudioBlob {
            bytes: b"OggS-clip".to_vec(),
            mime: "audio/webm".into(),
        },
        filename: "alice_A_set1_20250101_000000.webm".into(),
        participant: Some("alice".into()),
        set: Some(1),
        session_id: None,
        run_label: Some(RunLabel::A),
    };
    sink.upload_audio(&upload).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="audio"; filename="alice_A_set1_20250101_000000.webm""#));
    assert!(body.contains(r#"name="participant""#));
    assert!(body.contains(r#"name="runLabel""#));
    assert!(body.contains("OggS-clip"));
}

#[tokio::test]
async fn time_source_reads_integer_and_fractional_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/time"))
        .and(header("cache-control", "no-store"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "server_time_ms": 1_700_000_000_123.6 })))
        .mount(&server)
        .await;

    let source = HttpTimeSource::new(format!("{}/time", server.uri()), timeout()).unwrap();
    assert_eq!(source.server_time_ms().await.unwrap(), 1_700_000_000_124);
}

#[tokio::test]
async fn time_source_without_timestamp_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "now": 1 })))
        .mount(&server)
        .await;

    let source = HttpTimeSource::new(server.uri(), timeout()).unwrap();
    assert!(matches!(source.server_time_ms().await, Err(SyncError::MissingTimestamp)));
}

#[tokio::test]
async fn unreachable_time_endpoint_leaves_session_unsynced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/time"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/save_log"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::at(1_000);
    let sink = HttpUploadSink::new(format!("{}/save_log", server.uri()), timeout()).unwrap();
    let source = HttpTimeSource::new(format!("{}/time", server.uri()), timeout()).unwrap();
    let mut session = CaptureSession::new(Box::new(InteractionLog::new()), Arc::new(clock.clone()), Arc::new(sink))
        .with_time_source(Arc::new(source));

    session.begin(SessionMeta::for_set("alice", 1, RunLabel::Check)).await;
    assert!(session.is_active());
    assert!(session.clock_offset().is_none());

    clock.advance(10);
    session.push("CUE", EventPayload::new());
    let outcome = session.finish().await;
    assert!(matches!(outcome, FinishOutcome::Uploaded { .. }));

    let requests = server.received_requests().await.unwrap();
    let upload = requests.iter().find(|r| r.url.path() == "/save_log").unwrap();
    let body: Value = serde_json::from_slice(&upload.body).unwrap();
    assert!(body["payload"]["timeline"][0]["abs_ms"].is_null());
    assert_eq!(body["payload"]["timeline"][0]["t_ms"], 10);
    assert!(body["filename"].as_str().unwrap().starts_with("alice_check_set1_"));
}
