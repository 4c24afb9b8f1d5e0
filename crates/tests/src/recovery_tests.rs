use std::time::Duration;

use serde_json::Value;

use crate::fixtures::backends::{FakeChat, FakeSpeech};
use crate::fixtures::test_app::TestApp;
use crate::fixtures::wav_fixture;

#[tokio::test]
async fn llm_transient_outage_retries_and_completes() {
    // The first two Correct attempts see 503; the engine retries and the
    // job still completes.
    let app = TestApp::spawn_with(FakeSpeech::ok("一時障害テスト"), FakeChat::failing_first(2)).await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    app.wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;

    let logs: Value = app
        .client
        .get(app.url(&format!("/api/v1/transcriptions/{id}/logs")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = logs["data"].as_array().unwrap();

    let warns = entries
        .iter()
        .filter(|e| {
            e["level"] == "WARN"
                && e["message"].as_str().unwrap().contains("LLM_UNAVAILABLE")
        })
        .count();
    assert_eq!(warns, 2);
    assert!(entries
        .iter()
        .any(|e| e["level"] == "INFO" && e["message"] == "COMPLETED"));
}

#[tokio::test]
async fn exhausted_llm_outage_fails_with_error_code() {
    let app = TestApp::spawn_with(FakeSpeech::ok("恒久障害"), FakeChat::failing_first(20)).await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let failed = app
        .wait_for_status(&id, "FAILED", Duration::from_secs(60))
        .await;
    assert_eq!(failed["error_code"], "LLM_UNAVAILABLE");
    assert!(failed["error_message"].is_string());

    // Terminal state stays put on repeated reads.
    let again = app.get_job(&id).await;
    assert_eq!(again["data"]["status_code"], "FAILED");
    assert_eq!(again["data"]["progress"], failed["progress"]);
}

#[tokio::test]
async fn reprocess_restarts_a_failed_job_in_place() {
    // Three failing Correct attempts exhaust the retry budget and fail
    // the job; the outage is over by the time reprocess is requested.
    let app = TestApp::spawn_with(FakeSpeech::ok("再処理テスト"), FakeChat::failing_first(3)).await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let uuid = uuid::Uuid::parse_str(&id).unwrap();

    let failed = app
        .wait_for_status(&id, "FAILED", Duration::from_secs(60))
        .await;
    assert_eq!(failed["error_code"], "LLM_UNAVAILABLE");

    let raw_before = app.store.get_raw_transcript(&uuid).unwrap().unwrap();
    let speech_calls_before = app
        .speech
        .calls
        .load(std::sync::atomic::Ordering::SeqCst);

    let resp = app
        .client
        .post(app.url(&format!("/api/v1/transcriptions/{id}/reprocess")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status_code"], "UPLOADED");
    assert_eq!(body["data"]["progress"], 0);
    assert!(body["data"]["error_code"].is_null());

    let done = app
        .wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;
    assert_eq!(done["progress"], 100);

    // Transcription was not redone; the pipeline resumed at Correct.
    let raw_after = app.store.get_raw_transcript(&uuid).unwrap().unwrap();
    assert_eq!(raw_before.created_at, raw_after.created_at);
    assert_eq!(
        app.speech.calls.load(std::sync::atomic::Ordering::SeqCst),
        speech_calls_before
    );

    // Once completed, another reprocess is refused.
    let resp = app
        .client
        .post(app.url(&format!("/api/v1/transcriptions/{id}/reprocess")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn reprocess_unknown_job_is_404() {
    let app = TestApp::spawn().await;
    let resp = app
        .client
        .post(app.url(&format!(
            "/api/v1/transcriptions/{}/reprocess",
            uuid::Uuid::new_v4()
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn engine_restart_mid_correct_resumes_to_completion() {
    // The first Correct call hangs; killing the engine mid-call mimics a
    // crash between the Transcribe and Correct stages.
    let mut app = TestApp::spawn_with(
        FakeSpeech::ok("クラッシュ復旧テスト"),
        FakeChat::stalling_first(1),
    )
    .await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let uuid = uuid::Uuid::parse_str(&id).unwrap();

    app.wait_for_status(&id, "CORRECTING", Duration::from_secs(10))
        .await;
    let raw_before = app.store.get_raw_transcript(&uuid).unwrap().unwrap();
    let speech_calls_before = app
        .speech
        .calls
        .load(std::sync::atomic::Ordering::SeqCst);

    app.restart_engine();

    let done = app
        .wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;
    assert_eq!(done["progress"], 100);

    // The transcript row survived untouched and Whisper did not run again.
    let raw_after = app.store.get_raw_transcript(&uuid).unwrap().unwrap();
    assert_eq!(raw_before.created_at, raw_after.created_at);
    assert_eq!(raw_before.text, raw_after.text);
    assert_eq!(
        app.speech.calls.load(std::sync::atomic::Ordering::SeqCst),
        speech_calls_before
    );

    // A fresh corrected transcript exists.
    assert!(app.store.get_corrected_transcript(&uuid).unwrap().is_some());
}
