use std::time::Duration;

use serde_json::Value;

use crate::fixtures::backends::{FakeChat, FakeSpeech};
use crate::fixtures::test_app::TestApp;
use crate::fixtures::wav_fixture;

#[tokio::test]
async fn cancel_mid_transcribe_reaches_cancelled_without_results() {
    let app = TestApp::spawn_with(
        FakeSpeech::slow("1分の音声", Duration::from_millis(800)),
        FakeChat::ok(),
    )
    .await;

    let resp = app
        .upload("long.wav", "audio/wav", wav_fixture(1.0), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    app.wait_for_status(&id, "TRANSCRIBING", Duration::from_secs(10))
        .await;

    let resp = app
        .client
        .delete(app.url(&format!("/api/v1/transcriptions/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let cancelled = app
        .wait_for_status(&id, "CANCELLED", Duration::from_secs(10))
        .await;
    assert!(cancelled["completed_at"].is_string());

    // No summary is ever written for a cancelled job.
    let resp = app
        .client
        .get(app.url(&format!("/api/v1/transcriptions/{id}/summary")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let uuid = uuid::Uuid::parse_str(&id).unwrap();
    assert!(app.store.get_summary(&uuid).unwrap().is_none());
    assert!(app.store.get_raw_transcript(&uuid).unwrap().is_none());

    // A second DELETE is still 200.
    let resp = app
        .client
        .delete(app.url(&format!("/api/v1/transcriptions/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn cancel_before_claim_is_immediate() {
    // A stalled first chat call keeps the single worker busy so a second
    // job stays in UPLOADED.
    let app = TestApp::spawn_with(
        FakeSpeech::ok("先行ジョブ"),
        FakeChat::stalling_first(1),
    )
    .await;

    let first: Value = app
        .upload("first.wav", "audio/wav", wav_fixture(0.2), "meeting")
        .await
        .json()
        .await
        .unwrap();
    let first_id = first["data"]["id"].as_str().unwrap().to_string();
    app.wait_for_status(&first_id, "CORRECTING", Duration::from_secs(10))
        .await;

    let second: Value = app
        .upload("second.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await
        .json()
        .await
        .unwrap();
    let second_id = second["data"]["id"].as_str().unwrap().to_string();

    let resp = app
        .client
        .delete(app.url(&format!("/api/v1/transcriptions/{second_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // Cancelled on the spot, before any worker touched it.
    let body = app.get_job(&second_id).await;
    assert_eq!(body["data"]["status_code"], "CANCELLED");
    assert_eq!(body["data"]["progress"], 0);
}

#[tokio::test]
async fn cancel_of_completed_job_keeps_it_completed() {
    let app = TestApp::spawn().await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    app.wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;

    for _ in 0..3 {
        let resp = app
            .client
            .delete(app.url(&format!("/api/v1/transcriptions/{id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let body = app.get_job(&id).await;
    assert_eq!(body["data"]["status_code"], "COMPLETED");
    assert_eq!(body["data"]["progress"], 100);
}

#[tokio::test]
async fn cancel_unknown_job_is_404() {
    let app = TestApp::spawn().await;
    let resp = app
        .client
        .delete(app.url(&format!(
            "/api/v1/transcriptions/{}",
            uuid::Uuid::new_v4()
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
