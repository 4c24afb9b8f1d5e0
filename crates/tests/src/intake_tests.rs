use std::time::Duration;

use serde_json::Value;

use crate::fixtures::backends::{FakeChat, FakeSpeech};
use crate::fixtures::test_app::TestApp;
use crate::fixtures::wav_fixture;

#[tokio::test]
async fn oversized_upload_is_413_and_creates_no_job() {
    let app = TestApp::spawn().await;
    let before = app.job_count().await;

    // One byte over the 50 MiB cap. The content never gets as far as
    // sniffing, so zeroes are fine.
    let bytes = vec![0u8; 52_428_801];
    let resp = app.upload("big.wav", "audio/wav", bytes, "meeting").await;
    assert_eq!(resp.status().as_u16(), 413);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FILE_TOO_LARGE");

    assert_eq!(app.job_count().await, before);
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let app = TestApp::spawn().await;

    let resp = app.upload("empty.wav", "audio/wav", Vec::new(), "meeting").await;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "EMPTY_FILE");
}

#[tokio::test]
async fn wrong_extension_is_415() {
    let app = TestApp::spawn().await;

    let resp = app
        .upload("notes.txt", "audio/wav", wav_fixture(0.2), "meeting")
        .await;
    assert_eq!(resp.status().as_u16(), 415);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn content_not_matching_extension_is_415() {
    let app = TestApp::spawn().await;

    // .mp3 extension but the bytes are a WAV file.
    let resp = app
        .upload("song.mp3", "audio/mpeg", wav_fixture(0.2), "meeting")
        .await;
    assert_eq!(resp.status().as_u16(), 415);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn declared_mime_is_normalized_on_the_stored_job() {
    for declared in ["audio/wave", "audio/x-wav"] {
        let app = TestApp::spawn().await;
        let resp = app
            .upload("meeting.wav", declared, wav_fixture(0.2), "meeting")
            .await;
        assert_eq!(resp.status().as_u16(), 201, "declared {declared}");

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["mime_type"], "audio/wav", "declared {declared}");
    }
}

#[tokio::test]
async fn duplicate_upload_while_active_returns_same_job() {
    // A slow transcription keeps the first job active while the second
    // upload arrives.
    let app = TestApp::spawn_with(
        FakeSpeech::slow("重複テスト", Duration::from_millis(800)),
        FakeChat::ok(),
    )
    .await;

    let bytes = wav_fixture(0.3);

    let first: Value = app
        .upload("meeting.wav", "audio/wav", bytes.clone(), "meeting")
        .await
        .json()
        .await
        .unwrap();
    let second: Value = app
        .upload("meeting.wav", "audio/wav", bytes, "meeting")
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(first["data"]["id"], second["data"]["id"]);
    assert_eq!(app.job_count().await, 1);
}
