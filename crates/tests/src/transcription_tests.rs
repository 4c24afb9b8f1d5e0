use std::time::Duration;

use serde_json::Value;

use crate::fixtures::test_app::TestApp;
use crate::fixtures::wav_fixture;

#[tokio::test]
async fn upload_returns_created_job_envelope() {
    let app = TestApp::spawn().await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.5), "meeting")
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].is_string());

    // The response reflects the freshly created job, before any worker
    // picked it up.
    let data = &body["data"];
    assert!(data["id"].is_string());
    assert_eq!(data["original_filename"], "meeting.wav");
    assert_eq!(data["mime_type"], "audio/wav");
    assert_eq!(data["usage_type"], "meeting");
    assert_eq!(data["status_code"], "UPLOADED");
    assert_eq!(data["progress"], 0);
}

#[tokio::test]
async fn happy_path_runs_to_completed_summary() {
    let app = TestApp::spawn().await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.5), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let done = app
        .wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;
    assert_eq!(done["progress"], 100);
    assert!(done["completed_at"].is_string());
    assert_eq!(done["transcription_result"]["text"], "これはテストです");
    assert!(done["transcription_result"]["corrected_text"]
        .as_str()
        .unwrap()
        .contains("これはテストです"));
    assert!(done["audio"]["duration_seconds"].as_f64().unwrap() > 0.0);

    let summary: Value = app
        .client
        .get(app.url(&format!("/api/v1/transcriptions/{id}/summary")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["success"], true);

    let text = summary["data"]["formatted_text"].as_str().unwrap();
    assert!(text.starts_with("# 要約"));
    for heading in [
        "## 議題・議論内容",
        "## 決定事項",
        "## ToDo",
        "## 次のアクション",
        "## 次回会議",
    ] {
        assert!(text.contains(heading), "missing heading {heading}");
    }
    assert!(text.contains("- [ ] "));
    assert!(!text.contains('\r'));

    let details = &summary["data"]["details"];
    assert_eq!(details["decisions"][0], "テスト決定");
    assert_eq!(details["todo"][0], "テストタスク");
    assert_eq!(summary["data"]["confidence"], 0.85);
}

#[tokio::test]
async fn summary_before_completion_is_409() {
    let app = TestApp::spawn_with(
        crate::fixtures::backends::FakeSpeech::slow("遅い", Duration::from_millis(700)),
        crate::fixtures::backends::FakeChat::ok(),
    )
    .await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.5), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap();

    let resp = app
        .client
        .get(app.url(&format!("/api/v1/transcriptions/{id}/summary")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "JOB_NOT_COMPLETED");
}

#[tokio::test]
async fn unknown_job_is_404_with_error_envelope() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url(&format!(
            "/api/v1/transcriptions/{}",
            uuid::Uuid::new_v4()
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "JOB_NOT_FOUND");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn interview_usage_type_is_accepted_and_summarized_as_meeting() {
    let app = TestApp::spawn().await;

    let resp = app
        .upload("interview.wav", "audio/wav", wav_fixture(0.5), "interview")
        .await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["usage_type"], "interview");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    app.wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;

    let summary: Value = app
        .client
        .get(app.url(&format!("/api/v1/transcriptions/{id}/summary")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Same meeting-shaped output as any other job.
    assert!(summary["data"]["formatted_text"]
        .as_str()
        .unwrap()
        .starts_with("# 要約"));
}

#[tokio::test]
async fn invalid_usage_type_is_rejected() {
    let app = TestApp::spawn().await;
    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.5), "lecture")
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn processing_logs_are_exposed() {
    let app = TestApp::spawn().await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.5), "meeting")
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
    assert!(!entries.is_empty());
    assert!(entries
        .iter()
        .any(|e| e["message"] == "COMPLETED" && e["level"] == "INFO"));
}

#[tokio::test]
async fn health_reports_dependency_status() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "OK");
    assert_eq!(body["data"]["store"], "OK");
    assert_eq!(body["data"]["llm"], "OK");
    assert_eq!(body["data"]["whisper"], "OK");
}

#[tokio::test]
async fn statistics_count_jobs() {
    let app = TestApp::spawn().await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.5), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    app.wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;

    let stats: Value = app
        .client
        .get(app.url("/api/v1/statistics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["data"]["total_jobs"], 1);
    assert_eq!(stats["data"]["status_distribution"]["COMPLETED"], 1);
    assert_eq!(stats["data"]["usage_distribution"]["meeting"], 1);
}

#[tokio::test]
async fn progress_never_decreases_over_polling() {
    let app = TestApp::spawn_with(
        crate::fixtures::backends::FakeSpeech::slow("監視", Duration::from_millis(200)),
        crate::fixtures::backends::FakeChat::ok(),
    )
    .await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.5), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let mut last = 0u64;
    for _ in 0..200 {
        let body = app.get_job(&id).await;
        let progress = body["data"]["progress"].as_u64().unwrap();
        assert!(progress >= last, "progress regressed: {last} -> {progress}");
        last = progress;
        if body["data"]["status_code"] == "COMPLETED" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(last, 100);
}
