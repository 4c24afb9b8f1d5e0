use std::io::Read;
use std::time::Duration;

use serde_json::Value;

use crate::fixtures::backends::{FakeChat, FakeSpeech};
use crate::fixtures::test_app::TestApp;
use crate::fixtures::wav_fixture;

async fn completed_job(app: &TestApp) -> String {
    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    app.wait_for_status(&id, "COMPLETED", Duration::from_secs(60))
        .await;
    id
}

#[tokio::test]
async fn transcription_txt_download() {
    let app = TestApp::spawn().await;
    let id = completed_job(&app).await;

    let resp = app
        .client
        .get(app.url(&format!("/api/v1/files/{id}/transcription.txt")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("転写結果"));
    assert!(body.contains("meeting.wav"));
    assert!(body.contains("これはテストです"));
}

#[tokio::test]
async fn summary_txt_download_is_verbatim_markdown() {
    let app = TestApp::spawn().await;
    let id = completed_job(&app).await;

    let resp = app
        .client
        .get(app.url(&format!("/api/v1/files/{id}/summary.txt")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers()["content-type"],
        "text/plain; charset=utf-8"
    );

    let body = resp.text().await.unwrap();
    assert!(body.starts_with("# 要約"));
    assert!(body.contains("## 決定事項"));
    assert!(!body.contains('\r'));
    assert!(!body.lines().any(|l| l.ends_with(' ')));
}

#[tokio::test]
async fn export_is_a_zip_of_all_artifacts() {
    let app = TestApp::spawn().await;
    let id = completed_job(&app).await;

    let resp = app
        .client
        .get(app.url(&format!("/api/v1/files/{id}/export")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "application/zip");

    let bytes = resp.bytes().await.unwrap();
    // ZIP local file header signature.
    assert_eq!(&bytes[0..2], b"PK");

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    for expected in [
        "transcription.txt",
        "corrected.txt",
        "summary.md",
        "summary.json",
    ] {
        assert!(names.contains(&expected.to_string()), "missing {expected}");
    }

    let mut summary_md = String::new();
    archive
        .by_name("summary.md")
        .unwrap()
        .read_to_string(&mut summary_md)
        .unwrap();
    assert!(summary_md.starts_with("# 要約"));

    let mut summary_json = String::new();
    archive
        .by_name("summary.json")
        .unwrap()
        .read_to_string(&mut summary_json)
        .unwrap();
    let parsed: Value = serde_json::from_str(&summary_json).unwrap();
    assert_eq!(parsed["metadata"]["job_id"], id);
    assert_eq!(parsed["details"]["decisions"][0], "テスト決定");
}

#[tokio::test]
async fn downloads_require_completion() {
    let app = TestApp::spawn_with(
        FakeSpeech::slow("未完了", Duration::from_millis(800)),
        FakeChat::ok(),
    )
    .await;

    let resp = app
        .upload("meeting.wav", "audio/wav", wav_fixture(0.3), "meeting")
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    for path in [
        format!("/api/v1/files/{id}/transcription.txt"),
        format!("/api/v1/files/{id}/summary.txt"),
        format!("/api/v1/files/{id}/export"),
    ] {
        let resp = app.client.get(app.url(&path)).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 409, "{path}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "JOB_NOT_COMPLETED");
    }
}

#[tokio::test]
async fn downloads_for_unknown_job_are_404() {
    let app = TestApp::spawn().await;
    let id = uuid::Uuid::new_v4();

    let resp = app
        .client
        .get(app.url(&format!("/api/v1/files/{id}/transcription.txt")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
