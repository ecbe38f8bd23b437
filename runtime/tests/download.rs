//! Download controller behavior through `run_download` against a mock server.

mod common;

use common::fast_config;
use pixmirror::download::{run_download, JobStatus};
use pixmirror::error::MirrorError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn image(body: &[u8], content_type: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", content_type)
        .set_body_bytes(body.to_vec())
}

fn write_list(path: &Path, lines: &[String]) {
    let mut text = String::from("# Image URLs scraped from test\n\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    std::fs::write(path, text).unwrap();
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(image(b"\x89PNG-a", "image/png"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/deep/b.jpg"))
        .respond_with(image(b"jpeg-bytes", "image/jpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("https://site.test/", &[], dir.path());
    write_list(
        &config.download.input_file,
        &[
            format!("{}/img/a.png", server.uri()),
            format!("{}/img/deep/b.jpg", server.uri()),
        ],
    );

    let first = run_download(&config, None).await.unwrap();
    assert_eq!(first.downloaded, 2);
    assert_eq!(first.bytes_written, 16);
    let root = &config.download.output_dir;
    assert_eq!(std::fs::read(root.join("img/a.png")).unwrap(), b"\x89PNG-a");
    assert_eq!(std::fs::read(root.join("img/deep/b.jpg")).unwrap(), b"jpeg-bytes");
    assert!(!root.join("img/a.png.part").exists());

    let second = run_download(&config, None).await.unwrap();
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 2);
    assert!(second.jobs.iter().all(|j| j.status == JobStatus::Skipped && j.attempts == 0));
    assert_eq!(second.tree.files, 2);
    assert_eq!(second.tree.total_bytes, 16);
}

#[tokio::test]
async fn test_interrupt_keeps_finished_files_then_resumes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(image(b"a-bytes", "image/png"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/b.png"))
        .respond_with(image(b"slow", "image/png").set_delay(Duration::from_secs(3)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/b.png"))
        .respond_with(image(b"b-bytes", "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("https://site.test/", &[], dir.path());
    write_list(
        &config.download.input_file,
        &[
            format!("{}/img/a.png", server.uri()),
            format!("{}/img/b.png", server.uri()),
        ],
    );
    let root = &config.download.output_dir;
    let part = root.join("img/b.png.part");
    std::fs::create_dir_all(root.join("img")).unwrap();
    std::fs::write(&part, b"left over").unwrap();

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        signal.notify_one();
    });

    let first = run_download(&config, Some(shutdown)).await.unwrap();
    assert!(first.interrupted);
    assert_eq!(first.downloaded, 1);
    assert_eq!(first.jobs.len(), 1);
    assert_eq!(std::fs::read(root.join("img/a.png")).unwrap(), b"a-bytes");
    assert!(!root.join("img/b.png").exists());
    assert!(!part.exists());

    let second = run_download(&config, None).await.unwrap();
    assert!(!second.interrupted);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.downloaded, 1);
    assert_eq!(second.jobs[0].status, JobStatus::Skipped);
    assert_eq!(second.jobs[1].status, JobStatus::Downloaded);
    assert_eq!(std::fs::read(root.join("img/b.png")).unwrap(), b"b-bytes");
}

#[tokio::test]
async fn test_html_response_is_not_saved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/login.png"))
        .respond_with(image(b"<html>please sign in</html>", "text/html; charset=utf-8"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("https://site.test/", &[], dir.path());
    write_list(
        &config.download.input_file,
        &[format!("{}/img/login.png", server.uri())],
    );

    let report = run_download(&config, None).await.unwrap();
    assert_eq!(report.failed, 1);
    let job = &report.jobs[0];
    assert_eq!(job.attempts, 1);
    assert!(job.error.as_deref().unwrap().contains("text/html"));

    let target = config.download.output_dir.join("img/login.png");
    assert!(!target.exists());
    assert!(!target.with_extension("png.part").exists());
}

#[tokio::test]
async fn test_not_found_is_retried_and_run_continues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.gif"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok.webp"))
        .respond_with(image(b"RIFFwebp", "image/webp"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("https://site.test/", &[], dir.path());
    write_list(
        &config.download.input_file,
        &[
            format!("{}/missing.gif", server.uri()),
            format!("{}/ok.webp", server.uri()),
        ],
    );

    let report = run_download(&config, None).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.downloaded, 1);

    let failed: Vec<_> = report.failed_jobs().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempts, 3);
    assert_eq!(failed[0].error.as_deref(), Some("HTTP 404"));
    assert!(config.download.output_dir.join("ok.webp").exists());
}

#[tokio::test]
async fn test_rejected_lines_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.svg"))
        .respond_with(image(b"<svg/>", "image/svg+xml"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("https://site.test/", &[], dir.path());
    write_list(
        &config.download.input_file,
        &[
            "/relative/path.png".to_string(),
            format!("{}/a.svg", server.uri()),
        ],
    );

    let report = run_download(&config, None).await.unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.rejected_lines.len(), 1);
    assert_eq!(report.rejected_lines[0].line_number, 3);
    assert_eq!(report.rejected_lines[0].content, "/relative/path.png");
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config("https://site.test/", &[], dir.path());

    let err = run_download(&config, None).await.unwrap_err();
    match err.downcast_ref::<MirrorError>() {
        Some(MirrorError::MissingInput(path)) => {
            assert_eq!(path, &config.download.input_file)
        }
        other => panic!("expected MissingInput, got {other:?}"),
    }
    assert!(!config.download.output_dir.exists());
}
