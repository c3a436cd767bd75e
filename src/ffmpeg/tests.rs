use crate::{process::ProcessError, tmp_file::TmpDir};

use super::{rewrite_faststart, FfMpegError};

#[actix_web::test]
async fn failed_rewrite_leaves_no_output() {
    let root = tempfile::tempdir().unwrap();
    let tmp_dir = TmpDir::init(root.path()).await.unwrap();

    let input = tmp_dir.tmp_file(Some(".mp4"));
    tokio::fs::write(&*input, b"not really a video").await.unwrap();

    // `false` ignores its arguments and exits 1
    let error = rewrite_faststart("false", &input, 5).await.unwrap_err();

    assert!(matches!(
        error,
        FfMpegError::Process(ProcessError::Status(_, _, _))
    ));
    assert_eq!(error.error_code().as_str(), "ffmpeg-error");

    let mut entries = tokio::fs::read_dir(tmp_dir.path()).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name());
    }
    assert_eq!(names.len(), 1);
    assert_eq!(names[0], input.file_name().unwrap());
}

#[actix_web::test]
async fn successful_exit_without_output() {
    let root = tempfile::tempdir().unwrap();
    let tmp_dir = TmpDir::init(root.path()).await.unwrap();

    let input = tmp_dir.tmp_file(Some(".mp4"));
    tokio::fs::write(&*input, b"bytes").await.unwrap();

    let error = rewrite_faststart("true", &input, 5).await.unwrap_err();

    assert!(matches!(error, FfMpegError::MissingOutput(_)));
}

#[actix_web::test]
async fn missing_binary() {
    let root = tempfile::tempdir().unwrap();
    let tmp_dir = TmpDir::init(root.path()).await.unwrap();

    let input = tmp_dir.tmp_file(Some(".mp4"));

    let error = rewrite_faststart("tubely-missing-ffmpeg", &input, 5)
        .await
        .unwrap_err();

    assert_eq!(error.error_code().as_str(), "command-not-found");
}
