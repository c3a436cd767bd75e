use uuid::Uuid;

use crate::{
    discover::AspectRatio,
    error::{Error, UploadError},
    formats,
    future::WithMetrics,
    init_metrics::{UPLOAD_DURATION, UPLOAD_END, UPLOAD_START},
    media::MediaTools,
    repo::{FullRepo, Video},
    store::{KeyLayout, ObjectKey, Store},
    tmp_file::TmpFile,
};

const VIDEO_EXTENSION: &str = "mp4";

/// Run a staged upload through rewrite, probe and publish, then record the published URL
///
/// The record is only written once the store has accepted the whole object, and only its
/// `video_url` changes. Both temporary files are gone by the time this returns, whatever the
/// outcome.
#[tracing::instrument(name = "Ingest", skip_all, fields(video_id = %video_id))]
pub(crate) async fn ingest<R, S, M>(
    repo: &R,
    store: &S,
    media: &M,
    layout: KeyLayout,
    staged: TmpFile,
    video_id: Uuid,
) -> Result<Video, Error>
where
    R: FullRepo,
    S: Store,
    M: MediaTools,
{
    metrics::counter!(UPLOAD_START).increment(1);

    let res = do_ingest(repo, store, media, layout, staged, video_id)
        .with_metrics(UPLOAD_DURATION)
        .await;

    metrics::counter!(UPLOAD_END, "completed" => res.is_ok().to_string()).increment(1);

    res
}

async fn do_ingest<R, S, M>(
    repo: &R,
    store: &S,
    media: &M,
    layout: KeyLayout,
    staged: TmpFile,
    video_id: Uuid,
) -> Result<Video, Error>
where
    R: FullRepo,
    S: Store,
    M: MediaTools,
{
    tracing::debug!("Rewriting for fast start");
    let rewritten = media.rewrite(&staged).await?;

    tracing::debug!("Probing dimensions");
    let dimensions = media.probe(&staged).await?;
    let aspect_ratio = AspectRatio::from(dimensions);

    cleanup(staged).await;

    let key = ObjectKey::generate(layout, aspect_ratio, VIDEO_EXTENSION);

    tracing::debug!("Publishing {key} ({aspect_ratio})");
    store.save_file(&key, &rewritten, formats::video_mp4()).await?;

    cleanup(rewritten).await;

    let video_url = store.public_url(&key);

    match repo.set_video_url(video_id, video_url.clone()).await {
        Ok(Some(video)) => Ok(video),
        Ok(None) => {
            tracing::error!(
                video_id = %video_id,
                key = %key,
                url = %video_url,
                "Published video but its record is gone"
            );

            Err(UploadError::MissingVideo.into())
        }
        Err(e) => {
            tracing::error!(
                video_id = %video_id,
                key = %key,
                url = %video_url,
                "Published video but failed to record its URL: {e}"
            );

            Err(UploadError::MetadataUpdate(e).into())
        }
    }
}

async fn cleanup(file: TmpFile) {
    if let Err(e) = file.cleanup().await {
        tracing::warn!("Failed to remove temporary file: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, path::Path};

    use actix_web::ResponseError as _;
    use object_store::ObjectStore as _;
    use uuid::Uuid;

    use super::ingest;
    use crate::{
        discover::{Dimensions, ProbeError},
        ffmpeg::FfMpegError,
        media::MediaTools,
        process::ProcessError,
        repo::{sled::SledRepo, Video, VideoRepo},
        store::{object_store::ObjectStore, KeyLayout},
        tmp_file::{TmpDir, TmpFile},
    };

    struct Fake {
        dimensions: Dimensions,
        fail_rewrite: bool,
        fail_probe: bool,
        probes: Cell<usize>,
    }

    #[async_trait::async_trait(?Send)]
    impl MediaTools for Fake {
        async fn probe(&self, input: &Path) -> Result<Dimensions, ProbeError> {
            assert!(input.exists());
            self.probes.set(self.probes.get() + 1);

            if self.fail_probe {
                return Err(ProbeError::NoStreams(input.to_path_buf()));
            }

            Ok(self.dimensions)
        }

        async fn rewrite(&self, input: &TmpFile) -> Result<TmpFile, FfMpegError> {
            if self.fail_rewrite {
                return Err(FfMpegError::Process(ProcessError::Timeout("ffmpeg".into())));
            }

            let output = input.sibling(".processing");
            tokio::fs::copy(&**input, &*output)
                .await
                .map_err(FfMpegError::MissingOutput)?;
            Ok(output)
        }
    }

    fn fake(width: u32, height: u32) -> Fake {
        Fake {
            dimensions: Dimensions { width, height },
            fail_rewrite: false,
            fail_probe: false,
            probes: Cell::new(0),
        }
    }

    fn repo() -> SledRepo {
        SledRepo::new(sled::Config::new().temporary(true).open().unwrap()).unwrap()
    }

    async fn staged(dir: &TmpDir) -> TmpFile {
        let file = dir.tmp_file(Some(".mp4"));
        tokio::fs::write(&*file, b"not really an mp4").await.unwrap();
        file
    }

    #[actix_web::test]
    async fn publishes_before_recording_url() {
        let root = tempfile::tempdir().unwrap();
        let dir = TmpDir::init(root.path()).await.unwrap();
        let repo = repo();
        let store = ObjectStore::in_memory("https://cdn.example.com");
        let media = fake(1080, 1920);

        let video = Video::new(Uuid::new_v4(), "Boots".into(), String::new());
        repo.create_video(&video).await.unwrap();

        let updated = ingest(
            &repo,
            &store,
            &media,
            KeyLayout::AspectRatio,
            staged(&dir).await,
            video.id,
        )
        .await
        .unwrap();

        let url = updated.video_url.clone().unwrap();
        assert!(url.starts_with("https://cdn.example.com/portrait/"));
        assert!(url.ends_with(".mp4"));
        assert_eq!(media.probes.get(), 1);

        let key = url.trim_start_matches("https://cdn.example.com/");
        let stored = store
            .inner()
            .get(&object_store::path::Path::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&stored[..], b"not really an mp4");

        assert_eq!(repo.video(video.id).await.unwrap(), Some(updated));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn flat_layout_has_no_prefix() {
        let root = tempfile::tempdir().unwrap();
        let dir = TmpDir::init(root.path()).await.unwrap();
        let repo = repo();
        let store = ObjectStore::in_memory("https://cdn.example.com");

        let video = Video::new(Uuid::new_v4(), "Boots".into(), String::new());
        repo.create_video(&video).await.unwrap();

        let updated = ingest(
            &repo,
            &store,
            &fake(1000, 1000),
            KeyLayout::Flat,
            staged(&dir).await,
            video.id,
        )
        .await
        .unwrap();

        let url = updated.video_url.unwrap();
        let key = url.trim_start_matches("https://cdn.example.com/");
        assert!(!key.contains('/'));
        assert_eq!(key.len(), 64 + ".mp4".len());
    }

    #[actix_web::test]
    async fn keeps_changes_made_during_processing() {
        let root = tempfile::tempdir().unwrap();
        let dir = TmpDir::init(root.path()).await.unwrap();
        let repo = repo();
        let store = ObjectStore::in_memory("https://cdn.example.com");

        let video = Video::new(Uuid::new_v4(), "Boots".into(), "A demo".into());
        repo.create_video(&video).await.unwrap();

        repo.set_thumbnail_url(video.id, "http://localhost:8091/api/thumbnails/x".into())
            .await
            .unwrap();

        let updated = ingest(
            &repo,
            &store,
            &fake(1920, 1080),
            KeyLayout::AspectRatio,
            staged(&dir).await,
            video.id,
        )
        .await
        .unwrap();

        let stored = repo.video(video.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(
            stored.thumbnail_url.as_deref(),
            Some("http://localhost:8091/api/thumbnails/x")
        );
        assert_eq!(stored.description, "A demo");
        assert!(stored.video_url.is_some());
    }

    #[actix_web::test]
    async fn failed_probe_cleans_up_both_files() {
        let root = tempfile::tempdir().unwrap();
        let dir = TmpDir::init(root.path()).await.unwrap();
        let repo = repo();
        let store = ObjectStore::in_memory("https://cdn.example.com");

        let video = Video::new(Uuid::new_v4(), "Boots".into(), String::new());
        repo.create_video(&video).await.unwrap();

        let mut media = fake(1920, 1080);
        media.fail_probe = true;

        let error = ingest(
            &repo,
            &store,
            &media,
            KeyLayout::AspectRatio,
            staged(&dir).await,
            video.id,
        )
        .await
        .unwrap_err();

        assert_eq!(error.error_code().as_str(), "probe-no-streams");
        assert_eq!(
            error.status_code(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(media.probes.get(), 1);
        assert_eq!(repo.video(video.id).await.unwrap(), Some(video));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let listed = futures_util::TryStreamExt::try_collect::<Vec<_>>(store.inner().list(None))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[actix_web::test]
    async fn failed_rewrite_leaves_no_state() {
        let root = tempfile::tempdir().unwrap();
        let dir = TmpDir::init(root.path()).await.unwrap();
        let repo = repo();
        let store = ObjectStore::in_memory("https://cdn.example.com");

        let video = Video::new(Uuid::new_v4(), "Boots".into(), String::new());
        repo.create_video(&video).await.unwrap();

        let mut media = fake(1920, 1080);
        media.fail_rewrite = true;

        let error = ingest(
            &repo,
            &store,
            &media,
            KeyLayout::AspectRatio,
            staged(&dir).await,
            video.id,
        )
        .await
        .unwrap_err();

        assert_eq!(error.error_code().as_str(), "command-timeout");
        assert_eq!(media.probes.get(), 0);
        assert_eq!(repo.video(video.id).await.unwrap(), Some(video.clone()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        media.fail_rewrite = false;

        let updated = ingest(
            &repo,
            &store,
            &media,
            KeyLayout::AspectRatio,
            staged(&dir).await,
            video.id,
        )
        .await
        .unwrap();

        assert!(updated
            .video_url
            .unwrap()
            .starts_with("https://cdn.example.com/landscape/"));
    }
}
