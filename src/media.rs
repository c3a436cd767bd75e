use std::{path::Path, sync::Arc};

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{
    config::Media,
    discover::{Dimensions, ProbeError},
    ffmpeg::FfMpegError,
    process::ProcessError,
    tmp_file::TmpFile,
};

/// The external media tooling an upload runs through
#[async_trait::async_trait(?Send)]
pub(crate) trait MediaTools {
    async fn probe(&self, input: &Path) -> Result<Dimensions, ProbeError>;

    async fn rewrite(&self, input: &TmpFile) -> Result<TmpFile, FfMpegError>;
}

#[async_trait::async_trait(?Send)]
impl<T> MediaTools for actix_web::web::Data<T>
where
    T: MediaTools + ?Sized,
{
    async fn probe(&self, input: &Path) -> Result<Dimensions, ProbeError> {
        T::probe(self, input).await
    }

    async fn rewrite(&self, input: &TmpFile) -> Result<TmpFile, FfMpegError> {
        T::rewrite(self, input).await
    }
}

/// Runs ffmpeg and ffprobe as child processes, bounded by a shared permit pool
#[derive(Clone, Debug)]
pub(crate) struct FfMpeg {
    ffmpeg_path: Arc<str>,
    ffprobe_path: Arc<str>,
    timeout: u64,
    permits: Arc<Semaphore>,
}

impl FfMpeg {
    pub(crate) fn new(media: &Media) -> Self {
        FfMpeg {
            ffmpeg_path: Arc::from(media.ffmpeg_path.as_str()),
            ffprobe_path: Arc::from(media.ffprobe_path.as_str()),
            timeout: media.process_timeout,
            permits: Arc::new(Semaphore::new(media.process_concurrency.max(1))),
        }
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, ProcessError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| ProcessError::LimitReached)
    }
}

#[async_trait::async_trait(?Send)]
impl MediaTools for FfMpeg {
    async fn probe(&self, input: &Path) -> Result<Dimensions, ProbeError> {
        let _permit = self.permit().await.map_err(ProbeError::Process)?;

        crate::discover::probe(&self.ffprobe_path, input, self.timeout).await
    }

    async fn rewrite(&self, input: &TmpFile) -> Result<TmpFile, FfMpegError> {
        let _permit = self.permit().await.map_err(FfMpegError::Process)?;

        crate::ffmpeg::rewrite_faststart(&self.ffmpeg_path, input, self.timeout).await
    }
}
