use sled::{
    transaction::{ConflictableTransactionError, TransactionError},
    Db, Transactional, Tree,
};
use uuid::Uuid;

use crate::{
    error_code::ErrorCode,
    repo::{FullRepo, RepoError, Thumbnail, ThumbnailRepo, Video, VideoRepo},
};

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        actix_web::web::block(move || $expr)
            .await
            .map_err(|_| SledError::Panic)?
            .map_err(SledError::from)?
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in database")]
    Sled(#[from] sled::Error),

    #[error("Invalid video json")]
    Video(#[from] serde_json::Error),

    #[error("Stored thumbnail is malformed")]
    Thumbnail,

    #[error("Transaction was aborted")]
    Aborted,

    #[error("Operation panicked")]
    Panic,
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Panic => ErrorCode::PANIC,
            _ => ErrorCode::SLED_ERROR,
        }
    }
}

impl From<TransactionError<()>> for SledError {
    fn from(value: TransactionError<()>) -> Self {
        match value {
            TransactionError::Abort(()) => Self::Aborted,
            TransactionError::Storage(e) => Self::Sled(e),
        }
    }
}

#[derive(Clone)]
pub(crate) struct SledRepo {
    videos: Tree,
    user_videos: Tree,
    thumbnails: Tree,
    db: Db,
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}

impl SledRepo {
    pub(crate) fn new(db: Db) -> Result<Self, SledError> {
        Ok(SledRepo {
            videos: db.open_tree("tubely-videos-tree")?,
            user_videos: db.open_tree("tubely-user-videos-tree")?,
            thumbnails: db.open_tree("tubely-thumbnails-tree")?,
            db,
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub(crate) async fn flush(&self) -> Result<(), SledError> {
        let bytes = self.db.flush_async().await?;

        tracing::debug!("Flushed {bytes} bytes");

        Ok(())
    }
}

fn user_video_key(user_id: Uuid, video_id: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(video_id.as_bytes());
    key
}

fn encode_thumbnail(Thumbnail { media_type, data }: Thumbnail) -> Vec<u8> {
    let media_type = media_type.essence_str().as_bytes();

    let mut value = Vec::with_capacity(media_type.len() + 1 + data.len());
    value.extend_from_slice(media_type);
    value.push(0);
    value.extend_from_slice(&data);
    value
}

fn decode_thumbnail(value: &[u8]) -> Result<Thumbnail, SledError> {
    let split = value
        .iter()
        .position(|b| *b == 0)
        .ok_or(SledError::Thumbnail)?;

    let media_type = std::str::from_utf8(&value[..split])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(SledError::Thumbnail)?;

    Ok(Thumbnail {
        media_type,
        data: value[split + 1..].to_vec(),
    })
}

#[async_trait::async_trait(?Send)]
impl FullRepo for SledRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        let next = self.db.generate_id().map_err(SledError::from)?;

        tracing::trace!("Generated health check id {next}");

        Ok(())
    }
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for SledRepo {
    #[tracing::instrument(level = "debug", skip(self, video), fields(video_id = %video.id))]
    async fn create_video(&self, video: &Video) -> Result<(), RepoError> {
        let key = video.id.as_bytes().to_vec();
        let index_key = user_video_key(video.user_id, video.id);
        let value = serde_json::to_vec(video).map_err(SledError::from)?;

        let videos = self.videos.clone();
        let user_videos = self.user_videos.clone();

        actix_web::web::block(move || -> Result<(), SledError> {
            (&videos, &user_videos).transaction(|(videos, user_videos)| {
                videos.insert(key.as_slice(), value.as_slice())?;
                user_videos.insert(index_key.as_slice(), key.as_slice())?;

                Ok::<_, ConflictableTransactionError<()>>(())
            })?;

            Ok(())
        })
        .await
        .map_err(|_| SledError::Panic)??;

        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn video(&self, video_id: Uuid) -> Result<Option<Video>, RepoError> {
        let opt = b!(self.videos, videos.get(video_id.as_bytes()));

        opt.map(|ivec| serde_json::from_slice(&ivec))
            .transpose()
            .map_err(SledError::from)
            .map_err(RepoError::from)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError> {
        let user_videos = self.user_videos.clone();
        let videos = self.videos.clone();

        let mut found = actix_web::web::block(move || -> Result<Vec<Video>, SledError> {
            let mut found = Vec::new();

            for res in user_videos.scan_prefix(user_id.as_bytes()) {
                let (_, video_id) = res?;

                if let Some(ivec) = videos.get(video_id)? {
                    found.push(serde_json::from_slice::<Video>(&ivec)?);
                }
            }

            Ok(found)
        })
        .await
        .map_err(|_| SledError::Panic)??;

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(found)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn set_video_url(
        &self,
        video_id: Uuid,
        video_url: String,
    ) -> Result<Option<Video>, RepoError> {
        let videos = self.videos.clone();

        let updated = actix_web::web::block(move || {
            modify_video(&videos, video_id, |video| {
                video.with_video_url(video_url.clone())
            })
        })
        .await
        .map_err(|_| SledError::Panic)??;

        Ok(updated)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn set_thumbnail_url(
        &self,
        video_id: Uuid,
        thumbnail_url: String,
    ) -> Result<Option<Video>, RepoError> {
        let videos = self.videos.clone();

        let updated = actix_web::web::block(move || {
            modify_video(&videos, video_id, |video| {
                video.with_thumbnail_url(thumbnail_url.clone())
            })
        })
        .await
        .map_err(|_| SledError::Panic)??;

        Ok(updated)
    }
}

/// Apply `f` to the stored record, retrying if another writer got there first
fn modify_video<F>(videos: &Tree, video_id: Uuid, f: F) -> Result<Option<Video>, SledError>
where
    F: Fn(Video) -> Video,
{
    loop {
        let Some(current) = videos.get(video_id.as_bytes())? else {
            return Ok(None);
        };

        let video = f(serde_json::from_slice(&current)?);
        let value = serde_json::to_vec(&video)?;

        match videos.compare_and_swap(video_id.as_bytes(), Some(&current), Some(value))? {
            Ok(()) => return Ok(Some(video)),
            Err(_) => tracing::trace!("Video {video_id} changed underneath us, retrying"),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ThumbnailRepo for SledRepo {
    #[tracing::instrument(level = "debug", skip(self, thumbnail))]
    async fn put_thumbnail(&self, video_id: Uuid, thumbnail: Thumbnail) -> Result<(), RepoError> {
        let value = encode_thumbnail(thumbnail);

        b!(
            self.thumbnails,
            thumbnails.insert(video_id.as_bytes(), value)
        );

        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn thumbnail(&self, video_id: Uuid) -> Result<Option<Thumbnail>, RepoError> {
        let opt = b!(self.thumbnails, thumbnails.get(video_id.as_bytes()));

        opt.map(|ivec| decode_thumbnail(&ivec))
            .transpose()
            .map_err(RepoError::from)
    }
}
