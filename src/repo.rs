use std::fmt::Debug;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{config, error_code::ErrorCode};

pub(crate) mod sled;

#[derive(Clone, Debug)]
pub(crate) enum Repo {
    Sled(self::sled::SledRepo),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in sled")]
    SledError(#[from] self::sled::SledError),
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
        }
    }
}

/// Metadata for a single uploaded video
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Video {
    pub(crate) id: Uuid,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,

    pub(crate) title: String,

    pub(crate) description: String,

    pub(crate) user_id: Uuid,

    pub(crate) thumbnail_url: Option<String>,

    pub(crate) video_url: Option<String>,
}

impl Video {
    pub(crate) fn new(user_id: Uuid, title: String, description: String) -> Self {
        let now = OffsetDateTime::now_utc();

        Video {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title,
            description,
            user_id,
            thumbnail_url: None,
            video_url: None,
        }
    }

    pub(crate) fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub(crate) fn with_video_url(mut self, video_url: String) -> Self {
        self.video_url = Some(video_url);
        self.updated_at = OffsetDateTime::now_utc();
        self
    }

    pub(crate) fn with_thumbnail_url(mut self, thumbnail_url: String) -> Self {
        self.thumbnail_url = Some(thumbnail_url);
        self.updated_at = OffsetDateTime::now_utc();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Thumbnail {
    pub(crate) media_type: mime::Mime,
    pub(crate) data: Vec<u8>,
}

#[async_trait::async_trait(?Send)]
pub(crate) trait FullRepo: VideoRepo + ThumbnailRepo + Clone + Debug {
    async fn health_check(&self) -> Result<(), RepoError>;
}

#[async_trait::async_trait(?Send)]
pub(crate) trait VideoRepo {
    async fn create_video(&self, video: &Video) -> Result<(), RepoError>;

    async fn video(&self, video_id: Uuid) -> Result<Option<Video>, RepoError>;

    /// Videos owned by `user_id`, newest first
    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError>;

    /// Set only `video_url` on the stored record, returning the result
    ///
    /// Returns `None` when no such video exists.
    async fn set_video_url(
        &self,
        video_id: Uuid,
        video_url: String,
    ) -> Result<Option<Video>, RepoError>;

    async fn set_thumbnail_url(
        &self,
        video_id: Uuid,
        thumbnail_url: String,
    ) -> Result<Option<Video>, RepoError>;
}

#[async_trait::async_trait(?Send)]
pub(crate) trait ThumbnailRepo {
    async fn put_thumbnail(&self, video_id: Uuid, thumbnail: Thumbnail) -> Result<(), RepoError>;

    async fn thumbnail(&self, video_id: Uuid) -> Result<Option<Thumbnail>, RepoError>;
}

#[async_trait::async_trait(?Send)]
impl<T> FullRepo for actix_web::web::Data<T>
where
    T: FullRepo,
{
    async fn health_check(&self) -> Result<(), RepoError> {
        T::health_check(self).await
    }
}

#[async_trait::async_trait(?Send)]
impl<T> VideoRepo for actix_web::web::Data<T>
where
    T: VideoRepo,
{
    async fn create_video(&self, video: &Video) -> Result<(), RepoError> {
        T::create_video(self, video).await
    }

    async fn video(&self, video_id: Uuid) -> Result<Option<Video>, RepoError> {
        T::video(self, video_id).await
    }

    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError> {
        T::videos_for_user(self, user_id).await
    }

    async fn set_video_url(
        &self,
        video_id: Uuid,
        video_url: String,
    ) -> Result<Option<Video>, RepoError> {
        T::set_video_url(self, video_id, video_url).await
    }

    async fn set_thumbnail_url(
        &self,
        video_id: Uuid,
        thumbnail_url: String,
    ) -> Result<Option<Video>, RepoError> {
        T::set_thumbnail_url(self, video_id, thumbnail_url).await
    }
}

#[async_trait::async_trait(?Send)]
impl<T> ThumbnailRepo for actix_web::web::Data<T>
where
    T: ThumbnailRepo,
{
    async fn put_thumbnail(&self, video_id: Uuid, thumbnail: Thumbnail) -> Result<(), RepoError> {
        T::put_thumbnail(self, video_id, thumbnail).await
    }

    async fn thumbnail(&self, video_id: Uuid) -> Result<Option<Thumbnail>, RepoError> {
        T::thumbnail(self, video_id).await
    }
}

impl Repo {
    #[tracing::instrument]
    pub(crate) fn open(config: config::Repo) -> color_eyre::Result<Self> {
        match config {
            config::Repo::Sled(config::Sled {
                path,
                cache_capacity,
            }) => {
                let db = ::sled::Config::new()
                    .cache_capacity(cache_capacity)
                    .path(path)
                    .open()?;

                Ok(Self::Sled(self::sled::SledRepo::new(db)?))
            }
        }
    }
}
