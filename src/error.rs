use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Couldn't upload file")]
    Upload(#[from] actix_form_data::Error),

    #[error("Error in DB")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Stored the video but failed to record its URL")]
    MetadataUpdate(#[source] crate::repo::RepoError),

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),

    #[error("Error in store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error in ffmpeg")]
    Ffmpeg(#[from] crate::ffmpeg::FfMpegError),

    #[error("Error in ffprobe")]
    Probe(#[from] crate::discover::ProbeError),

    #[error("Error authenticating request")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Provided video ID is not a valid UUID")]
    InvalidVideoId(#[source] uuid::Error),

    #[error("Request body is not valid JSON for this endpoint")]
    InvalidRequestBody(#[source] serde_json::Error),

    #[error("Requested a video that doesn't exist")]
    MissingVideo,

    #[error("Requested a thumbnail that doesn't exist")]
    MissingThumbnail,

    #[error("Only the owner of a video may modify it")]
    NotOwner,

    #[error("No file present in upload")]
    NoFiles,

    #[error("Uploaded part has no Content-Type")]
    MissingContentType,

    #[error("Media type {0} is not accepted")]
    UnsupportedMediaType(mime::Mime),

    #[error("Upload exceeds the limit of {0} bytes")]
    TooLarge(u64),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::Repo(e) => e.error_code(),
            Self::MetadataUpdate(_) => ErrorCode::METADATA_UPDATE_FAILED,
            Self::Io(_) => ErrorCode::IO_ERROR,
            Self::Store(e) => e.error_code(),
            Self::Ffmpeg(e) => e.error_code(),
            Self::Probe(e) => e.error_code(),
            Self::Auth(e) => e.error_code(),
            Self::InvalidVideoId(_) => ErrorCode::INVALID_VIDEO_ID,
            Self::InvalidRequestBody(_) => ErrorCode::INVALID_REQUEST_BODY,
            Self::MissingVideo => ErrorCode::VIDEO_NOT_FOUND,
            Self::MissingThumbnail => ErrorCode::THUMBNAIL_NOT_FOUND,
            Self::NotOwner => ErrorCode::NOT_OWNER,
            Self::NoFiles => ErrorCode::NO_FILE,
            Self::MissingContentType | Self::UnsupportedMediaType(_) => {
                ErrorCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::TooLarge(_) => ErrorCode::FILE_TOO_LARGE,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            Some(
                UploadError::Upload(_)
                | UploadError::NoFiles
                | UploadError::InvalidVideoId(_)
                | UploadError::InvalidRequestBody(_),
            ) => StatusCode::BAD_REQUEST,
            Some(UploadError::Auth(_) | UploadError::NotOwner) => StatusCode::UNAUTHORIZED,
            Some(UploadError::MissingVideo | UploadError::MissingThumbnail) => {
                StatusCode::NOT_FOUND
            }
            Some(UploadError::TooLarge(_)) => StatusCode::PAYLOAD_TOO_LARGE,
            Some(UploadError::MissingContentType | UploadError::UnsupportedMediaType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": self.root_cause().to_string(),
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}
