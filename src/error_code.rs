#[derive(Debug, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct ErrorCode {
    code: &'static str,
}

impl ErrorCode {
    #[cfg(test)]
    pub(crate) const fn as_str(&self) -> &'static str {
        self.code
    }

    pub(crate) const COMMAND_TIMEOUT: ErrorCode = ErrorCode {
        code: "command-timeout",
    };
    pub(crate) const COMMAND_ERROR: ErrorCode = ErrorCode {
        code: "command-error",
    };
    pub(crate) const COMMAND_FAILURE: ErrorCode = ErrorCode {
        code: "command-failure",
    };
    pub(crate) const COMMAND_NOT_FOUND: ErrorCode = ErrorCode {
        code: "command-not-found",
    };
    pub(crate) const COMMAND_PERMISSION_DENIED: ErrorCode = ErrorCode {
        code: "command-permission-denied",
    };
    pub(crate) const FFMPEG_ERROR: ErrorCode = ErrorCode {
        code: "ffmpeg-error",
    };
    pub(crate) const FFPROBE_ERROR: ErrorCode = ErrorCode {
        code: "ffprobe-error",
    };
    pub(crate) const PROBE_NO_STREAMS: ErrorCode = ErrorCode {
        code: "probe-no-streams",
    };
    pub(crate) const PROBE_INVALID_OUTPUT: ErrorCode = ErrorCode {
        code: "probe-invalid-output",
    };
    pub(crate) const OBJECT_STORE_ERROR: ErrorCode = ErrorCode {
        code: "object-store-error",
    };
    pub(crate) const OBJECT_IO_ERROR: ErrorCode = ErrorCode {
        code: "object-io-error",
    };
    pub(crate) const SLED_ERROR: ErrorCode = ErrorCode { code: "sled-error" };
    pub(crate) const METADATA_UPDATE_FAILED: ErrorCode = ErrorCode {
        code: "metadata-update-failed",
    };
    pub(crate) const PANIC: ErrorCode = ErrorCode { code: "panic" };
    pub(crate) const IO_ERROR: ErrorCode = ErrorCode { code: "io-error" };
    pub(crate) const FILE_UPLOAD_ERROR: ErrorCode = ErrorCode {
        code: "file-upload-error",
    };
    pub(crate) const FILE_TOO_LARGE: ErrorCode = ErrorCode {
        code: "file-too-large",
    };
    pub(crate) const NO_FILE: ErrorCode = ErrorCode { code: "no-file" };
    pub(crate) const UNSUPPORTED_MEDIA_TYPE: ErrorCode = ErrorCode {
        code: "unsupported-media-type",
    };
    pub(crate) const INVALID_REQUEST_BODY: ErrorCode = ErrorCode {
        code: "invalid-request-body",
    };
    pub(crate) const INVALID_VIDEO_ID: ErrorCode = ErrorCode {
        code: "invalid-video-id",
    };
    pub(crate) const VIDEO_NOT_FOUND: ErrorCode = ErrorCode {
        code: "video-not-found",
    };
    pub(crate) const THUMBNAIL_NOT_FOUND: ErrorCode = ErrorCode {
        code: "thumbnail-not-found",
    };
    pub(crate) const MISSING_TOKEN: ErrorCode = ErrorCode {
        code: "missing-token",
    };
    pub(crate) const INVALID_TOKEN: ErrorCode = ErrorCode {
        code: "invalid-token",
    };
    pub(crate) const NOT_OWNER: ErrorCode = ErrorCode { code: "not-owner" };
    pub(crate) const UNKNOWN_ERROR: ErrorCode = ErrorCode {
        code: "unknown-error",
    };
}
