#[cfg(test)]
mod tests;

use std::ffi::OsStr;

use crate::{
    error_code::ErrorCode,
    process::{Process, ProcessError},
    tmp_file::TmpFile,
};

const OUTPUT_SUFFIX: &str = ".processing";

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfMpegError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("ffmpeg exited successfully without writing its output")]
    MissingOutput(#[source] std::io::Error),
}

impl FfMpegError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(ProcessError::Status(_, _, _)) => ErrorCode::FFMPEG_ERROR,
            Self::Process(e) => e.error_code(),
            Self::MissingOutput(_) => ErrorCode::FFMPEG_ERROR,
        }
    }
}

/// Losslessly remux `input` into an mp4 with its index at the front of the file
///
/// The result lands next to the input and is removed when the returned handle drops
#[tracing::instrument(skip(ffmpeg, timeout))]
pub(crate) async fn rewrite_faststart(
    ffmpeg: &str,
    input: &TmpFile,
    timeout: u64,
) -> Result<TmpFile, FfMpegError> {
    let output = input.sibling(OUTPUT_SUFFIX);

    let args = [
        OsStr::new("-hide_banner"),
        OsStr::new("-v"),
        OsStr::new("error"),
        OsStr::new("-y"),
        OsStr::new("-i"),
        input.as_os_str(),
        OsStr::new("-c"),
        OsStr::new("copy"),
        OsStr::new("-movflags"),
        OsStr::new("faststart"),
        OsStr::new("-f"),
        OsStr::new("mp4"),
        output.as_os_str(),
    ];

    let res = match Process::run(ffmpeg, &args, timeout) {
        Ok(process) => process.wait().await,
        Err(e) => Err(e),
    };

    if let Err(e) = res {
        if let Some(stderr) = e.stderr() {
            tracing::warn!(%stderr, "ffmpeg failed to rewrite upload");
        }

        return Err(FfMpegError::Process(e));
    }

    tokio::fs::metadata(&*output)
        .await
        .map_err(FfMpegError::MissingOutput)?;

    Ok(output)
}
