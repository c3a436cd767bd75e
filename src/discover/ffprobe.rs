#[cfg(test)]
mod tests;

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use crate::{
    error_code::ErrorCode,
    process::{Process, ProcessError},
};

use super::Dimensions;

#[derive(Debug, serde::Deserialize)]
struct FfProbeOutput {
    #[serde(default)]
    streams: Vec<FfProbeStream>,
}

#[derive(Debug, serde::Deserialize)]
struct FfProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProbeError {
    #[error("Error in ffprobe process")]
    Process(#[source] ProcessError),

    #[error("Invalid ffprobe output")]
    Json(#[source] serde_json::Error),

    #[error("No streams found in {}", .0.display())]
    NoStreams(PathBuf),

    #[error("First stream of {} has no dimensions", .0.display())]
    MissingDimensions(PathBuf),
}

impl ProbeError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Json(_) => ErrorCode::PROBE_INVALID_OUTPUT,
            Self::NoStreams(_) => ErrorCode::PROBE_NO_STREAMS,
            Self::MissingDimensions(_) => ErrorCode::FFPROBE_ERROR,
        }
    }
}

#[tracing::instrument(skip(ffprobe, timeout))]
pub(crate) async fn probe(
    ffprobe: &str,
    input: &Path,
    timeout: u64,
) -> Result<Dimensions, ProbeError> {
    let args = [
        OsStr::new("-v"),
        OsStr::new("error"),
        OsStr::new("-print_format"),
        OsStr::new("json"),
        OsStr::new("-show_streams"),
        input.as_os_str(),
    ];

    let output = Process::run(ffprobe, &args, timeout)
        .map_err(ProbeError::Process)?
        .read_to_end()
        .await
        .map_err(ProbeError::Process)?;

    let dimensions = parse_probe_output(&output, input)?;

    tracing::debug!(
        width = dimensions.width,
        height = dimensions.height,
        "Probed dimensions"
    );

    Ok(dimensions)
}

fn parse_probe_output(output: &[u8], input: &Path) -> Result<Dimensions, ProbeError> {
    let FfProbeOutput { streams } = serde_json::from_slice(output).map_err(ProbeError::Json)?;

    let Some(stream) = streams.into_iter().next() else {
        return Err(ProbeError::NoStreams(input.to_path_buf()));
    };

    match (stream.width, stream.height) {
        (Some(width), Some(height)) => Ok(Dimensions { width, height }),
        _ => Err(ProbeError::MissingDimensions(input.to_path_buf())),
    }
}
