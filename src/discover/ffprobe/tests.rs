use std::path::Path;

use crate::discover::{AspectRatio, Dimensions};

use super::{parse_probe_output, ProbeError};

const LANDSCAPE_MP4: &str = r#"{
    "streams": [
        {
            "index": 0,
            "codec_name": "h264",
            "codec_type": "video",
            "width": 1920,
            "height": 1080,
            "pix_fmt": "yuv420p",
            "r_frame_rate": "30/1"
        },
        {
            "index": 1,
            "codec_name": "aac",
            "codec_type": "audio",
            "sample_rate": "48000",
            "channels": 2
        }
    ]
}"#;

const PORTRAIT_MP4: &str = r#"{
    "streams": [
        {
            "index": 0,
            "codec_name": "h264",
            "codec_type": "video",
            "width": 1080,
            "height": 1920
        }
    ]
}"#;

const AUDIO_FIRST: &str = r#"{
    "streams": [
        {
            "index": 0,
            "codec_name": "aac",
            "codec_type": "audio"
        },
        {
            "index": 1,
            "codec_name": "h264",
            "codec_type": "video",
            "width": 1920,
            "height": 1080
        }
    ]
}"#;

fn input() -> &'static Path {
    Path::new("/tmp/tubely/input.mp4")
}

#[test]
fn parse_landscape() {
    let dimensions = parse_probe_output(LANDSCAPE_MP4.as_bytes(), input()).unwrap();

    assert_eq!(
        dimensions,
        Dimensions {
            width: 1920,
            height: 1080
        }
    );
    assert_eq!(AspectRatio::from(dimensions), AspectRatio::Landscape);
}

#[test]
fn parse_portrait() {
    let dimensions = parse_probe_output(PORTRAIT_MP4.as_bytes(), input()).unwrap();

    assert_eq!(AspectRatio::from(dimensions), AspectRatio::Portrait);
}

#[test]
fn empty_streams() {
    let error = parse_probe_output(br#"{"streams": []}"#, input()).unwrap_err();

    assert!(matches!(error, ProbeError::NoStreams(ref path) if path == input()));
    assert!(error.to_string().contains("/tmp/tubely/input.mp4"));
}

#[test]
fn missing_streams_key() {
    // ffprobe prints an empty object for files it can't make sense of
    let error = parse_probe_output(b"{}", input()).unwrap_err();

    assert!(matches!(error, ProbeError::NoStreams(_)));
}

#[test]
fn invalid_json() {
    let error = parse_probe_output(b"", input()).unwrap_err();

    assert!(matches!(error, ProbeError::Json(_)));
}

#[test]
fn first_stream_without_dimensions() {
    let error = parse_probe_output(AUDIO_FIRST.as_bytes(), input()).unwrap_err();

    assert!(matches!(error, ProbeError::MissingDimensions(_)));
}
