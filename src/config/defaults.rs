use std::{net::SocketAddr, path::PathBuf};

use crate::{
    config::primitives::{LogFormat, Targets},
    serde_str::Serde,
    store::KeyLayout,
};

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Defaults {
    server: ServerDefaults,
    tracing: TracingDefaults,
    media: MediaDefaults,
    repo: RepoDefaults,
    store: StoreDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ServerDefaults {
    address: SocketAddr,
    public_url: String,
    temporary_directory: PathBuf,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct TracingDefaults {
    logging: LoggingDefaults,

    opentelemetry: OpenTelemetryDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct LoggingDefaults {
    format: LogFormat,
    targets: Serde<Targets>,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetryDefaults {
    service_name: String,
    targets: Serde<Targets>,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MediaDefaults {
    max_video_size: u64,
    max_thumbnail_size: u64,
    process_timeout: u64,
    process_concurrency: usize,
    ffmpeg_path: String,
    ffprobe_path: String,
    key_layout: KeyLayout,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum RepoDefaults {
    Sled(SledDefaults),
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct SledDefaults {
    path: PathBuf,
    cache_capacity: u64,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum StoreDefaults {
    Filesystem(FilesystemDefaults),
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct FilesystemDefaults {
    path: PathBuf,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        ServerDefaults {
            address: "0.0.0.0:8091".parse().expect("Valid address string"),
            public_url: String::from("http://localhost:8091"),
            temporary_directory: std::env::temp_dir(),
        }
    }
}

impl Default for LoggingDefaults {
    fn default() -> Self {
        LoggingDefaults {
            format: LogFormat::Normal,
            targets: "warn,tubely=info,tracing_actix_web=info,actix_web=info,actix_server=info"
                .parse()
                .expect("Valid targets string"),
        }
    }
}

impl Default for OpenTelemetryDefaults {
    fn default() -> Self {
        OpenTelemetryDefaults {
            service_name: String::from("tubely"),
            targets: "info".parse().expect("Valid targets string"),
        }
    }
}

impl Default for MediaDefaults {
    fn default() -> Self {
        MediaDefaults {
            max_video_size: 1 << 30,
            max_thumbnail_size: 10 << 20,
            process_timeout: 300,
            process_concurrency: default_process_concurrency(),
            ffmpeg_path: String::from("ffmpeg"),
            ffprobe_path: String::from("ffprobe"),
            key_layout: KeyLayout::default(),
        }
    }
}

// leave a core free for the http workers
fn default_process_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

impl Default for RepoDefaults {
    fn default() -> Self {
        Self::Sled(SledDefaults::default())
    }
}

impl Default for SledDefaults {
    fn default() -> Self {
        SledDefaults {
            path: PathBuf::from(String::from("/mnt/sled-repo")),
            cache_capacity: 1024 * 1024 * 64,
        }
    }
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self::Filesystem(FilesystemDefaults::default())
    }
}

impl Default for FilesystemDefaults {
    fn default() -> Self {
        Self {
            path: PathBuf::from(String::from("/mnt/files")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Defaults;

    #[test]
    fn defaults_serialize_for_layering() {
        let value = serde_json::to_value(Defaults::default()).unwrap();

        assert_eq!(value["media"]["max_video_size"], 1 << 30);
        assert_eq!(value["media"]["key_layout"], "aspect_ratio");
        assert_eq!(value["repo"]["type"], "sled");
        assert_eq!(value["store"]["type"], "filesystem");

        let targets = value["tracing"]["logging"]["targets"].as_str().unwrap();
        assert!(targets.starts_with("warn,"));
        assert!(targets.contains("tubely=info"));
        assert!(value["media"]["process_concurrency"].as_u64().unwrap() >= 1);
    }
}
