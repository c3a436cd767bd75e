use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use url::Url;

use crate::{
    config::primitives::{LogFormat, ObjectStorage, Targets},
    serde_str::Serde,
    store::KeyLayout,
};

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            save_to,
            command,
        } = self;

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets.map(Serde::new),
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets.map(Serde::new),
            },
        };

        let Command::Run(Run {
            address,
            public_url,
            jwt_secret,
            temporary_directory,
            metrics_prometheus_address,
            media_max_video_size,
            media_max_thumbnail_size,
            media_process_timeout,
            media_process_concurrency,
            media_ffmpeg_path,
            media_ffprobe_path,
            media_key_layout,
            store,
        }) = command;

        let server = Server {
            address,
            public_url,
            jwt_secret,
            temporary_directory,
        };

        let metrics = Metrics {
            prometheus_address: metrics_prometheus_address,
        };

        let media = Media {
            max_video_size: media_max_video_size,
            max_thumbnail_size: media_max_thumbnail_size,
            process_timeout: media_process_timeout,
            process_concurrency: media_process_concurrency,
            ffmpeg_path: media_ffmpeg_path,
            ffprobe_path: media_ffprobe_path,
            key_layout: media_key_layout,
        };

        let (store, repo) = match store {
            Some(RunStore::Filesystem(RunFilesystem { system, repo })) => {
                (Some(Store::Filesystem(system)), repo)
            }
            Some(RunStore::ObjectStorage(RunObjectStorage { storage, repo })) => {
                (Some(Store::ObjectStorage(storage)), repo)
            }
            None => (None, None),
        };

        Output {
            config_format: ConfigFormat {
                server,
                tracing,
                metrics,
                media,
                repo,
                store,
            },
            save_to,
            config_file,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<Repo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<Store>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwt_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_video_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_thumbnail_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffmpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffprobe_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_layout: Option<KeyLayout>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Store {
    Filesystem(Filesystem),
    ObjectStorage(ObjectStorage),
}

/// Run the tubely video upload service
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the tubely configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,

    /// URL to send OpenTelemetry metrics
    #[arg(long)]
    opentelemetry_url: Option<Url>,
    /// Service Name to use for OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,
    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<Targets>,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the tubely web server
    Run(Run),
}

#[derive(Debug, Parser)]
struct Run {
    /// The address and port to bind the tubely web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The URL clients reach this server at, used when linking thumbnails
    #[arg(long)]
    public_url: Option<Url>,

    /// The secret shared with the account service for validating access tokens
    #[arg(long)]
    jwt_secret: Option<String>,

    /// The temporary directory tubely should use when processing uploads
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// Whether to enable the prometheus scrape endpoint
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    /// The maximum size, in bytes, of an uploaded video
    ///
    /// This defaults to 1 GiB
    #[arg(long)]
    media_max_video_size: Option<u64>,

    /// The maximum size, in bytes, of an uploaded thumbnail
    #[arg(long)]
    media_max_thumbnail_size: Option<u64>,

    /// Timeout, in seconds, for any ffmpeg or ffprobe invocation
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// How many ffmpeg or ffprobe processes may run at once
    ///
    /// This defaults to one less than the number of available cores
    #[arg(long)]
    media_process_concurrency: Option<usize>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    media_ffmpeg_path: Option<String>,

    /// Path to the ffprobe binary
    #[arg(long)]
    media_ffprobe_path: Option<String>,

    /// How published videos are laid out in the store
    #[arg(long)]
    media_key_layout: Option<KeyLayout>,

    #[command(subcommand)]
    store: Option<RunStore>,
}

/// Configure the provided storage
#[derive(Clone, Debug, Subcommand)]
enum RunStore {
    /// configure tubely to store files in a local filesystem
    Filesystem(RunFilesystem),

    /// configure tubely to store files in object storage
    ObjectStorage(RunObjectStorage),
}

/// Run tubely with the provided filesystem storage
#[derive(Clone, Debug, Parser)]
struct RunFilesystem {
    #[command(flatten)]
    system: Filesystem,

    #[command(subcommand)]
    repo: Option<Repo>,
}

/// Run tubely with the provided object storage
#[derive(Clone, Debug, Parser)]
struct RunObjectStorage {
    #[command(flatten)]
    storage: ObjectStorage,

    #[command(subcommand)]
    repo: Option<Repo>,
}

/// Configuration for data repositories
#[derive(Clone, Debug, Subcommand, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Repo {
    /// Run tubely with the provided sled-backed data repository
    Sled(Sled),
}

/// Configuration for filesystem media storage
#[derive(Clone, Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Filesystem {
    /// The path to store published videos in
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    /// Base URL the directory is served from
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    public_endpoint: Option<Url>,
}

/// Configuration for the sled-backed data repository
#[derive(Clone, Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sled {
    /// The path to store the sled database
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    /// The cache capacity, in bytes, allowed to sled for in-memory operations
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_capacity: Option<u64>,
}
