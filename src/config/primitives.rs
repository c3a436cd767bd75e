use std::{fmt::Display, path::PathBuf, str::FromStr};

use clap::Parser;
use url::Url;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Deserialize,
    serde::Serialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogFormat {
    Compact,
    Json,
    Normal,
    Pretty,
}

#[derive(Clone, Debug)]
pub(crate) struct Targets {
    pub(crate) targets: tracing_subscriber::filter::Targets,
}

/// Where published videos are written
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub(crate) enum Store {
    ObjectStorage(ObjectStorage),
    Filesystem(Filesystem),
}

/// Configuration for an S3 or S3-compatible bucket
#[derive(Clone, Debug, Parser, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct ObjectStorage {
    /// The base endpoint for the object storage, for S3-compatible providers
    ///
    /// Omit this to talk to AWS directly
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) endpoint: Option<Url>,

    /// The bucket in which to store published videos
    #[arg(short, long)]
    pub(crate) bucket_name: String,

    /// Whether to address the bucket as a path segment instead of a subdomain
    #[arg(long)]
    #[serde(default)]
    pub(crate) use_path_style: bool,

    /// The region the bucket is located in
    #[arg(short, long)]
    pub(crate) region: String,

    /// The Access Key for the user accessing the bucket
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) access_key: Option<String>,

    /// The secret key for the user accessing the bucket
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) secret_key: Option<String>,

    /// The session token for accessing the bucket
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) session_token: Option<String>,

    /// Base URL that published keys are appended to, such as a CDN in front of the bucket
    ///
    /// Defaults to the bucket's virtual-hosted AWS URL
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) public_endpoint: Option<Url>,
}

/// Configuration for a local directory store
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Filesystem {
    pub(crate) path: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) public_endpoint: Option<Url>,
}

impl FromStr for Targets {
    type Err = <tracing_subscriber::filter::Targets as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Targets {
            targets: s.parse()?,
        })
    }
}

impl Display for Targets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets = self
            .targets
            .iter()
            .map(|(path, level)| format!("{path}={level}"))
            .collect::<Vec<_>>()
            .join(",");

        match (self.targets.default_level(), targets.is_empty()) {
            (Some(level), true) => write!(f, "{level}"),
            (Some(level), false) => write!(f, "{level},{targets}"),
            (None, _) => f.write_str(&targets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Store, Targets};

    #[test]
    fn targets_round_trip_default_level() {
        let targets: Targets = "warn,tubely=info".parse().unwrap();

        assert_eq!(targets.to_string(), "warn,tubely=info");
    }

    #[test]
    fn store_is_tagged_by_type() {
        let store: Store = serde_json::from_value(serde_json::json!({
            "type": "object_storage",
            "bucket_name": "tubely",
            "region": "us-east-2",
        }))
        .unwrap();

        let Store::ObjectStorage(storage) = store else {
            panic!("Expected object storage");
        };

        assert_eq!(storage.bucket_name, "tubely");
        assert!(!storage.use_path_style);
        assert!(storage.public_endpoint.is_none());
    }
}
