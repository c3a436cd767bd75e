use std::path::{Path, PathBuf};

use clap::Parser;

mod commandline;
mod defaults;
mod file;
mod primitives;

use commandline::{Args, Output};
use config::Config;
use defaults::Defaults;

pub(crate) use file::{
    ConfigFile as Configuration, Media, OpenTelemetry, Repo, Sled, Tracing,
};
pub(crate) use primitives::{Filesystem, LogFormat, ObjectStorage, Store};

const ENV_PREFIX: &str = "TUBELY";

/// Source for tubely's configuration when embedding it as a library
#[derive(Clone, Debug)]
pub enum ConfigSource<P, T> {
    /// A configuration held in memory, usually a `serde_json::Value`
    Memory { values: T },

    /// A path to a TOML configuration file
    File { path: P },

    /// Only defaults and environment variables
    Empty,
}

impl ConfigSource<PathBuf, ()> {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        ConfigSource::File { path: path.into() }
    }

    pub fn empty() -> Self {
        ConfigSource::Empty
    }
}

impl<T: serde::Serialize> ConfigSource<PathBuf, T> {
    pub fn memory(values: T) -> Self {
        ConfigSource::Memory { values }
    }
}

/// A fully resolved configuration, ready to run
pub struct TubelyConfiguration {
    pub(crate) config: Configuration,
}

pub(crate) fn configure_without_clap<P, T, Q>(
    source: ConfigSource<P, T>,
    save_to: Option<Q>,
) -> color_eyre::Result<TubelyConfiguration>
where
    P: AsRef<Path>,
    T: serde::Serialize,
    Q: AsRef<Path>,
{
    let config = Config::builder().add_source(Config::try_from(&Defaults::default())?);

    let config = match source {
        ConfigSource::Memory { values } => config.add_source(Config::try_from(&values)?),
        ConfigSource::File { path } => config.add_source(config::File::from(path.as_ref())),
        ConfigSource::Empty => config,
    };

    let built = config
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        save(&config, save_to.as_ref())?;
    }

    Ok(TubelyConfiguration { config })
}

pub(crate) fn configure() -> color_eyre::Result<TubelyConfiguration> {
    let Output {
        config_format,
        save_to,
        config_file,
    } = Args::parse().into_output();

    let config = Config::builder().add_source(Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .add_source(Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        save(&config, &save_to)?;
    }

    Ok(TubelyConfiguration { config })
}

fn save(config: &Configuration, path: &Path) -> color_eyre::Result<()> {
    let output = toml::to_string_pretty(config)?;
    std::fs::write(path, output)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{configure_without_clap, ConfigSource, Store};
    use crate::{config::Repo, store::KeyLayout};

    #[test]
    fn memory_source_layers_over_defaults() {
        let configuration = configure_without_clap(
            ConfigSource::memory(serde_json::json!({
                "server": {
                    "jwt_secret": "hunter2",
                },
                "media": {
                    "key_layout": "flat",
                },
                "store": {
                    "type": "filesystem",
                    "path": "./files",
                    "public_endpoint": "http://localhost:8091/files",
                },
            })),
            None::<&str>,
        )
        .unwrap();

        let config = configuration.config;

        assert_eq!(config.server.jwt_secret, "hunter2");
        assert_eq!(config.server.address.port(), 8091);
        assert_eq!(config.media.key_layout, KeyLayout::Flat);
        assert_eq!(config.media.max_video_size, 1 << 30);
        assert!(matches!(config.repo, Repo::Sled(_)));

        let Store::Filesystem(filesystem) = config.store else {
            panic!("Expected filesystem store");
        };
        assert_eq!(
            filesystem.public_endpoint.unwrap().as_str(),
            "http://localhost:8091/files"
        );
    }

    #[test]
    fn saved_config_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tubely.toml");

        configure_without_clap(
            ConfigSource::memory(serde_json::json!({
                "server": { "jwt_secret": "hunter2" },
            })),
            Some(&path),
        )
        .unwrap();

        let reloaded = configure_without_clap(ConfigSource::file(&path), None::<&str>).unwrap();

        assert_eq!(reloaded.config.server.jwt_secret, "hunter2");
    }

    #[test]
    fn metrics_section_is_optional() {
        let configuration = configure_without_clap(
            ConfigSource::memory(serde_json::json!({
                "server": { "jwt_secret": "hunter2" },
            })),
            None::<&str>,
        )
        .unwrap();

        assert!(configuration.config.metrics.prometheus_address.is_none());

        let configuration = configure_without_clap(
            ConfigSource::memory(serde_json::json!({
                "server": { "jwt_secret": "hunter2" },
                "metrics": { "prometheus_address": "127.0.0.1:9000" },
            })),
            None::<&str>,
        )
        .unwrap();

        assert_eq!(
            configuration.config.metrics.prometheus_address,
            Some("127.0.0.1:9000".parse().unwrap())
        );
    }

    #[test]
    fn missing_secret_is_rejected() {
        assert!(configure_without_clap(ConfigSource::empty(), None::<&str>).is_err());
    }
}
