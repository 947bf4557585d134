// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for output capture and reporting.

use crate::{
    capture::LogPathResolver, errors::ConfigParseError, output::Color, reporter::DisplayMode,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

/// Capture and reporting settings.
///
/// Settings are layered, with later layers taking precedence:
///
/// 1. The default config, [`Self::DEFAULT_CONFIG`].
/// 2. An optional TOML config file.
/// 3. Environment variables named `TESTLOG_<KEY>`, where `<KEY>` is the upper-cased setting name
///    with `-` replaced by `_`. For example, `TESTLOG_DISPLAY_MODE=batched`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CaptureConfig {
    /// When captured logs are included in reports.
    pub display_mode: DisplayMode,

    /// The maximum length of the name prefix of a log file.
    pub max_name_len: usize,

    /// If true, errors are placed before captured logs in reports.
    pub errors_first: bool,

    /// If true, reports are composed for passing runs in `issues` mode as well.
    pub verbose_results: bool,

    /// Whether to colorize output.
    pub color: Color,
}

impl CaptureConfig {
    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment configuration uses this prefix, plus a _.
    pub const ENVIRONMENT_PREFIX: &'static str = "TESTLOG";

    /// Reads the config from the given file, if any, and from the environment.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(config_file, std::env::vars())
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        Self::make_default_config()
            .build()
            .and_then(|config| config.try_deserialize())
            .expect("default config is always valid")
    }

    /// Returns a log path resolver for `dir` using these settings.
    pub fn path_resolver(&self, dir: impl Into<Utf8PathBuf>) -> LogPathResolver {
        LogPathResolver::new(dir).with_max_name_len(self.max_name_len)
    }

    // ---
    // Helper methods
    // ---

    fn from_sources_impl(
        config_file: Option<&Utf8Path>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();

        if let Some(file) = config_file {
            // Parse the file on its own first, so errors in it are attributed to it.
            let source = File::new(file.as_str(), FileFormat::Toml);
            Self::make_default_config()
                .add_source(source.clone())
                .build()
                .and_then(|config| config.try_deserialize::<Self>())
                .map_err(|err| ConfigParseError::new(Some(file.to_owned()), err))?;
            builder = builder.add_source(source);
        }

        for (key, value) in env_overrides(env) {
            builder = builder
                .set_override(key, value)
                .map_err(|err| ConfigParseError::new(None, err))?;
        }

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| ConfigParseError::new(None, err))
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Maps `TESTLOG_DISPLAY_MODE=value` to `("display-mode", "value")`.
///
/// Variables for keys that aren't settings, such as `TESTLOG_LOG`, are skipped.
fn env_overrides(
    env: impl IntoIterator<Item = (String, String)>,
) -> impl Iterator<Item = (String, String)> {
    const KEYS: [&str; 5] = [
        "display-mode",
        "max-name-len",
        "errors-first",
        "verbose-results",
        "color",
    ];

    env.into_iter().filter_map(|(name, value)| {
        let suffix = name
            .strip_prefix(CaptureConfig::ENVIRONMENT_PREFIX)?
            .strip_prefix('_')?;
        let key = suffix.to_ascii_lowercase().replace('_', "-");
        KEYS.contains(&key.as_str()).then_some((key, value))
    })
}
