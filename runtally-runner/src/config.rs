// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for runtally.
//!
//! Configuration is layered, with later sources overriding earlier ones:
//!
//! 1. the default config embedded in the binary;
//! 2. `.config/runtally.toml` in the working directory, or the file passed in with
//!    `--config-file`;
//! 3. environment variables of the form `RUNTALLY_<SECTION>__<KEY>`, e.g.
//!    `RUNTALLY_RUN__FAIL_FAST=true`.
//!
//! Command-line options are applied on top of the result by the caller.

use crate::{
    engine::EngineConfig,
    errors::ConfigParseError,
    reporter::{RenderMode, ShowStatus},
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Overall configuration for runtally.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct RuntallyConfig {
    /// Options that control how tests are run.
    pub run: RunConfig,

    /// Options that control how results are reported.
    pub report: ReportConfig,
}

/// The `[run]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct RunConfig {
    /// Stop starting new tests after the first failure.
    pub fail_fast: bool,

    /// Run tests one at a time.
    pub serial: bool,

    /// Modules to preload before each test.
    pub require: Vec<String>,

    /// Patterns used to find test targets when none are given on the command line.
    pub patterns: Vec<String>,
}

/// The `[report]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct ReportConfig {
    /// Human-readable or machine-readable output.
    pub message_format: RenderMode,

    /// How to show the status line in human mode.
    pub status: ShowStatus,

    /// Directories whose stack frames are hidden in failure reports.
    pub framework_dirs: Vec<String>,
}

/// Receives warnings produced while reading configuration.
pub trait ConfigWarnings {
    /// Called with the keys in `config_file` that runtally doesn't recognize.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

/// Logs configuration warnings through `tracing`.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let keys = unknown.iter().map(|key| format!("  - {key}")).join("\n");
        warn!(
            "ignoring unknown configuration keys in config file {config_file}:\n{keys}"
        );
    }
}

impl RuntallyConfig {
    /// The default location of the config within the working directory.
    pub const CONFIG_PATH: &'static str = ".config/runtally.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment configuration uses this prefix, plus a _.
    pub const ENVIRONMENT_PREFIX: &'static str = "RUNTALLY";

    /// Reads the config from the default config, the config file and the process environment.
    ///
    /// If `config_file` is `None`, `.config/runtally.toml` within `cwd` is read if it exists.
    pub fn from_sources(
        cwd: &Utf8Path,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_env(cwd, config_file, std::env::vars(), warnings)
    }

    /// Like [`from_sources`](Self::from_sources), but reads environment variables from `env`.
    ///
    /// Only variables of the form `RUNTALLY_<SECTION>__<KEY>` are considered, so unrelated
    /// variables such as `RUNTALLY_LOG` are never mistaken for configuration. Underscores within
    /// `<KEY>` stand for dashes.
    pub fn from_sources_with_env(
        cwd: &Utf8Path,
        config_file: Option<&Utf8Path>,
        env: impl IntoIterator<Item = (String, String)>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = cwd.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let prefix = format!("{}_", Self::ENVIRONMENT_PREFIX);
        let env_vars: config::Map<String, String> = env
            .into_iter()
            .filter_map(|(key, value)| {
                let rest = key.strip_prefix(&prefix)?;
                // RUNTALLY_RUN__FAIL_FAST is the key `run.fail-fast`.
                rest.contains("__").then(|| {
                    let rest = rest.split("__").map(|part| part.replace('_', "-")).join("__");
                    (format!("{prefix}{rest}"), value)
                })
            })
            .collect();

        let config = Self::make_default_config()
            .add_source(source)
            .add_source(
                Environment::with_prefix(Self::ENVIRONMENT_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("run.require")
                    .with_list_parse_key("run.patterns")
                    .with_list_parse_key("report.framework-dirs")
                    .source(Some(env_vars)),
            )
            .build()
            .map_err(|err| ConfigParseError::new(config_file.clone(), err))?;

        let mut unknown = BTreeSet::new();
        let config: Self = serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            unknown.insert(path.to_string());
        })
        .map_err(|err| ConfigParseError::new(config_file.clone(), err))?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &unknown);
        }
        Ok(config)
    }

    /// Returns the options forwarded to the execution engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fail_fast: self.run.fail_fast,
            serial: self.run.serial,
            require: self.run.require.clone(),
        }
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}
