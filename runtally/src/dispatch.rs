// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, ValueEnum};
use runtally_runner::{
    config::{DefaultConfigWarnings, RuntallyConfig},
    engine::ProcessEngine,
    reporter::{FormatVersion, RenderMode, ReporterBuilder, ShowStatus},
    runner::RunDriver,
};
use tracing::debug;

/// Run test targets and tally their results.
///
/// Each test target is run as a child process. A live status line tracks passed and failed
/// tests; when the run finishes, failures are listed with their summarized stack traces.
///
/// Use --message-format json to get one machine-readable record per line on stdout instead.
#[derive(Debug, Parser)]
#[command(version, name = "runtally", styles = clap_styles::style())]
pub struct RuntallyApp {
    /// Test files, directories or glob patterns [default: from config]
    #[arg(value_name = "PATTERNS")]
    patterns: Vec<String>,

    #[command(flatten)]
    run_opts: RunOpts,

    #[command(flatten)]
    reporter_opts: ReporterOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    output: OutputOpts,
}

impl RuntallyApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(
        self,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let cwd = std::env::current_dir().map_err(ExpectedError::current_dir_failed)?;
        let cwd = Utf8PathBuf::try_from(cwd)
            .map_err(|err| ExpectedError::current_dir_invalid_utf8(err.into_path_buf()))?;
        self.exec_in(&cwd, std::env::vars(), output, output_writer)
    }

    fn exec_in(
        self,
        cwd: &Utf8Path,
        env: impl IntoIterator<Item = (String, String)>,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let mut config = self.config_opts.make_config(cwd, env)?;
        self.run_opts.apply(&mut config);
        self.reporter_opts.apply(&mut config);

        let patterns = if self.patterns.is_empty() {
            config.run.patterns.clone()
        } else {
            self.patterns
        };

        let mut builder = ReporterBuilder::default();
        builder
            .set_render_mode(config.report.message_format)
            .set_show_status(config.report.status)
            .set_colorize(output.color.should_colorize(supports_color::Stream::Stderr))
            .set_format_version(FormatVersion::parse(
                self.reporter_opts.message_format_version.as_deref(),
            )?)
            .set_framework_dirs(framework_dirs(cwd, install_dir().as_deref(), &config));

        let engine = ProcessEngine::new(cwd, patterns, config.engine_config());

        let (stdout, stderr) = output_writer.reporter_output();
        let aggregator = builder.build(stdout, stderr);
        let mut driver = RunDriver::new()?;
        let outcome = driver.execute(engine, aggregator)?;
        debug!(
            elapsed = ?outcome.elapsed,
            exit_code = outcome.exit_code(),
            "run finished"
        );

        Ok(outcome.exit_code())
    }
}

/// Returns the directories whose stack frames are hidden in failure reports: the directory
/// runtally is installed in, unless it lies within `cwd`, followed by any configured ones.
fn framework_dirs(
    cwd: &Utf8Path,
    install_dir: Option<&Utf8Path>,
    config: &RuntallyConfig,
) -> Vec<String> {
    let install_dir = install_dir.filter(|dir| {
        let inside = dir.starts_with(cwd);
        if inside {
            debug!("not hiding frames from {dir}, which is within the working directory");
        }
        !inside
    });
    install_dir
        .map(|dir| dir.to_string())
        .into_iter()
        .chain(config.report.framework_dirs.iter().cloned())
        .collect()
}

fn install_dir() -> Option<Utf8PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let exe = Utf8PathBuf::try_from(exe).ok()?;
    exe.parent().map(Utf8Path::to_owned)
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Run options")]
struct RunOpts {
    /// Stop starting new tests after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Run tests one at a time
    #[arg(long)]
    serial: bool,

    /// Preload the given module before each test (may be repeated)
    #[arg(long, value_name = "MODULE")]
    require: Vec<String>,
}

impl RunOpts {
    fn apply(&self, config: &mut RuntallyConfig) {
        if self.fail_fast {
            config.run.fail_fast = true;
        }
        if self.serial {
            config.run.serial = true;
        }
        if !self.require.is_empty() {
            config.run.require = self.require.clone();
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Reporter options")]
struct ReporterOpts {
    /// Output format [default: human]
    #[arg(long, value_enum, value_name = "FMT")]
    message_format: Option<MessageFormatOpts>,

    /// Version of the machine-readable output format
    #[arg(long, value_name = "VERSION")]
    message_format_version: Option<String>,

    /// How to show the status line in human mode [default: auto]
    #[arg(long, value_enum, value_name = "WHEN")]
    status: Option<StatusOpt>,
}

impl ReporterOpts {
    fn apply(&self, config: &mut RuntallyConfig) {
        if let Some(message_format) = self.message_format {
            config.report.message_format = message_format.into();
        }
        if let Some(status) = self.status {
            config.report.status = status.into();
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MessageFormatOpts {
    /// Status line and final report on stderr
    Human,
    /// One JSON record per line on stdout
    Json,
}

impl From<MessageFormatOpts> for RenderMode {
    fn from(opts: MessageFormatOpts) -> Self {
        match opts {
            MessageFormatOpts::Human => RenderMode::Interactive,
            MessageFormatOpts::Json => RenderMode::Protocol,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StatusOpt {
    /// Redraw in place on an interactive terminal, otherwise one line per update
    Auto,
    /// Redraw in place
    Live,
    /// One line per update
    Lines,
    /// No status line
    None,
}

impl From<StatusOpt> for ShowStatus {
    fn from(opt: StatusOpt) -> Self {
        match opt {
            StatusOpt::Auto => ShowStatus::Auto,
            StatusOpt::Live => ShowStatus::Live,
            StatusOpt::Lines => ShowStatus::Lines,
            StatusOpt::None => ShowStatus::None,
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/runtally.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(
        &self,
        cwd: &Utf8Path,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<RuntallyConfig, ExpectedError> {
        Ok(RuntallyConfig::from_sources_with_env(
            cwd,
            self.config_file.as_deref(),
            env,
            &mut DefaultConfigWarnings,
        )?)
    }
}
