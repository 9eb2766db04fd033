use serde::Deserialize;

use crate::{delegate::prompter::DEFAULT_MAX_ATTEMPTS, gateway::EMULATOR, logging::LogFormat};

/// Start-up options of a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub verbose: bool,
    pub log_format: LogFormat,
    /// Project files, merged in order. The first one is written back.
    pub config_paths: Vec<String>,
    /// Network whose deployments `deploy` applies.
    pub network: String,
    pub prompt_max_attempts: u32,
    /// Execution unit workers; `0` lets the runtime decide.
    pub unit_threads: usize,
    pub echo_stdout: bool,
    /// Write the project file back after `install`.
    pub save_state: bool,
    /// Do not offer newly installed dependencies for deployment.
    pub skip_deployments: bool,
    /// Do not ask for dependency aliases on other networks.
    pub skip_alias: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: true,
            log_format: LogFormat::Text,
            config_paths: vec!["flow.json".to_owned()],
            network: EMULATOR.to_owned(),
            prompt_max_attempts: DEFAULT_MAX_ATTEMPTS,
            unit_threads: 0,
            echo_stdout: true,
            save_state: true,
            skip_deployments: false,
            skip_alias: false,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub const fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    #[must_use]
    pub fn config_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    #[must_use]
    pub const fn prompt_max_attempts(mut self, attempts: u32) -> Self {
        self.prompt_max_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn unit_threads(mut self, threads: usize) -> Self {
        self.unit_threads = threads;
        self
    }

    #[must_use]
    pub const fn echo_stdout(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    #[must_use]
    pub const fn save_state(mut self, save_state: bool) -> Self {
        self.save_state = save_state;
        self
    }

    #[must_use]
    pub const fn skip_deployments(mut self, skip: bool) -> Self {
        self.skip_deployments = skip;
        self
    }

    #[must_use]
    pub const fn skip_alias(mut self, skip: bool) -> Self {
        self.skip_alias = skip;
        self
    }
}
