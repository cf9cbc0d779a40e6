//! Command line of the harness binary

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::config::RunConfig;
use crate::playwright::Browser;
use crate::runner::RunnerConfig;

#[derive(Parser, Debug)]
#[command(name = "console-e2e")]
#[command(about = "E2E test runner for the assisted-installer console")]
pub struct HarnessArgs {
    /// Run a built-in suite (managed-clusters, cluster-installation)
    #[arg(long, conflicts_with_all = ["tag", "name"])]
    pub suite: Option<String>,

    /// Path to YAML scenarios directory
    #[arg(short, long, default_value = "specs")]
    pub specs: PathBuf,

    /// Run only scenarios matching this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    pub browser: Browser,

    /// Run in headless mode; `--headless false` shows the browser
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub headless: bool,

    /// Directory holding node_modules with playwright
    #[arg(long, default_value = ".")]
    pub node_project: PathBuf,

    /// Milliseconds between two samples of a condition
    #[arg(long, default_value = "250")]
    pub backoff_ms: u64,

    /// Skip waiting for the installer API before running
    #[arg(long)]
    pub skip_preflight: bool,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,
}

impl HarnessArgs {
    /// Runner configuration for `run` with the command line applied
    pub fn runner_config(&self, run: RunConfig) -> RunnerConfig {
        let mut config = RunnerConfig::new(run);
        config.playwright.browser = self.browser;
        config.playwright.headless = self.headless;
        config.playwright.node_project_dir = self.node_project.clone();
        config.specs_dir = self.specs.clone();
        config.output_dir = self.output.clone();
        config.backoff = Duration::from_millis(self.backoff_ms);
        config
    }
}
