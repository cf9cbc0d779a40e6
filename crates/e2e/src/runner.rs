//! Test runner that drives scenarios and built-in suites through the console

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::config::{DeadlineClass, RunConfig};
use crate::error::{E2eError, E2eResult};
use crate::flows::Console;
use crate::page::Page;
use crate::playwright::{PlaywrightConfig, PlaywrightPage};
use crate::poll::Poller;
use crate::spec::{Scenario, Step, Viewport};
use crate::suites::{Case, Suite};

/// Result of executing a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl TestResult {
    fn failed(name: impl Into<String>, error: &E2eError) -> Self {
        Self {
            name: name.into(),
            success: false,
            duration_ms: 0,
            steps: vec![],
            error: Some(error.to_string()),
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(results: Vec<TestResult>, started_at: DateTime<Utc>, duration: Duration) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = duration.as_millis() as u64;

        info!("");
        info!("Test Results: {} passed, {} failed, {} skipped ({} ms)", passed, failed, 0, duration_ms);

        Self {
            total: results.len(),
            passed,
            failed,
            skipped: 0,
            duration_ms,
            started_at,
            results,
        }
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub run: RunConfig,
    pub playwright: PlaywrightConfig,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backoff: Duration,
}

impl RunnerConfig {
    /// Defaults for everything but the run configuration
    pub fn new(run: RunConfig) -> Self {
        let playwright = PlaywrightConfig {
            base_url: run.base_url.clone(),
            command_timeout: run.timeouts.command,
            ..Default::default()
        };
        Self {
            run,
            playwright,
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
            backoff: crate::poll::DEFAULT_BACKOFF,
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
}

impl TestRunner {
    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Wait for the installer API before running anything
    pub async fn preflight(&self) -> E2eResult<()> {
        let timeouts = &self.config.run.timeouts;
        let api = ApiClient::new(&self.config.run.api_base_url, timeouts.get(DeadlineClass::ApiRequest))?;
        api.wait_until_reachable(&Poller::with_backoff(self.config.backoff), timeouts.get(DeadlineClass::ApiRequest))
            .await
    }

    /// Run all scenarios in the specs directory
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let scenarios = Scenario::load_all(&self.config.specs_dir)?;
        self.run_scenarios(&scenarios).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let scenarios = Scenario::load_all(&self.config.specs_dir)?;
        let filtered: Vec<Scenario> = Scenario::filter_by_tag(&scenarios, tag).into_iter().cloned().collect();
        self.run_scenarios(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_test(&self, name: &str) -> E2eResult<TestResult> {
        let scenarios = Scenario::load_all(&self.config.specs_dir)?;
        let scenario = scenarios
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;

        self.run_one(&scenario).await
    }

    /// Run a list of scenarios, each in a fresh browser
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running {} test(s)...", scenarios.len());

        for scenario in scenarios {
            let result = match self.run_one(scenario).await {
                Ok(result) => result,
                Err(e) => TestResult::failed(&scenario.name, &e),
            };
            log_result(&result);
            results.push(result);
        }

        Ok(TestSuiteResult::from_results(results, started_at, start.elapsed()))
    }

    async fn run_one(&self, scenario: &Scenario) -> E2eResult<TestResult> {
        let page = self.launch(Some(&scenario.viewport)).await?;
        let result = run_scenario(&self.console(&page), scenario).await;
        close(page).await;
        Ok(result)
    }

    /// Run every case of a built-in suite, each in a fresh browser
    pub async fn run_suite(&self, suite: &Suite) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running suite {} ({} case(s))...", suite.name, suite.cases.len());

        for case in &suite.cases {
            let result = match self.launch(None).await {
                Ok(page) => {
                    let result = run_case(&self.console(&page), suite, case).await;
                    close(page).await;
                    result
                }
                Err(e) => TestResult::failed(case_name(suite, case), &e),
            };
            log_result(&result);
            results.push(result);
        }

        Ok(TestSuiteResult::from_results(results, started_at, start.elapsed()))
    }

    async fn launch(&self, viewport: Option<&Viewport>) -> E2eResult<PlaywrightPage> {
        let mut config = self.config.playwright.clone();
        if let Some(viewport) = viewport {
            config.viewport_width = viewport.width;
            config.viewport_height = viewport.height;
        }
        PlaywrightPage::launch(config).await
    }

    fn console<'a>(&'a self, page: &'a dyn Page) -> Console<'a> {
        Console::new(page, &self.config.run).with_poller(Poller::with_backoff(self.config.backoff))
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn close(page: PlaywrightPage) {
    if let Err(e) = page.close().await {
        warn!("Failed to close browser: {}", e);
    }
}

fn log_result(result: &TestResult) {
    if result.success {
        info!("✓ {} ({} ms)", result.name, result.duration_ms);
    } else {
        error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
    }
}

fn case_name(suite: &Suite, case: &Case) -> String {
    format!("{} > {}", suite.name, case.name)
}

async fn timed<F>(name: String, work: F) -> StepResult
where
    F: std::future::Future<Output = E2eResult<()>>,
{
    let start = Instant::now();
    let outcome = work.await;
    StepResult {
        success: outcome.is_ok(),
        step_name: name,
        duration_ms: start.elapsed().as_millis() as u64,
        error: outcome.err().map(|e| e.to_string()),
    }
}

fn finish(name: String, start: Instant, steps: Vec<StepResult>) -> TestResult {
    let error = steps.iter().find(|s| !s.success).and_then(|s| s.error.clone());
    TestResult {
        name,
        success: error.is_none(),
        duration_ms: start.elapsed().as_millis() as u64,
        steps,
        error,
    }
}

/// Run a scenario's steps in order, stopping at the first failure
pub async fn run_scenario(console: &Console<'_>, scenario: &Scenario) -> TestResult {
    let start = Instant::now();
    debug!("Running test: {}", scenario.name);

    let mut steps = Vec::new();
    for step in &scenario.steps {
        let result = timed(step.name(), execute_step(console, step)).await;
        let failed = !result.success;
        steps.push(result);
        if failed {
            break;
        }
    }

    finish(scenario.name.clone(), start, steps)
}

/// Run one suite case after the suite's before-each hook
pub async fn run_case(console: &Console<'_>, suite: &Suite, case: &Case) -> TestResult {
    let start = Instant::now();
    let name = case_name(suite, case);
    debug!("Running test: {}", name);

    let mut steps = Vec::new();
    if let Some(before_each) = suite.before_each {
        let result = timed("before each".to_string(), before_each(console)).await;
        let failed = !result.success;
        steps.push(result);
        if failed {
            return finish(name, start, steps);
        }
    }
    steps.push(timed(case.name.to_string(), (case.run)(console)).await);

    finish(name, start, steps)
}

/// Execute a single scenario step
pub async fn execute_step(console: &Console<'_>, step: &Step) -> E2eResult<()> {
    let page = console.page();
    debug!("Executing step: {}", step.name());

    match step {
        Step::Visit { path } => page.visit(path).await,
        Step::Click { selector } => page.click(selector).await,
        Step::Type { selector, text } => page.type_text(selector, text).await,
        Step::Fill { selector, value, paste: true } => console.paste_text(selector, value).await,
        Step::Fill { selector, value, paste: false } => page.fill(selector, value).await,
        Step::Clear { selector } => page.clear(selector).await,
        Step::Press { selector, key } => page.press(selector, key).await,
        Step::Submit { selector } => page.submit(selector).await,
        Step::Select { selector, index } => page.select_option(selector, *index).await,
        Step::Expect(expect) => {
            let (probe, expectation) = expect.compile()?;
            let deadline = expect.deadline(&console.config().timeouts);
            console
                .expect_within(&expect.selector, probe, expectation, deadline)
                .await
                .map(drop)
        }
        Step::ExpectCluster { name, present } => console.expect_cluster_listed(name, *present).await,
        Step::Sleep { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(())
        }
        Step::Log { message } => {
            info!("[LOG] {}", message);
            Ok(())
        }
    }
}
