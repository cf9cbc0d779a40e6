//! Condition polling
//!
//! The console changes state asynchronously (cluster creation, host
//! discovery, installation progress) and never pushes notifications, so
//! tests synchronize with it by sampling. A [`Poller`] repeatedly takes an
//! [`Observation`], checks it against an [`Expectation`] and stops at the
//! first satisfied sample or once the deadline has elapsed. Every call
//! yields exactly one [`Outcome`].

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

/// Default wait between two samples
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// How many times a harness-aborted trigger is re-issued
const HARNESS_ABORT_RETRIES: u32 = 1;

/// A value read from the UI or the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Observed {
    /// The element does not exist
    Missing,
    Text(String),
    Texts(Vec<String>),
    Count(u64),
    Flag(bool),
    Json(serde_json::Value),
}

impl Observed {
    /// Textual candidates a string expectation is matched against
    fn candidates(&self) -> Vec<Cow<'_, str>> {
        match self {
            Observed::Missing => vec![],
            Observed::Text(t) => vec![Cow::Borrowed(t.as_str())],
            Observed::Texts(ts) => ts.iter().map(|t| Cow::Borrowed(t.as_str())).collect(),
            Observed::Count(n) => vec![Cow::Owned(n.to_string())],
            Observed::Flag(b) => vec![Cow::Owned(b.to_string())],
            Observed::Json(serde_json::Value::Array(items)) => items.iter().map(json_candidate).collect(),
            Observed::Json(value) => vec![json_candidate(value)],
        }
    }

    /// Numeric reading, if the value has one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Observed::Count(n) => Some(*n as f64),
            Observed::Text(t) => t.trim().parse().ok(),
            Observed::Texts(ts) => Some(ts.len() as f64),
            Observed::Json(serde_json::Value::Array(items)) => Some(items.len() as f64),
            Observed::Json(v) => v.as_f64(),
            Observed::Missing | Observed::Flag(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Observed::Missing)
    }
}

fn json_candidate(value: &serde_json::Value) -> Cow<'_, str> {
    match value {
        serde_json::Value::String(s) => Cow::Borrowed(s.as_str()),
        serde_json::Value::Object(map) => match map.get("name").and_then(|n| n.as_str()) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(value.to_string()),
        },
        other => Cow::Owned(other.to_string()),
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Missing => write!(f, "<missing>"),
            Observed::Text(t) => write!(f, "{:?}", t),
            Observed::Texts(ts) => write!(f, "{:?}", ts),
            Observed::Count(n) => write!(f, "{} element(s)", n),
            Observed::Flag(b) => write!(f, "{}", b),
            Observed::Json(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn holds(self, actual: f64, expected: f64) -> bool {
        match self {
            Comparison::Eq => (actual - expected).abs() < f64::EPSILON,
            Comparison::Gt => actual > expected,
            Comparison::Ge => actual >= expected,
            Comparison::Lt => actual < expected,
            Comparison::Le => actual <= expected,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
        }
    }
}

/// A predicate over an [`Observed`] value
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Something is there (a non-empty count or list counts as present)
    Present,
    /// Nothing is there
    Absent,
    /// Exactly one value, equal after trimming
    Equals(String),
    /// Any value contains the substring
    Contains(String),
    /// Any value matches the pattern
    Matches(Regex),
    /// The value is a member of the set
    OneOf(Vec<String>),
    /// The list has this item
    Includes(String),
    /// Numeric comparison against the reading
    Compare(Comparison, f64),
    IsTrue,
    /// Missing or false
    Hidden,
    Not(Box<Expectation>),
    All(Vec<Expectation>),
}

impl Expectation {
    /// Compile a regex expectation
    pub fn matches(pattern: &str) -> E2eResult<Self> {
        Regex::new(pattern)
            .map(Expectation::Matches)
            .map_err(|e| E2eError::SpecParse(format!("invalid pattern '{}': {}", pattern, e)))
    }

    pub fn equals(value: impl Into<String>) -> Self {
        Expectation::Equals(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Expectation::Contains(value.into())
    }

    pub fn includes(value: impl Into<String>) -> Self {
        Expectation::Includes(value.into())
    }

    pub fn count(op: Comparison, n: usize) -> Self {
        Expectation::Compare(op, n as f64)
    }

    pub fn not(self) -> Self {
        Expectation::Not(Box::new(self))
    }

    /// Evaluate the predicate
    pub fn is_met(&self, observed: &Observed) -> bool {
        match self {
            Expectation::Present => match observed {
                Observed::Missing => false,
                Observed::Count(n) => *n > 0,
                Observed::Texts(ts) => !ts.is_empty(),
                _ => true,
            },
            Expectation::Absent => !Expectation::Present.is_met(observed),
            Expectation::Equals(expected) => {
                let candidates = observed.candidates();
                candidates.len() == 1 && candidates[0].trim() == expected.trim()
            }
            Expectation::Contains(needle) => {
                observed.candidates().iter().any(|c| c.contains(needle.as_str()))
            }
            Expectation::Matches(re) => observed.candidates().iter().any(|c| re.is_match(c)),
            Expectation::OneOf(set) => {
                let candidates = observed.candidates();
                candidates.len() == 1 && set.iter().any(|s| s.trim() == candidates[0].trim())
            }
            Expectation::Includes(item) => {
                observed.candidates().iter().any(|c| c.trim() == item.trim())
            }
            Expectation::Compare(op, expected) => observed
                .as_number()
                .map(|actual| op.holds(actual, *expected))
                .unwrap_or(false),
            Expectation::IsTrue => matches!(observed, Observed::Flag(true)),
            Expectation::Hidden => matches!(observed, Observed::Missing | Observed::Flag(false)),
            Expectation::Not(inner) => !inner.is_met(observed),
            Expectation::All(all) => all.iter().all(|e| e.is_met(observed)),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Present => write!(f, "exist"),
            Expectation::Absent => write!(f, "not exist"),
            Expectation::Equals(v) => write!(f, "equal {:?}", v),
            Expectation::Contains(v) => write!(f, "contain {:?}", v),
            Expectation::Matches(re) => write!(f, "match /{}/", re.as_str()),
            Expectation::OneOf(set) => write!(f, "be one of {:?}", set),
            Expectation::Includes(v) => write!(f, "include {:?}", v),
            Expectation::Compare(op, n) => write!(f, "be {} {}", op.symbol(), n),
            Expectation::IsTrue => write!(f, "be true"),
            Expectation::Hidden => write!(f, "be hidden"),
            Expectation::Not(inner) => write!(f, "not {}", inner),
            Expectation::All(all) => {
                let parts: Vec<String> = all.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", parts.join(" and "))
            }
        }
    }
}

type ReadFn<'a> = Box<dyn Fn() -> BoxFuture<'a, E2eResult<Observed>> + Send + Sync + 'a>;

/// A named, non-mutating read of external state
pub struct Observation<'a> {
    description: String,
    read: ReadFn<'a>,
}

impl<'a> Observation<'a> {
    pub fn new<F>(description: impl Into<String>, read: F) -> Self
    where
        F: Fn() -> BoxFuture<'a, E2eResult<Observed>> + Send + Sync + 'a,
    {
        Self {
            description: description.into(),
            read: Box::new(read),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Take one sample
    pub async fn sample(&self) -> E2eResult<Observed> {
        (self.read)().await
    }
}

impl fmt::Debug for Observation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Terminal result of a polling cycle
#[derive(Debug, Clone)]
pub enum Outcome {
    Satisfied {
        value: Observed,
        elapsed: Duration,
        samples: u32,
    },
    TimedOut(TimeoutReport),
}

/// Diagnostics for a poll that never saw its expectation hold
#[derive(Debug, Clone)]
pub struct TimeoutReport {
    pub observation: String,
    pub expectation: String,
    pub elapsed: Duration,
    pub samples: u32,
    pub last: Option<Observed>,
    pub last_error: Option<String>,
    /// Harness aborts seen while polling
    pub aborts: u32,
}

impl Outcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Outcome::Satisfied { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Outcome::Satisfied { elapsed, .. } => *elapsed,
            Outcome::TimedOut(report) => report.elapsed,
        }
    }

    /// Satisfied value, or a timeout error carrying the report
    pub fn into_result(self) -> E2eResult<Observed> {
        match self {
            Outcome::Satisfied { value, .. } => Ok(value),
            Outcome::TimedOut(report) => Err(report.into()),
        }
    }
}

impl From<TimeoutReport> for E2eError {
    fn from(report: TimeoutReport) -> Self {
        let mut last = match (&report.last, &report.last_error) {
            (_, Some(err)) => format!("error: {}", err),
            (Some(value), None) => value.to_string(),
            (None, None) => "nothing".to_string(),
        };
        if report.aborts > 0 {
            last.push_str(&format!(" (request aborted by the harness {} time(s))", report.aborts));
        }
        E2eError::Timeout {
            observation: report.observation,
            expectation: report.expectation,
            elapsed: report.elapsed,
            samples: report.samples,
            last,
        }
    }
}

/// Running sample bookkeeping for one poll
#[derive(Default)]
struct Tally {
    samples: u32,
    last: Option<Observed>,
    last_error: Option<String>,
}

impl Tally {
    async fn sample(&mut self, observation: &Observation<'_>, expectation: &Expectation) -> Option<Observed> {
        self.samples += 1;
        match observation.sample().await {
            Ok(value) if expectation.is_met(&value) => {
                debug!("{} -> {} (satisfied)", observation.description(), value);
                Some(value)
            }
            Ok(value) => {
                debug!("{} -> {} (waiting to {})", observation.description(), value, expectation);
                self.last = Some(value);
                self.last_error = None;
                None
            }
            Err(e) => {
                debug!("{} failed: {}", observation.description(), e);
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    fn report(self, observation: &Observation<'_>, expectation: &Expectation, elapsed: Duration, aborts: u32) -> TimeoutReport {
        TimeoutReport {
            observation: observation.description().to_string(),
            expectation: expectation.to_string(),
            elapsed,
            samples: self.samples,
            last: self.last,
            last_error: self.last_error,
            aborts,
        }
    }
}

/// Samples observations until they satisfy an expectation or time runs out
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    backoff: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self { backoff: DEFAULT_BACKOFF }
    }
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wait between samples (at least 1 ms)
    pub fn with_backoff(backoff: Duration) -> Self {
        Self {
            backoff: backoff.max(Duration::from_millis(1)),
        }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Poll until `expectation` holds for `observation` or `deadline` elapses
    pub async fn poll(&self, observation: &Observation<'_>, expectation: &Expectation, deadline: Duration) -> Outcome {
        let start = Instant::now();
        let mut tally = Tally::default();

        loop {
            if let Some(value) = tally.sample(observation, expectation).await {
                return Outcome::Satisfied {
                    value,
                    elapsed: start.elapsed(),
                    samples: tally.samples,
                };
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Outcome::TimedOut(tally.report(observation, expectation, elapsed, 0));
            }
            sleep(self.backoff.min(deadline - elapsed)).await;
        }
    }

    /// [`poll`](Self::poll), with a timeout turned into an error
    pub async fn wait_for(&self, observation: &Observation<'_>, expectation: &Expectation, deadline: Duration) -> E2eResult<Observed> {
        self.poll(observation, expectation, deadline).await.into_result()
    }

    /// Poll the effect of a long-running action the harness may abort.
    ///
    /// `trigger` is called with the attempt number (0, then 1 on retry) and
    /// starts the action. `aborted` reports whether the harness cancelled an
    /// in-flight request since it was last asked. The first such abort
    /// re-issues the trigger once and restarts the deadline; a second one
    /// ends the poll as timed out.
    pub async fn poll_with_abort_retry<T, TF, A, AF>(
        &self,
        mut trigger: T,
        aborted: A,
        observation: &Observation<'_>,
        expectation: &Expectation,
        deadline: Duration,
    ) -> E2eResult<Outcome>
    where
        T: FnMut(u32) -> TF,
        TF: Future<Output = E2eResult<()>>,
        A: Fn() -> AF,
        AF: Future<Output = E2eResult<bool>>,
    {
        trigger(0).await?;

        // Reports cover the whole exchange; the deadline restarts on retry.
        let first_trigger = Instant::now();
        let mut start = first_trigger;
        let mut aborts = 0;
        let mut tally = Tally::default();

        loop {
            if aborted().await? {
                aborts += 1;
                if aborts > HARNESS_ABORT_RETRIES {
                    warn!("{} aborted by the harness again, giving up", observation.description());
                    return Ok(Outcome::TimedOut(tally.report(
                        observation,
                        expectation,
                        first_trigger.elapsed(),
                        aborts,
                    )));
                }
                warn!("Long-running request aborted by the harness, retrying the action");
                trigger(aborts).await?;
                start = Instant::now();
                continue;
            }

            if let Some(value) = tally.sample(observation, expectation).await {
                return Ok(Outcome::Satisfied {
                    value,
                    elapsed: first_trigger.elapsed(),
                    samples: tally.samples,
                });
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Ok(Outcome::TimedOut(tally.report(
                    observation,
                    expectation,
                    first_trigger.elapsed(),
                    aborts,
                )));
            }
            sleep(self.backoff.min(deadline - elapsed)).await;
        }
    }
}
