//! Declarative YAML test scenarios

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::{DeadlineClass, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::page::Probe;
use crate::poll::{Comparison, Expectation};

/// A complete test scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a path (relative to the console base URL)
    Visit { path: String },

    /// Click an element
    Click { selector: String },

    /// Type text with keyboard simulation
    Type { selector: String, text: String },

    /// Replace an input's value; `paste` also nudges the field afterwards
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        paste: bool,
    },

    /// Clear an input field
    Clear { selector: String },

    /// Press a key in an element
    Press { selector: String, key: String },

    /// Submit a form
    Submit {
        #[serde(default = "default_form")]
        selector: String,
    },

    /// Select a dropdown option by index
    Select { selector: String, index: usize },

    /// Wait until an element satisfies a condition
    Expect(ExpectStep),

    /// Wait until the API lists (or stops listing) a cluster
    ExpectCluster {
        name: String,
        #[serde(default = "default_true")]
        present: bool,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_form() -> String {
    "form".to_string()
}

fn default_true() -> bool {
    true
}

/// Conditions on one element, all of which must hold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectStep {
    pub selector: String,

    /// What to read; inferred from the conditions when omitted
    #[serde(default)]
    pub probe: Option<Probe>,

    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub matches: Option<String>,
    #[serde(default)]
    pub one_of: Option<Vec<String>>,
    #[serde(default)]
    pub includes: Option<String>,

    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub gt: Option<f64>,
    #[serde(default)]
    pub ge: Option<f64>,
    #[serde(default)]
    pub lt: Option<f64>,
    #[serde(default)]
    pub le: Option<f64>,

    #[serde(default)]
    pub exists: Option<bool>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Class of wait; ignored when `timeout_ms` is given
    #[serde(default)]
    pub deadline: DeadlineClass,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExpectStep {
    /// Turn the conditions into a probe and a single expectation
    pub fn compile(&self) -> E2eResult<(Probe, Expectation)> {
        let probe = match self.probe {
            Some(probe) => probe,
            None => self.infer_probe()?,
        };

        let mut all = Vec::new();
        match self.exists {
            Some(true) => all.push(Expectation::Present),
            Some(false) => all.push(Expectation::Absent),
            None => {}
        }
        match self.visible {
            Some(true) => all.push(Expectation::IsTrue),
            Some(false) => all.push(Expectation::Hidden),
            None => {}
        }
        match self.enabled {
            Some(true) => all.push(Expectation::IsTrue),
            Some(false) => all.push(Expectation::IsTrue.not()),
            None => {}
        }
        if let Some(v) = &self.equals {
            all.push(Expectation::equals(v.clone()));
        }
        if let Some(v) = &self.contains {
            all.push(Expectation::contains(v.clone()));
        }
        if let Some(pattern) = &self.matches {
            all.push(Expectation::matches(pattern)?);
        }
        if let Some(set) = &self.one_of {
            all.push(Expectation::OneOf(set.clone()));
        }
        if let Some(v) = &self.includes {
            all.push(Expectation::includes(v.clone()));
        }
        if let Some(n) = self.count {
            all.push(Expectation::count(Comparison::Eq, n));
        }
        for (op, bound) in [
            (Comparison::Gt, self.gt),
            (Comparison::Ge, self.ge),
            (Comparison::Lt, self.lt),
            (Comparison::Le, self.le),
        ] {
            if let Some(n) = bound {
                all.push(Expectation::Compare(op, n));
            }
        }

        let expectation = match all.len() {
            0 => Expectation::Present,
            1 => all.remove(0),
            _ => Expectation::All(all),
        };
        Ok((probe, expectation))
    }

    fn infer_probe(&self) -> E2eResult<Probe> {
        let numeric = self.count.is_some()
            || self.gt.is_some()
            || self.ge.is_some()
            || self.lt.is_some()
            || self.le.is_some();
        let candidates = [
            (self.visible.is_some(), Probe::Visible),
            (self.enabled.is_some(), Probe::Enabled),
            (numeric, Probe::Count),
        ];
        let mut inferred = candidates.iter().filter(|(set, _)| *set).map(|(_, p)| *p);

        match (inferred.next(), inferred.next()) {
            (Some(_), Some(_)) => Err(E2eError::SpecParse(format!(
                "expect on '{}' mixes conditions for different probes; set `probe`",
                self.selector
            ))),
            (Some(probe), None) => Ok(probe),
            (None, _) if self.exists.is_some() => Ok(Probe::Exists),
            (None, _) => Ok(Probe::Text),
        }
    }

    /// How long this step may wait
    pub fn deadline(&self, timeouts: &Timeouts) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| timeouts.get(self.deadline))
    }
}

impl Step {
    /// Short label used in results and logs
    pub fn name(&self) -> String {
        match self {
            Step::Visit { path } => format!("visit:{}", path),
            Step::Click { selector } => format!("click:{}", selector),
            Step::Type { selector, .. } => format!("type:{}", selector),
            Step::Fill { selector, .. } => format!("fill:{}", selector),
            Step::Clear { selector } => format!("clear:{}", selector),
            Step::Press { key, .. } => format!("press:{}", key),
            Step::Submit { selector } => format!("submit:{}", selector),
            Step::Select { selector, index } => format!("select:{}[{}]", selector, index),
            Step::Expect(expect) => format!("expect:{}", expect.selector),
            Step::ExpectCluster { name, present } => {
                format!("expect_cluster:{}{}", if *present { "" } else { "!" }, name)
            }
            Step::Sleep { ms } => format!("sleep:{}ms", ms),
            Step::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl Scenario {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        for step in &scenario.steps {
            if let Step::Expect(expect) = step {
                expect.compile()?;
            }
        }
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }
}
