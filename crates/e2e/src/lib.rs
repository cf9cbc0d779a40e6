//! Console E2E Test Framework
//!
//! This crate drives the assisted-installer console from Rust:
//! - Controls a Playwright browser over a JSON-lines driver
//! - Synchronizes with the asynchronous console by polling conditions
//! - Checks cluster state directly against the installer REST API
//! - Runs declarative YAML scenarios and built-in Rust suites
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── run_scenarios([Scenario]) -> TestSuiteResult         │
//! │    └── run_suite(Suite) -> TestSuiteResult                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Console (flows)           ApiClient (api)                  │
//! │    ├── create_cluster        └── list_cluster_names         │
//! │    ├── generate_iso                                         │
//! │    └── wait_for_*  ──────►  Poller (poll)                   │
//! │                               ├── poll(obs, exp, deadline)  │
//! │                               └── poll_with_abort_retry     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (trait)  ◄──  PlaywrightPage (node driver process)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod flows;
pub mod page;
pub mod playwright;
pub mod poll;
pub mod runner;
pub mod selectors;
pub mod spec;
pub mod suites;

pub use config::{DeadlineClass, RunConfig, Timeouts};
pub use error::{E2eError, E2eResult};
pub use flows::Console;
pub use page::{Page, Probe};
pub use poll::{Comparison, Expectation, Observation, Observed, Outcome, Poller};
pub use runner::TestRunner;
pub use spec::{Scenario, Step};
