//! Playwright browser automation
//!
//! A generated Node script owns one browser page for the whole test and
//! executes commands it reads as JSON lines on stdin, answering each on
//! stdout. Requests the browser cancels on its own are recorded as harness
//! aborts so long-running waits can tell them apart from application errors.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{Page, Probe};
use crate::poll::Observed;

#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,

    /// How long a single action may auto-wait for its element
    pub command_timeout: Duration,

    /// How long the browser may take to come up
    pub launch_timeout: Duration,

    /// Directory whose `node_modules` provides `playwright`
    pub node_project_dir: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            command_timeout: Duration::from_secs(10),
            launch_timeout: Duration::from_secs(60),
            node_project_dir: PathBuf::from("."),
        }
    }
}

/// Command sent to the driver script
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Visit { path: &'a str },
    Click { selector: &'a str },
    Type { selector: &'a str, text: &'a str },
    Fill { selector: &'a str, value: &'a str },
    Clear { selector: &'a str },
    Press { selector: &'a str, key: &'a str },
    Submit { selector: &'a str },
    SelectOption { selector: &'a str, index: usize },
    Read { selector: &'a str, probe: Probe },
    Cookie { name: &'a str },
    TakeAborted,
    Close,
}

impl DriverCommand<'_> {
    fn name(&self) -> String {
        match self {
            DriverCommand::Visit { path } => format!("visit:{}", path),
            DriverCommand::Click { selector } => format!("click:{}", selector),
            DriverCommand::Type { selector, .. } => format!("type:{}", selector),
            DriverCommand::Fill { selector, .. } => format!("fill:{}", selector),
            DriverCommand::Clear { selector } => format!("clear:{}", selector),
            DriverCommand::Press { key, .. } => format!("press:{}", key),
            DriverCommand::Submit { selector } => format!("submit:{}", selector),
            DriverCommand::SelectOption { selector, index } => format!("select:{}[{}]", selector, index),
            DriverCommand::Read { selector, probe } => format!("read:{:?}:{}", probe, selector),
            DriverCommand::Cookie { name } => format!("cookie:{}", name),
            DriverCommand::TakeAborted => "take_aborted".to_string(),
            DriverCommand::Close => "close".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    timeout_ms: u64,
    #[serde(flatten)]
    command: DriverCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

struct DriverSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl DriverSession {
    async fn next_reply(&mut self, id: u64) -> E2eResult<DriverReply> {
        loop {
            let line = self.stdout.next_line().await?.ok_or(E2eError::DriverClosed)?;
            match serde_json::from_str::<DriverReply>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => debug!("Dropping stale driver reply {}", reply.id),
                Err(_) => debug!("driver: {}", line),
            }
        }
    }
}

/// A browser page driven through Playwright
pub struct PlaywrightPage {
    session: Mutex<DriverSession>,
    command_timeout: Duration,
    _script_dir: TempDir,
}

impl PlaywrightPage {
    /// Start a browser and open a page on the console
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::Builder::new()
            .prefix(".console-e2e-")
            .tempdir_in(&config.node_project_dir)?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, driver_script(&config)?)?;

        debug!("Starting Playwright driver: {}", script_path.display());

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&config.node_project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Driver(format!("failed to spawn node: {}", e)))?;

        let stdin = child.stdin.take().ok_or(E2eError::DriverClosed)?;
        let stdout = child.stdout.take().ok_or(E2eError::DriverClosed)?;

        let mut session = DriverSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
        };

        let ready = timeout(config.launch_timeout, session.next_reply(0))
            .await
            .map_err(|_| E2eError::Driver(format!("browser did not start within {:?}", config.launch_timeout)))??;
        if !ready.ok {
            return Err(E2eError::Driver(ready.error.unwrap_or_else(|| "launch failed".to_string())));
        }

        info!("Browser ready ({}, {})", config.browser.as_str(), config.base_url);

        Ok(Self {
            session: Mutex::new(session),
            command_timeout: config.command_timeout,
            _script_dir: script_dir,
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::DriverNotFound),
        }
    }

    async fn request(&self, command: DriverCommand<'_>) -> E2eResult<serde_json::Value> {
        let name = command.name();
        let mut session = self.session.lock().await;
        let id = session.next_id;
        session.next_id += 1;

        let mut line = serde_json::to_string(&Envelope {
            id,
            timeout_ms: self.command_timeout.as_millis() as u64,
            command,
        })?;
        line.push('\n');

        debug!("Driver command {}: {}", id, name);
        session.stdin.write_all(line.as_bytes()).await?;
        session.stdin.flush().await?;

        // The script enforces `timeout_ms` itself; this only guards a hung driver.
        let guard = self.command_timeout * 2 + Duration::from_secs(5);
        let reply = timeout(guard, session.next_reply(id))
            .await
            .map_err(|_| E2eError::Driver(format!("no reply to {} within {:?}", name, guard)))??;

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(E2eError::StepFailed {
                step: name,
                reason: reply.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }

    /// Close the browser and wait for the driver to exit
    pub async fn close(self) -> E2eResult<()> {
        if let Err(e) = self.request(DriverCommand::Close).await {
            warn!("Driver did not close cleanly: {}", e);
        }
        let mut session = self.session.into_inner();
        session.child.wait().await?;
        Ok(())
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn visit(&self, path: &str) -> E2eResult<()> {
        self.request(DriverCommand::Visit { path }).await.map(drop)
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.request(DriverCommand::Click { selector }).await.map(drop)
    }

    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.request(DriverCommand::Type { selector, text }).await.map(drop)
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.request(DriverCommand::Fill { selector, value }).await.map(drop)
    }

    async fn clear(&self, selector: &str) -> E2eResult<()> {
        self.request(DriverCommand::Clear { selector }).await.map(drop)
    }

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()> {
        self.request(DriverCommand::Press { selector, key }).await.map(drop)
    }

    async fn submit(&self, form_selector: &str) -> E2eResult<()> {
        self.request(DriverCommand::Submit { selector: form_selector }).await.map(drop)
    }

    async fn select_option(&self, selector: &str, index: usize) -> E2eResult<()> {
        self.request(DriverCommand::SelectOption { selector, index }).await.map(drop)
    }

    async fn read(&self, selector: &str, probe: Probe) -> E2eResult<Observed> {
        let value = self.request(DriverCommand::Read { selector, probe }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn cookie(&self, name: &str) -> E2eResult<Option<String>> {
        let value = self.request(DriverCommand::Cookie { name }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn take_aborted_requests(&self) -> E2eResult<Vec<String>> {
        let value = self.request(DriverCommand::TakeAborted).await?;
        Ok(serde_json::from_value(value)?)
    }
}

const DRIVER_TEMPLATE: &str = r#"
const { chromium, firefox, webkit } = require('playwright');
const readline = require('readline');

const ABORT_MARKERS = ['ERR_ABORTED', 'NS_BINDING_ABORTED', 'cancelled'];
const reply = (message) => process.stdout.write(JSON.stringify(message) + '\n');

(async () => {
  const browser = await __BROWSER__.launch({ headless: __HEADLESS__ });
  const context = await browser.newContext({
    viewport: { width: __WIDTH__, height: __HEIGHT__ },
    baseURL: __BASE_URL__,
  });
  const page = await context.newPage();

  let aborted = [];
  page.on('requestfailed', (request) => {
    const failure = request.failure();
    const text = failure ? failure.errorText : '';
    if (ABORT_MARKERS.some((marker) => text.includes(marker))) {
      aborted.push(request.url());
    }
  });

  const first = (selector) => page.locator(selector).first();
  const handlers = {
    visit: (c) => page.goto(c.path, { timeout: c.timeout_ms }).then(() => null),
    click: (c) => first(c.selector).click({ timeout: c.timeout_ms }),
    type: (c) => first(c.selector).pressSequentially(c.text, { timeout: c.timeout_ms }),
    fill: (c) => first(c.selector).fill(c.value, { timeout: c.timeout_ms }),
    clear: (c) => first(c.selector).fill('', { timeout: c.timeout_ms }),
    press: (c) => first(c.selector).press(c.key, { timeout: c.timeout_ms }),
    submit: (c) => first(c.selector).evaluate((form) => {
      if (form.requestSubmit) { form.requestSubmit(); } else { form.submit(); }
    }),
    select_option: (c) => first(c.selector).evaluate((select, index) => {
      select.selectedIndex = index;
      select.dispatchEvent(new Event('change', { bubbles: true }));
    }, c.index),
    read: async (c) => {
      const all = page.locator(c.selector);
      const n = await all.count();
      if (c.probe === 'count') return { kind: 'count', value: n };
      if (n === 0) return { kind: 'missing' };
      const el = all.first();
      switch (c.probe) {
        case 'text': return { kind: 'text', value: await el.innerText() };
        case 'value': return { kind: 'text', value: await el.inputValue() };
        case 'exists': return { kind: 'flag', value: true };
        case 'visible': return { kind: 'flag', value: await el.isVisible() };
        case 'enabled': return { kind: 'flag', value: await el.isEnabled() };
        case 'texts': return { kind: 'texts', value: await all.allInnerTexts() };
        default: throw new Error('unknown probe ' + c.probe);
      }
    },
    cookie: async (c) => {
      const cookies = await context.cookies();
      const found = cookies.find((cookie) => cookie.name === c.name);
      return found ? found.value : null;
    },
    take_aborted: async () => {
      const urls = aborted;
      aborted = [];
      return urls;
    },
    close: async () => null,
  };

  reply({ id: 0, ok: true, value: 'ready' });

  const input = readline.createInterface({ input: process.stdin });
  for await (const line of input) {
    if (!line.trim()) continue;
    let command;
    try {
      command = JSON.parse(line);
    } catch (error) {
      continue;
    }
    try {
      const handler = handlers[command.op];
      if (!handler) throw new Error('unknown op ' + command.op);
      const value = await handler(command);
      reply({ id: command.id, ok: true, value: value === undefined ? null : value });
    } catch (error) {
      reply({ id: command.id, ok: false, error: error.message });
    }
    if (command.op === 'close') break;
  }
  await browser.close();
})().catch((error) => {
  reply({ id: 0, ok: false, error: error.message });
  process.exit(1);
});
"#;

/// Render the driver script for a configuration
fn driver_script(config: &PlaywrightConfig) -> E2eResult<String> {
    Ok(DRIVER_TEMPLATE
        .replace("__BROWSER__", config.browser.as_str())
        .replace("__HEADLESS__", if config.headless { "true" } else { "false" })
        .replace("__WIDTH__", &config.viewport_width.to_string())
        .replace("__HEIGHT__", &config.viewport_height.to_string())
        .replace("__BASE_URL__", &serde_json::to_string(&config.base_url)?))
}
