use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use vision_rpa::{Action, Driver, Executor, Screenshot};

use crate::dom;

/// How long a `wait` action pauses.
const WAIT_PAUSE: Duration = Duration::from_secs(2);
/// Time for the label overlay to paint before capture.
const OVERLAY_PAINT: Duration = Duration::from_millis(200);
const CLICK_PAUSE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Default)]
pub struct LaunchSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// DevTools URL of a running Chrome; launching is skipped when set.
    pub attach: Option<String>,
}

/// Browser session used for one run.
pub struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(settings: &LaunchSettings) -> Result<Self> {
        if let Some(url) = &settings.attach {
            info!(url, "attaching to running Chrome");
            let browser = Browser::connect(url.clone())
                .with_context(|| format!("could not attach to Chrome at {url}"))?;
            let existing = {
                let tabs = browser.get_tabs();
                let tabs = tabs
                    .lock()
                    .map_err(|_| anyhow::anyhow!("browser tab list is poisoned"))?;
                tabs.first().cloned()
            };
            let tab = match existing {
                Some(tab) => tab,
                None => browser.new_tab()?,
            };
            return Ok(Self {
                _browser: browser,
                tab,
            });
        }

        let profile = profile_dir()?;
        std::fs::create_dir_all(&profile)
            .with_context(|| format!("could not create profile dir {}", profile.display()))?;

        let path = settings.chrome_path.clone().or_else(find_chrome);
        debug!(?path, profile = %profile.display(), "launching Chrome");

        let options = LaunchOptions {
            headless: settings.headless,
            path,
            user_data_dir: Some(profile),
            window_size: Some((1280, 800)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--ignore-certificate-errors"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        let browser =
            Browser::new(options).map_err(|e| anyhow::anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

#[async_trait]
impl Driver for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            tab.wait_for_element("body")?;
            let landed = dom::get_current_url(&tab).unwrap_or_else(|_| "unknown".into());
            info!(landed, "page loaded");
            Ok(())
        })
        .await
        .context("navigation task panicked")?
    }

    async fn capture_screenshot(&self) -> Result<Screenshot> {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || -> Result<Screenshot> {
            match dom::label_elements(&tab) {
                Ok(count) => debug!(count, "labelled elements"),
                Err(e) => warn!("could not draw labels: {:#}", e),
            }
            std::thread::sleep(OVERLAY_PAINT);
            let png = tab
                .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .context("screenshot capture failed")?;
            Ok(Screenshot::from_png(png))
        })
        .await
        .context("screenshot task panicked")?
    }
}

#[async_trait]
impl Executor for BrowserSession {
    async fn execute(&self, actions: &[Action]) -> Result<()> {
        let tab = self.tab.clone();
        let actions = actions.to_vec();
        tokio::task::spawn_blocking(move || -> Result<()> {
            for action in &actions {
                perform(&tab, action).with_context(|| format!("failed to {action}"))?;
            }
            Ok(())
        })
        .await
        .context("executor task panicked")?
    }
}

fn perform(tab: &Arc<Tab>, action: &Action) -> Result<()> {
    match action {
        Action::Click { target, .. } => {
            let selector = dom::label_selector(target)?;
            let el = tab
                .find_element(&selector)
                .with_context(|| format!("no element labelled {target}"))?;
            el.click()?;
            std::thread::sleep(CLICK_PAUSE);
        }
        Action::Type { value, .. } => {
            tab.type_str(value)?;
        }
        Action::Wait { .. } => std::thread::sleep(WAIT_PAUSE),
        Action::Error { .. } | Action::Finish { .. } => {}
    }
    Ok(())
}

/// Persistent profile so logins survive between runs.
fn profile_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| anyhow::anyhow!("no cache or working directory available"))?;
    Ok(base.join("vision-rpa").join("profile"))
}

fn find_chrome() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = vec![
        PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
        PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/usr/bin/google-chrome"),
        PathBuf::from("/usr/bin/chromium"),
        PathBuf::from("/usr/bin/chromium-browser"),
    ];
    if let Some(local) = dirs::data_local_dir() {
        candidates.push(local.join(r"Google\Chrome\Application\chrome.exe"));
    }
    candidates.into_iter().find(|p| p.exists())
}

