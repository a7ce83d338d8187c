//! chromiumoxide implementation of the export session.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{find_chrome, xpath_for_text};
use crate::config::{BrowserEngineConfig, WaitConfig};
use crate::fetcher::{ExportSession, SessionError, SessionLauncher, Target};

impl From<CdpError> for SessionError {
    fn from(e: CdpError) -> Self {
        SessionError::Browser(e.to_string())
    }
}

/// Launches one Chrome per job, or opens a private browser context in a
/// remote browser.
pub struct ChromeLauncher {
    config: BrowserEngineConfig,
    wait: WaitConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserEngineConfig, wait: WaitConfig) -> Self {
        Self { config, wait }
    }

    /// Launch options for a local Chrome using `profile` as its user data dir.
    fn local_config(&self, chrome_path: PathBuf, profile: &Path) -> Result<BrowserConfig, SessionError> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile);

        // Set headless mode (with_head means NOT headless, confusingly)
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        builder.build().map_err(|e| {
            SessionError::Unavailable(format!("Failed to build browser config: {}", e))
        })
    }

    async fn launch_local(&self, profile: &Path) -> Result<(Browser, JoinHandle<()>), SessionError> {
        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = find_chrome(self.config.chrome_path.as_deref())?;
        let config = self.local_config(chrome_path, profile)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Unavailable(format!("Failed to launch browser: {}", e)))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handle))
    }

    async fn connect_remote(&self, url: &str) -> Result<(Browser, JoinHandle<()>), SessionError> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let unavailable = |what: &str, e: reqwest::Error| {
            SessionError::Unavailable(format!("{}: {}", what, e))
        };
        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| unavailable("Failed to connect to remote browser", e))?
            .json()
            .await
            .map_err(|e| unavailable("Failed to parse browser version info", e))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SessionError::Unavailable("No webSocketDebuggerUrl in response".to_string())
            })?;

        debug!("Connecting to WebSocket: {}", ws_url);
        let (browser, mut handler) = Browser::connect(ws_url).await.map_err(|e| {
            SessionError::Unavailable(format!("Failed to connect to remote browser: {}", e))
        })?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handle))
    }
}

fn scratch_dir(prefix: &str) -> Result<TempDir, SessionError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| SessionError::Unavailable(format!("Failed to create temporary directory: {}", e)))
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn ExportSession>, SessionError> {
        let remote = self.config.remote_url.is_some();
        // Every local Chrome needs its own profile; a shared one is locked
        // by the first process and leaks cookies between jobs.
        let (browser, handler, profile) = match self.config.remote_url.as_deref() {
            Some(url) => {
                let (browser, handler) = self.connect_remote(url).await?;
                (browser, handler, None)
            }
            None => {
                let profile = scratch_dir("sitereports-profile-")?;
                let (browser, handler) = self.launch_local(profile.path()).await?;
                (browser, handler, Some(profile))
            }
        };

        let staging = scratch_dir("sitereports-download-")?;

        // Cookies and download settings are scoped to this context, so jobs
        // sharing a remote browser cannot see each other's files or logins.
        let context = browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;

        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .browser_context_id(context.clone())
            .download_path(staging.path().to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(SessionError::Unavailable)?;
        browser.execute(behavior).await?;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(SessionError::Unavailable)?;
        let page = browser.new_page(target).await?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            handler,
            page,
            context,
            staging,
            _profile: profile,
            remote,
            navigation_timeout: Duration::from_secs(self.config.timeout),
            poll_interval: self.wait.poll_interval(),
        }))
    }
}

/// One job's browser, page and download staging directory.
struct ChromeSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    page: Page,
    context: BrowserContextId,
    staging: TempDir,
    /// Local Chrome profile, removed once the browser is gone.
    _profile: Option<TempDir>,
    remote: bool,
    navigation_timeout: Duration,
    poll_interval: Duration,
}

impl ChromeSession {
    async fn locate(&self, target: &Target) -> Result<Element, CdpError> {
        match target {
            Target::Css(selector) => self.page.find_element(selector.as_str()).await,
            Target::Text(text) => self.page.find_xpath(xpath_for_text(text)).await,
        }
    }

    /// Poll for `target` until it shows up or `timeout` passes.
    async fn poll(&self, target: &Target, timeout: Duration) -> Result<Element, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.locate(target).await {
                Ok(element) => return Ok(element),
                Err(e) => debug!("{} not ready yet: {}", target, e),
            }
            if Instant::now() >= deadline {
                return Err(SessionError::NotReady {
                    target: target.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ExportSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(SessionError::NavigationTimeout(self.navigation_timeout)),
        }
    }

    async fn wait_for(&mut self, target: &Target, timeout: Duration) -> Result<(), SessionError> {
        self.poll(target, timeout).await.map(|_| ())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), SessionError> {
        let element = self.page.find_element(selector).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await?;
        element.click().await?.type_str(value).await?;
        Ok(())
    }

    async fn click(&mut self, target: &Target) -> Result<(), SessionError> {
        self.locate(target).await?.click().await?;
        Ok(())
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<(), SessionError> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(SessionError::NavigationTimeout(timeout)),
        }
    }

    async fn click_and_download(
        &mut self,
        target: &Target,
        timeout: Duration,
    ) -> Result<PathBuf, SessionError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| SessionError::Browser("session already closed".to_string()))?;

        let frame = self
            .page
            .mainframe()
            .await?
            .map(|frame| frame.inner().clone());
        let mut tracker = DownloadTracker::new(frame);

        // Subscribe before clicking so the download cannot be missed.
        let begins = browser
            .event_listener::<EventDownloadWillBegin>()
            .await?
            .map(DownloadEvent::Begin);
        let updates = browser
            .event_listener::<EventDownloadProgress>()
            .await?
            .map(DownloadEvent::Progress);
        let mut events = futures::stream::select(begins, updates);
        self.locate(target).await?.click().await?;

        let finished = async {
            while let Some(event) = events.next().await {
                let settled = match event {
                    DownloadEvent::Begin(event) => {
                        tracker.begin(event.frame_id.inner(), &event.guid)
                    }
                    DownloadEvent::Progress(event) => tracker.progress(&event.guid, &event.state),
                };
                if let Some(result) = settled {
                    return result;
                }
            }
            Err(SessionError::Download(
                "browser closed before the download finished".to_string(),
            ))
        };

        let guid = tokio::time::timeout(timeout, finished)
            .await
            .map_err(|_| {
                SessionError::Download(format!(
                    "no finished download within {}s",
                    timeout.as_secs()
                ))
            })??;

        let path = self.staging.path().join(&guid);
        if !path.exists() {
            return Err(SessionError::Download(format!(
                "browser reported download {} but no file was written",
                guid
            )));
        }
        debug!("Download {} finished", guid);
        Ok(path)
    }

    async fn close(mut self: Box<Self>) {
        if let Err(e) = self.page.clone().close().await {
            debug!("Failed to close page: {}", e);
        }
        if let Some(mut browser) = self.browser.take() {
            let dispose = DisposeBrowserContextParams::new(self.context.clone());
            if let Err(e) = browser.execute(dispose).await {
                debug!("Failed to dispose browser context: {}", e);
            }
            // A remote browser is shared; only our context goes away.
            if !self.remote {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser: {}", e);
                }
                let _ = browser.wait().await;
            }
        }
        self.handler.abort();
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // Dropping the Browser kills a launched Chrome process.
        self.handler.abort();
    }
}

enum DownloadEvent {
    Begin(Arc<EventDownloadWillBegin>),
    Progress(Arc<EventDownloadProgress>),
}

/// Picks this page's download out of the browser-wide download events.
///
/// A guid belongs to us once `downloadWillBegin` names our main frame. The
/// two event streams are not ordered against each other, so a guid that
/// finishes before it is claimed is remembered until its begin event shows up.
struct DownloadTracker {
    frame: Option<String>,
    ours: HashSet<String>,
    settled: Vec<(String, DownloadProgressState)>,
}

impl DownloadTracker {
    fn new(frame: Option<String>) -> Self {
        Self {
            frame,
            ours: HashSet::new(),
            settled: Vec::new(),
        }
    }

    fn begin(&mut self, frame_id: &str, guid: &str) -> Option<Result<String, SessionError>> {
        if let Some(ref frame) = self.frame {
            if frame != frame_id {
                debug!("Ignoring download {} from frame {}", guid, frame_id);
                return None;
            }
        }
        self.ours.insert(guid.to_string());

        let early = self.settled.iter().position(|(g, _)| g == guid)?;
        let (guid, state) = self.settled.swap_remove(early);
        Self::outcome(guid, &state)
    }

    fn progress(
        &mut self,
        guid: &str,
        state: &DownloadProgressState,
    ) -> Option<Result<String, SessionError>> {
        if self.ours.contains(guid) {
            return Self::outcome(guid.to_string(), state);
        }
        if !matches!(state, DownloadProgressState::InProgress) {
            self.settled.push((guid.to_string(), state.clone()));
        }
        None
    }

    fn outcome(guid: String, state: &DownloadProgressState) -> Option<Result<String, SessionError>> {
        match state {
            DownloadProgressState::Completed => Some(Ok(guid)),
            DownloadProgressState::Canceled => Some(Err(SessionError::Download(
                "download was canceled".to_string(),
            ))),
            _ => None,
        }
    }
}
