use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::CrawlerError;
use crate::config::CrawlerConfig;

const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.182 Safari/537.36",
];

/// Extra wait after navigation so client-side rendering can finish.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Fetches fully rendered HTML.
#[async_trait]
pub trait PageSource: Send {
    async fn fetch(&mut self, url: &str) -> Result<String, CrawlerError>;

    async fn close(&mut self) -> Result<(), CrawlerError>;
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Headless Chrome driven over the DevTools protocol, one tab reused for every fetch.
pub struct ChromeSource {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl ChromeSource {
    pub async fn launch(cfg: &CrawlerConfig) -> Result<Self, CrawlerError> {
        let user_agent = random_user_agent();
        info!(headless = cfg.headless, user_agent, "launching browser");

        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={user_agent}"));
        if !cfg.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(CrawlerError::BrowserInit)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlerError::BrowserInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlerError::BrowserInit(e.to_string()))?;

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            timeout: cfg.page_timeout(),
        })
    }

    fn page(&self) -> Result<&Page, CrawlerError> {
        self.page
            .as_ref()
            .ok_or_else(|| CrawlerError::BrowserInit("browser already closed".into()))
    }
}

#[async_trait]
impl PageSource for ChromeSource {
    async fn fetch(&mut self, url: &str) -> Result<String, CrawlerError> {
        let page = self.page()?;
        let nav_err = |e: chromiumoxide::error::CdpError| CrawlerError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let load = async {
            page.goto(url).await.map_err(nav_err)?;
            page.wait_for_navigation().await.map_err(nav_err)?;
            Ok::<_, CrawlerError>(())
        };
        tokio::time::timeout(self.timeout, load)
            .await
            .map_err(|_| CrawlerError::Timeout(url.to_string()))??;

        tokio::time::sleep(SETTLE_DELAY).await;
        let html = page.content().await.map_err(nav_err)?;
        debug!(url, bytes = html.len(), "page fetched");
        Ok(html)
    }

    async fn close(&mut self) -> Result<(), CrawlerError> {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("browser close: {e}");
            }
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        info!("browser closed");
        Ok(())
    }
}
