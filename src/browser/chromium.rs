//! Chromium-backed page session using chromiumoxide.
//!
//! Elements are addressed by tagging them with a `data-pw-node` attribute
//! the first time a script hands them out, so later calls can find them again.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{LoadCondition, NavigationOutcome, NodeId, PageLauncher, PageSession};
use crate::config::FetchSettings;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Shared prelude: `tag(el)` returns a stable positive id, `node(id)` resolves it.
const PRELUDE: &str = r#"
const tag = (el) => {
  if (!el) return 0;
  if (!el.dataset.pwNode) {
    window.__pwSeq = (window.__pwSeq || 0) + 1;
    el.dataset.pwNode = String(window.__pwSeq);
  }
  return Number(el.dataset.pwNode);
};
const node = (id) => document.querySelector(`[data-pw-node="${id}"]`);
"#;

fn script(body: &str) -> String {
    format!("(() => {{ {PRELUDE} {body} }})()")
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn to_node(raw: u64) -> Option<NodeId> {
    (raw > 0).then_some(NodeId(raw))
}

/// Launches a fresh headless Chromium per session.
pub struct ChromiumLauncher {
    settings: FetchSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        // Navigation timeouts are enforced by the caller; keep CDP's own limit out of the way.
        let request_timeout = self
            .settings
            .navigation_timeout()
            .max(self.settings.relaxed_timeout())
            + Duration::from_secs(5);

        let mut builder = BrowserConfig::builder()
            .request_timeout(request_timeout)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))
    }
}

#[async_trait]
impl PageLauncher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(anyhow!("failed to open page: {e}"));
            }
        };

        Ok(Box::new(ChromiumPage {
            browser,
            page,
            handler_task,
        }))
    }
}

pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, expression: String) -> Result<T> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|e| anyhow!("failed to build evaluate params: {e}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn ready_state(&self) -> Result<String> {
        self.eval("document.readyState".to_string()).await
    }

    async fn document_status(&self) -> Option<u16> {
        let status: u64 = self
            .eval(
                "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || 0"
                    .to_string(),
            )
            .await
            .unwrap_or(0);
        u16::try_from(status).ok().filter(|s| *s > 0)
    }
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn navigate(&mut self, url: &str, condition: LoadCondition) -> Result<NavigationOutcome> {
        match condition {
            LoadCondition::Load => {
                self.page
                    .goto(url)
                    .await
                    .map_err(|e| anyhow!("navigation failed: {e}"))?;
            }
            LoadCondition::DomContentLoaded => {
                let response = self
                    .page
                    .execute(NavigateParams::new(url))
                    .await
                    .map_err(|e| anyhow!("navigation failed: {e}"))?;
                if let Some(error) = &response.result.error_text {
                    bail!("navigation failed: {error}");
                }
                while self.ready_state().await.unwrap_or_default() == "loading" {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationOutcome {
            final_url,
            status: self.document_status().await,
        })
    }

    async fn wait_for_text(&self, text: &str) -> Result<NodeId> {
        let lookup = script(&format!(
            r#"
            const needle = {};
            if (!document.body) return 0;
            const SKIP = ['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE'];
            const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
            let n;
            while ((n = walker.nextNode())) {{
              const el = n.parentElement;
              if (el && !SKIP.includes(el.tagName) && n.textContent.includes(needle)) return tag(el);
            }}
            return 0;
            "#,
            js_string(text)
        ));

        loop {
            let raw: u64 = self.eval(lookup.clone()).await?;
            if let Some(node) = to_node(raw) {
                return Ok(node);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        let raw: u64 = self
            .eval(script(&format!(
                "const el = node({}); return el ? tag(el.parentElement) : 0;",
                node.0
            )))
            .await?;
        Ok(to_node(raw))
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let raw: u64 = self
            .eval(script(&format!(
                "const el = node({}); return el ? tag(el.closest({})) : 0;",
                node.0,
                js_string(selector)
            )))
            .await?;
        Ok(to_node(raw))
    }

    async fn query_descendant(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let raw: u64 = self
            .eval(script(&format!(
                "const el = node({}); return el ? tag(el.querySelector({})) : 0;",
                node.0,
                js_string(selector)
            )))
            .await?;
        Ok(to_node(raw))
    }

    async fn inner_text(&self, node: NodeId) -> Result<String> {
        let text: Option<String> = self
            .eval(script(&format!(
                "const el = node({}); return el ? [el.innerText] : [];",
                node.0
            )))
            .await
            .map(|wrapped: Vec<String>| wrapped.into_iter().next())?;
        text.ok_or_else(|| anyhow!("node {} is no longer attached", node.0))
    }

    async fn body_text(&self) -> Result<String> {
        self.eval("document.body ? document.body.innerText : ''".to_string())
            .await
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumPage {
            mut browser,
            page,
            handler_task,
        } = *self;

        let _ = page.close().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();

        closed
            .map(|_| ())
            .map_err(|e| anyhow!("failed to close browser: {e}"))
    }
}
