//! Narrow page capability used by the extraction pipeline.
//!
//! The pipeline only needs to navigate, find an element by its text, walk to
//! a parent or matching ancestor, query a descendant and read text. Chromium
//! implements it for live runs; a parsed HTML snapshot implements it for
//! offline replay and tests.

pub mod chromium;
pub mod fetcher;
pub mod snapshot;

#[cfg(test)]
pub mod testing;

use anyhow::Result;
use async_trait::async_trait;

/// How long navigation waits before it counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadCondition {
    /// The `load` event: scripts, styles and images are in.
    Load,
    /// `DOMContentLoaded`: markup parsed, subresources may still be loading.
    DomContentLoaded,
}

/// What navigation reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub final_url: String,
    /// HTTP status of the main document when the engine exposes it.
    pub status: Option<u16>,
}

impl NavigationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

/// Opaque reference to an element inside one page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// One open page. Element-level methods return `Ok(None)` when nothing matches.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and resolve once `condition` is met. Callers bound this with a timeout.
    async fn navigate(&mut self, url: &str, condition: LoadCondition) -> Result<NavigationOutcome>;

    /// Wait until an element whose own text contains `text` exists and return the first one.
    /// Callers bound this with a timeout; implementations may poll forever.
    async fn wait_for_text(&self, text: &str) -> Result<NodeId>;

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>>;

    /// Nearest ancestor-or-self matching a CSS selector.
    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>>;

    /// First descendant matching a CSS selector.
    async fn query_descendant(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>>;

    async fn inner_text(&self, node: NodeId) -> Result<String>;

    /// Rendered text of the whole document body.
    async fn body_text(&self) -> Result<String>;

    /// Serialized markup of the whole document.
    async fn content(&self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Starts page sessions. One session per run.
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}
