//! Page session over a saved HTML document.
//!
//! Used by `--snapshot` to replay a captured page without a browser, and by
//! tests as a deterministic stand-in for Chromium. Node ids are positions in
//! document order, so they stay valid across re-parses of the same source.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;

use super::{LoadCondition, NavigationOutcome, NodeId, PageLauncher, PageSession};

pub struct SnapshotLauncher {
    source: String,
}

impl SnapshotLauncher {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        Ok(Self::new(source))
    }
}

#[async_trait]
impl PageLauncher for SnapshotLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(SnapshotPage::new(self.source.clone())))
    }
}

pub struct SnapshotPage {
    // `scraper::Html` is not `Send`, so the parsed tree is rebuilt per call.
    source: String,
}

impl SnapshotPage {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    fn document(&self) -> Html {
        Html::parse_document(&self.source)
    }
}

fn elements(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn element(doc: &Html, node: NodeId) -> Result<ElementRef<'_>> {
    elements(doc)
        .get(node.0 as usize)
        .copied()
        .ok_or_else(|| anyhow!("stale node id {}", node.0))
}

fn node_id(doc: &Html, target: ElementRef<'_>) -> Option<NodeId> {
    elements(doc)
        .iter()
        .position(|el| *el == target)
        .map(|idx| NodeId(idx as u64))
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {:?}: {:?}", selector, e))
}

const NON_RENDERED: [&str; 4] = ["script", "style", "noscript", "template"];

/// Text content with one line per non-blank text node, roughly like `innerText`.
fn rendered_text(el: ElementRef<'_>) -> String {
    el.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            (!NON_RENDERED.contains(&parent.value().name())).then(|| text.trim())
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn owns_text(el: &ElementRef<'_>, needle: &str) -> bool {
    if NON_RENDERED.contains(&el.value().name()) {
        return false;
    }
    el.children()
        .filter_map(|child| child.value().as_text())
        .any(|text| text.contains(needle))
}

#[async_trait]
impl PageSession for SnapshotPage {
    async fn navigate(&mut self, url: &str, _condition: LoadCondition) -> Result<NavigationOutcome> {
        Ok(NavigationOutcome {
            final_url: url.to_string(),
            status: None,
        })
    }

    async fn wait_for_text(&self, text: &str) -> Result<NodeId> {
        let doc = self.document();
        let found = elements(&doc)
            .into_iter()
            .position(|el| owns_text(&el, text));
        match found {
            Some(idx) => Ok(NodeId(idx as u64)),
            None => bail!("no element contains {:?}", text),
        }
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        let doc = self.document();
        let el = element(&doc, node)?;
        Ok(el
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|p| node_id(&doc, p)))
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let selector = parse_selector(selector)?;
        let doc = self.document();
        let el = element(&doc, node)?;
        let hit = std::iter::once(el)
            .chain(el.ancestors().filter_map(ElementRef::wrap))
            .find(|candidate| selector.matches(candidate));
        Ok(hit.and_then(|h| node_id(&doc, h)))
    }

    async fn query_descendant(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let selector = parse_selector(selector)?;
        let doc = self.document();
        let el = element(&doc, node)?;
        let hit = el.select(&selector).next();
        Ok(hit.and_then(|h| node_id(&doc, h)))
    }

    async fn inner_text(&self, node: NodeId) -> Result<String> {
        let doc = self.document();
        Ok(rendered_text(element(&doc, node)?))
    }

    async fn body_text(&self) -> Result<String> {
        let doc = self.document();
        let body = parse_selector("body")?;
        let root = doc.select(&body).next().unwrap_or_else(|| doc.root_element());
        Ok(rendered_text(root))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.document().html())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
