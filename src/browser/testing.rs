//! Scripted page doubles for tests: snapshot DOM plus scripted navigation and injected failures.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::snapshot::SnapshotPage;
use super::{LoadCondition, NavigationOutcome, NodeId, PageLauncher, PageSession};

#[derive(Debug, Clone)]
pub enum NavStep {
    Ok(Option<u16>),
    Fail(&'static str),
    Hang,
}

pub struct ScriptedPage {
    dom: SnapshotPage,
    steps: VecDeque<NavStep>,
    failing: HashSet<&'static str>,
    navigations: Arc<Mutex<Vec<LoadCondition>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedPage {
    pub fn new(html: &str, steps: Vec<NavStep>) -> Self {
        Self {
            dom: SnapshotPage::new(html),
            steps: steps.into(),
            failing: HashSet::new(),
            navigations: Arc::default(),
            closed: Arc::default(),
        }
    }

    /// Make the named capability return an error on every call.
    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn navigations(&self) -> Vec<LoadCondition> {
        self.navigations.lock().unwrap().clone()
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failing.contains(op) {
            bail!("{} failed (injected)", op);
        }
        Ok(())
    }
}

#[async_trait]
impl PageSession for ScriptedPage {
    async fn navigate(&mut self, url: &str, condition: LoadCondition) -> Result<NavigationOutcome> {
        self.navigations.lock().unwrap().push(condition);
        match self.steps.pop_front().unwrap_or(NavStep::Ok(Some(200))) {
            NavStep::Ok(status) => Ok(NavigationOutcome {
                final_url: url.to_string(),
                status,
            }),
            NavStep::Fail(reason) => bail!("{}", reason),
            NavStep::Hang => Ok(std::future::pending::<NavigationOutcome>().await),
        }
    }

    async fn wait_for_text(&self, text: &str) -> Result<NodeId> {
        self.check("wait_for_text")?;
        self.dom.wait_for_text(text).await
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.check("parent")?;
        self.dom.parent(node).await
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        self.check("closest")?;
        self.dom.closest(node, selector).await
    }

    async fn query_descendant(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        self.check("query_descendant")?;
        self.dom.query_descendant(node, selector).await
    }

    async fn inner_text(&self, node: NodeId) -> Result<String> {
        self.check("inner_text")?;
        self.dom.inner_text(node).await
    }

    async fn body_text(&self) -> Result<String> {
        self.check("body_text")?;
        self.dom.body_text().await
    }

    async fn content(&self) -> Result<String> {
        self.check("content")?;
        self.dom.content().await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one `ScriptedPage` per `open`, sharing its navigation log and closed flag.
pub struct ScriptedLauncher {
    html: String,
    steps: Vec<NavStep>,
    failing: Vec<&'static str>,
    pub navigations: Arc<Mutex<Vec<LoadCondition>>>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedLauncher {
    pub fn new(html: &str, steps: Vec<NavStep>) -> Self {
        Self {
            html: html.to_string(),
            steps,
            failing: Vec::new(),
            navigations: Arc::default(),
            closed: Arc::default(),
        }
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.push(op);
        self
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLauncher for ScriptedLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let mut page = ScriptedPage::new(&self.html, self.steps.clone());
        for &op in &self.failing {
            page = page.failing(op);
        }
        page.navigations = Arc::clone(&self.navigations);
        page.closed = Arc::clone(&self.closed);
        Ok(Box::new(page))
    }
}
