use anyhow::Result;
use regex::Regex;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::browser::{NodeId, PageSession};
use crate::config::ExtractionSettings;
use crate::extraction::numeric::first_number;
use crate::extraction::types::{Candidate, ExtractedPrice, StrategyKind};

/// Finds the price on a rendered page.
///
/// The label decides the first candidate: the value element next to it, else
/// the card around it, else (no label at all) the whole page text. If that
/// candidate holds no number, the markup fallbacks in `StrategyKind::FALLBACKS`
/// run in order. A strategy that errors or times out counts as no candidate.
pub struct PricePipeline<'a> {
    settings: &'a ExtractionSettings,
}

impl<'a> PricePipeline<'a> {
    pub fn new(settings: &'a ExtractionSettings) -> Self {
        Self { settings }
    }

    pub async fn run(&self, page: &dyn PageSession) -> Option<ExtractedPrice> {
        if let Some(price) = self.primary(page).await.and_then(accept) {
            return Some(price);
        }

        for kind in StrategyKind::FALLBACKS {
            debug!("Trying {} strategy", kind);

            let found = match kind {
                StrategyKind::UnitPattern => self.unit_pattern(page).await,
                _ => self.unit_phrase(page).await,
            };
            let candidate = match found {
                Ok(Some(text)) => Candidate { strategy: kind, text },
                Ok(None) => {
                    debug!("{} strategy produced no candidate", kind);
                    continue;
                }
                Err(e) => {
                    debug!("{} strategy failed: {:#}", kind, e);
                    continue;
                }
            };

            if let Some(price) = accept(candidate) {
                return Some(price);
            }
        }

        None
    }

    /// The single label-driven candidate.
    async fn primary(&self, page: &dyn PageSession) -> Option<Candidate> {
        let Some(label) = self.label(page).await else {
            return match page.body_text().await {
                Ok(text) => Some(Candidate {
                    strategy: StrategyKind::WholePage,
                    text,
                }),
                Err(e) => {
                    debug!("{} strategy failed: {:#}", StrategyKind::WholePage, e);
                    None
                }
            };
        };

        match self.labeled_element(page, label).await {
            Ok(Some(text)) => {
                return Some(Candidate {
                    strategy: StrategyKind::LabeledElement,
                    text,
                })
            }
            Ok(None) => debug!("No value element next to the label"),
            Err(e) => debug!("{} strategy failed: {:#}", StrategyKind::LabeledElement, e),
        }

        match self.container_text(page, label).await {
            Ok(Some(text)) => Some(Candidate {
                strategy: StrategyKind::ContainerText,
                text,
            }),
            Ok(None) => {
                debug!("No card around the label");
                None
            }
            Err(e) => {
                debug!("{} strategy failed: {:#}", StrategyKind::ContainerText, e);
                None
            }
        }
    }

    async fn label(&self, page: &dyn PageSession) -> Option<NodeId> {
        let label = &self.settings.price_label;
        match timeout(self.settings.element_timeout(), page.wait_for_text(label)).await {
            Ok(Ok(node)) => Some(node),
            Ok(Err(e)) => {
                debug!("Label {:?} not found: {:#}", label, e);
                None
            }
            Err(_) => {
                debug!("Timed out waiting for label {:?}", label);
                None
            }
        }
    }

    /// Emphasized value element next to the label, inside the label's parent.
    async fn labeled_element(&self, page: &dyn PageSession, label: NodeId) -> Result<Option<String>> {
        let Some(parent) = page.parent(label).await? else {
            return Ok(None);
        };
        let Some(value) = page
            .query_descendant(parent, &self.settings.value_selector)
            .await?
        else {
            return Ok(None);
        };

        let text = page.inner_text(value).await?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    /// Full text of the card around the label, flattened to one line.
    async fn container_text(&self, page: &dyn PageSession, label: NodeId) -> Result<Option<String>> {
        let Some(card) = page.closest(label, &self.settings.card_selector).await? else {
            return Ok(None);
        };

        let text = page.inner_text(card).await?;
        Ok(Some(flatten_lines(&text)))
    }

    /// Number directly followed by the unit phrase, anywhere in the raw markup.
    async fn unit_pattern(&self, page: &dyn PageSession) -> Result<Option<String>> {
        let markup = page.content().await?;
        let pattern = unit_regex(&self.settings.unit_phrase)?;
        Ok(pattern
            .captures(&markup)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()))
    }

    /// Whatever element mentions the unit phrase at all.
    async fn unit_phrase(&self, page: &dyn PageSession) -> Result<Option<String>> {
        let unit = &self.settings.unit_phrase;
        match timeout(self.settings.element_timeout(), page.wait_for_text(unit)).await {
            Ok(found) => {
                let node = found?;
                Ok(Some(page.inner_text(node).await?))
            }
            Err(_) => {
                debug!("Timed out waiting for {:?}", unit);
                Ok(None)
            }
        }
    }
}

fn accept(candidate: Candidate) -> Option<ExtractedPrice> {
    match first_number(&candidate.text) {
        Some(value) => {
            info!("Price {} extracted by {} strategy", value, candidate.strategy);
            Some(ExtractedPrice {
                value,
                strategy: candidate.strategy,
            })
        }
        None => {
            debug!("No number in {} candidate", candidate.strategy);
            None
        }
    }
}

fn unit_regex(unit_phrase: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"([-+]?\d+(?:\.\d+)?)\s*{}",
        regex::escape(unit_phrase)
    ))?)
}

fn flatten_lines(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}
