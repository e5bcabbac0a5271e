use std::fmt;

/// The extraction strategies. The first three are alternatives for a single
/// candidate; the last two are markup-level fallbacks tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    LabeledElement,
    ContainerText,
    WholePage,
    UnitPattern,
    UnitPhrase,
}

impl StrategyKind {
    pub const FALLBACKS: [StrategyKind; 2] = [StrategyKind::UnitPattern, StrategyKind::UnitPhrase];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::LabeledElement => "labeled element",
            StrategyKind::ContainerText => "container text",
            StrategyKind::WholePage => "whole page",
            StrategyKind::UnitPattern => "unit pattern",
            StrategyKind::UnitPhrase => "unit phrase",
        };
        f.write_str(name)
    }
}

/// Text proposed by one strategy as possibly holding the price.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub strategy: StrategyKind,
    pub text: String,
}

/// The price for this run and the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedPrice {
    pub value: f64,
    pub strategy: StrategyKind,
}
