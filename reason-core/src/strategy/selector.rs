//! Strategy selector: decide, request, and decision in, one
//! concrete `ReasoningStrategy` out.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::router::ReasoningDecision;

/// Tagged variant of reasoning strategy. `Auto` is never executed — it is
/// always resolved to a concrete variant during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningStrategy {
    Auto,
    Tot,
    Beam,
    O1,
    Debate,
    Alphacode,
}

impl ReasoningStrategy {
    /// Parse a lower-cased string into a strategy; unknown values are a
    /// validation error, not a silent default.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "tot" => Ok(Self::Tot),
            "beam" => Ok(Self::Beam),
            "o1" => Ok(Self::O1),
            "debate" => Ok(Self::Debate),
            "alphacode" => Ok(Self::Alphacode),
            other => Err(Error::validation(format!("unknown reasoning strategy: {other}"))),
        }
    }

    pub fn as_metadata_str(&self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::Tot => Some("tot"),
            Self::Beam => Some("beam"),
            Self::O1 => Some("o1"),
            Self::Debate => Some("debate"),
            Self::Alphacode => Some("alphacode"),
        }
    }
}

/// Outcome of selection: the concrete strategy plus a fallback to try if the
/// primary strategy can't produce any valid candidate (only ALPHACODE names one).
#[derive(Debug, Clone, Copy)]
pub struct RoutingDecision {
    pub strategy: ReasoningStrategy,
    pub fallback: Option<ReasoningStrategy>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StrategySelector;

impl StrategySelector {
    pub fn new() -> Self {
        Self
    }

    /// Priority: explicit request strategy > `force_system_2 -> TOT` > auto rules.
    pub fn select(
        &self,
        requested: Option<ReasoningStrategy>,
        force_system_2: bool,
        decision: &ReasoningDecision,
        context_file_count: usize,
    ) -> RoutingDecision {
        if let Some(strategy) = requested {
            if strategy != ReasoningStrategy::Auto {
                return RoutingDecision {
                    strategy,
                    fallback: None,
                };
            }
        }

        if force_system_2 {
            return RoutingDecision {
                strategy: ReasoningStrategy::Tot,
                fallback: None,
            };
        }

        self.auto_select(decision, context_file_count)
    }

    fn auto_select(&self, decision: &ReasoningDecision, context_file_count: usize) -> RoutingDecision {
        if decision.complexity > 0.85 && decision.risk > 0.7 {
            return RoutingDecision {
                strategy: ReasoningStrategy::Alphacode,
                fallback: Some(ReasoningStrategy::Beam),
            };
        }
        if decision.complexity > 0.7 {
            return RoutingDecision {
                strategy: ReasoningStrategy::Beam,
                fallback: None,
            };
        }
        if decision.risk > 0.7 {
            return RoutingDecision {
                strategy: ReasoningStrategy::O1,
                fallback: None,
            };
        }
        if context_file_count > 5 {
            return RoutingDecision {
                strategy: ReasoningStrategy::Debate,
                fallback: None,
            };
        }
        RoutingDecision {
            strategy: ReasoningStrategy::Tot,
            fallback: None,
        }
    }
}
