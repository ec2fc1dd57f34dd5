//! Trade favorability scoring and the automated decision policy.
//!
//! The evaluator is deterministic: it prices both sides of a trade with the
//! valuation model. The policy layers the configured thresholds and an
//! injected random source on top of the score.

use rand::Rng;
use std::collections::BTreeSet;

use crate::config::{AiConfig, RulesConfig};
use crate::economy::valuation::value_of;
use crate::types::{EconomyResult, GameState, PropertyId, TradeRequest, TradeTerms};

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

pub struct TradeEvaluator {
    rules: RulesConfig,
}

impl TradeEvaluator {
    pub fn new(rules: RulesConfig) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Favorability of `trade` for its current target.
    pub fn evaluate(&self, trade: &TradeRequest, state: &GameState) -> EconomyResult<i64> {
        self.evaluate_terms(&trade.terms, state)
    }

    /// `(requested value + requested cash) - (offered value + offered cash)`.
    ///
    /// Terms are written from the proposer's side, so this is what the target
    /// gives up minus what it receives. Negative means the target comes out
    /// ahead.
    pub fn evaluate_terms(&self, terms: &TradeTerms, state: &GameState) -> EconomyResult<i64> {
        let given = self.side_value(state, &terms.requested_properties, terms.requested_cash)?;
        let received = self.side_value(state, &terms.offered_properties, terms.offered_cash)?;
        Ok(given - received)
    }

    /// Cash plus the effective value of a set of properties.
    pub fn side_value(
        &self,
        state: &GameState,
        properties: &BTreeSet<PropertyId>,
        cash: i64,
    ) -> EconomyResult<i64> {
        let mut total = cash;
        for id in properties {
            total += value_of(state, *id, &self.rules)?;
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Decision policy
// ---------------------------------------------------------------------------

/// Which side of the thresholds a score falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// Clearly good: accepted without a roll.
    Favorable,
    /// Accepted with a probability that grows as the score improves.
    Negotiable,
    /// Clearly bad: declined without a roll.
    Unfavorable,
}

pub struct DecisionPolicy {
    config: AiConfig,
}

impl DecisionPolicy {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn band(&self, score: i64) -> ScoreBand {
        if score <= self.config.accept_threshold {
            ScoreBand::Favorable
        } else if score > self.config.decline_threshold {
            ScoreBand::Unfavorable
        } else {
            ScoreBand::Negotiable
        }
    }

    /// Probability of accepting a trade with this score.
    ///
    /// Linear across the middle band, from `max_accept_probability` at the
    /// accept threshold down to `min_accept_probability` at the decline
    /// threshold.
    pub fn acceptance_probability(&self, score: i64) -> f64 {
        let cfg = &self.config;
        let p = match self.band(score) {
            ScoreBand::Favorable => 1.0,
            ScoreBand::Unfavorable => 0.0,
            ScoreBand::Negotiable => {
                let span = (cfg.decline_threshold - cfg.accept_threshold) as f64;
                if span <= 0.0 {
                    cfg.max_accept_probability
                } else {
                    let t = (cfg.decline_threshold - score) as f64 / span;
                    cfg.min_accept_probability
                        + (cfg.max_accept_probability - cfg.min_accept_probability) * t
                }
            }
        };
        p.clamp(0.0, 1.0)
    }

    /// Bernoulli trial at [`acceptance_probability`](Self::acceptance_probability).
    /// Outside the middle band the outcome is fixed and no randomness is drawn.
    pub fn roll<R: Rng + ?Sized>(&self, score: i64, rng: &mut R) -> bool {
        match self.band(score) {
            ScoreBand::Favorable => true,
            ScoreBand::Unfavorable => false,
            ScoreBand::Negotiable => rng.gen_bool(self.acceptance_probability(score)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
