//! Automated trade participant.
//!
//! Responds to trades aimed at an automated player and drafts acquisition
//! offers that would complete one of its groups.

use rand::Rng;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::{AiConfig, RulesConfig};
use crate::trade::evaluator::{DecisionPolicy, ScoreBand, TradeEvaluator};
use crate::trade::negotiation::Negotiation;
use crate::types::{
    EconomyResult, GameState, Owner, PlayerId, PropertyId, StateChange, TradeRequest,
    TradeTerms,
};

/// What the automated player decided to do with a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accept,
    Decline,
    /// Counter with these terms, written from the counter-proposer's side.
    Counter(TradeTerms),
}

/// A verdict plus the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub score: i64,
    pub acceptance_probability: f64,
}

pub struct AutomatedTrader {
    evaluator: TradeEvaluator,
    policy: DecisionPolicy,
}

impl AutomatedTrader {
    pub fn new(rules: RulesConfig, ai: AiConfig) -> Self {
        Self {
            evaluator: TradeEvaluator::new(rules),
            policy: DecisionPolicy::new(ai),
        }
    }

    pub fn evaluator(&self) -> &TradeEvaluator {
        &self.evaluator
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Decide on `trade` as its current target.
    pub fn respond<R: Rng + ?Sized>(
        &self,
        trade: &TradeRequest,
        state: &GameState,
        rng: &mut R,
    ) -> EconomyResult<Decision> {
        let score = self.evaluator.evaluate(trade, state)?;
        let acceptance_probability = self.policy.acceptance_probability(score);
        let decision = |verdict| Decision {
            verdict,
            score,
            acceptance_probability,
        };

        if let Err(e) = Negotiation::check_feasible(state, trade) {
            debug!(trade = %trade.id, error = %e, "Declining infeasible trade");
            return Ok(decision(Verdict::Decline));
        }

        let verdict = match self.policy.band(score) {
            ScoreBand::Favorable => Verdict::Accept,
            ScoreBand::Unfavorable => Verdict::Decline,
            ScoreBand::Negotiable if self.policy.roll(score, rng) => Verdict::Accept,
            ScoreBand::Negotiable => match self.counter_terms(trade, state, score) {
                Some(terms) => Verdict::Counter(terms),
                None => Verdict::Decline,
            },
        };

        debug!(
            trade = %trade.id,
            target = %trade.target,
            score,
            probability = acceptance_probability,
            verdict = ?verdict,
            "Automated trade decision"
        );
        Ok(decision(verdict))
    }

    /// Decide on `trade` and carry the decision out.
    pub fn act<R: Rng + ?Sized>(
        &self,
        trade: &mut TradeRequest,
        state: &mut GameState,
        rng: &mut R,
    ) -> EconomyResult<(Decision, Vec<StateChange>)> {
        let decision = self.respond(trade, state, rng)?;
        let actor = trade.target;
        let changes = match &decision.verdict {
            Verdict::Accept => Negotiation::accept(trade, actor, state)?,
            Verdict::Decline => {
                Negotiation::decline(trade, actor)?;
                Vec::new()
            }
            Verdict::Counter(terms) => {
                Negotiation::counter(trade, actor, Some(terms.clone()), state)?;
                Vec::new()
            }
        };
        Ok((decision, changes))
    }

    /// Mirror the trade and ask for enough extra cash to reach the accept
    /// threshold. `None` when countering is disabled, the counter budget is
    /// spent, or the proposer could not pay.
    fn counter_terms(&self, trade: &TradeRequest, state: &GameState, score: i64) -> Option<TradeTerms> {
        let cfg = self.policy.config();
        if !cfg.counter_enabled || trade.counter_count >= cfg.max_counters {
            return None;
        }

        let extra = score - cfg.accept_threshold;
        let mut terms = trade.terms.mirrored();
        let net = terms.requested_cash + extra - terms.offered_cash;
        if net >= 0 {
            terms.requested_cash = net;
            terms.offered_cash = 0;
        } else {
            terms.requested_cash = 0;
            terms.offered_cash = -net;
        }

        let proposer_cash = state.player(trade.proposer).ok()?.balance;
        if proposer_cash < terms.requested_cash {
            return None;
        }
        Negotiation::validate_terms(state, trade.target, trade.proposer, &terms).ok()?;
        Some(terms)
    }

    /// Draft an offer buying the missing members of a group, when a single
    /// live rival holds all of them and `buyer` can pay while keeping its
    /// cash reserve. Prefers the cheapest such group.
    pub fn propose_acquisition(
        &self,
        state: &GameState,
        buyer: PlayerId,
    ) -> EconomyResult<Option<(PlayerId, TradeTerms)>> {
        let cfg = self.policy.config();
        let budget = state.player(buyer)?.balance - cfg.cash_reserve;
        let mut best: Option<(i64, PlayerId, TradeTerms)> = None;

        for group in state.board().groups() {
            let Some((seller, missing)) = self.single_holdout(state, buyer, group)? else {
                continue;
            };
            if state.group_has_buildings(group) {
                continue;
            }
            let value = self.evaluator.side_value(state, &missing, 0)?;
            let price = (Decimal::from(value) * cfg.acquisition_premium)
                .ceil()
                .to_i64()
                .unwrap_or(i64::MAX);
            if price > budget {
                continue;
            }
            if best.as_ref().map_or(true, |(p, _, _)| price < *p) {
                let terms = TradeTerms {
                    offered_cash: price,
                    requested_properties: missing,
                    ..TradeTerms::default()
                };
                best = Some((price, seller, terms));
            }
        }

        Ok(best.map(|(price, seller, terms)| {
            debug!(%buyer, %seller, price, "Acquisition offer drafted");
            (seller, terms)
        }))
    }

    /// The single live player holding every member of `group` that `buyer`
    /// lacks, when `buyer` holds at least one member.
    fn single_holdout(
        &self,
        state: &GameState,
        buyer: PlayerId,
        group: &str,
    ) -> EconomyResult<Option<(PlayerId, BTreeSet<PropertyId>)>> {
        let mut owns_any = false;
        let mut seller = None;
        let mut missing = BTreeSet::new();

        for id in state.board().group_members(group) {
            match state.ownership(id)?.owner {
                Owner::Player(p) if p == buyer => owns_any = true,
                Owner::Player(p) => {
                    if seller.is_some_and(|s| s != p) || !state.player(p)?.is_live() {
                        return Ok(None);
                    }
                    seller = Some(p);
                    missing.insert(id);
                }
                Owner::Bank => return Ok(None),
            }
        }

        Ok(match seller {
            Some(s) if owns_any => Some((s, missing)),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
