//! Trade negotiation state machine.
//!
//! ```text
//! Pending ──> Accepted
//!    │  ├───> Declined
//!    │  └───> Countered ──> (same transitions, parties swapped)
//!    └─<── failed accept
//! ```
//!
//! A counter rewrites the same record: proposer and target swap and the
//! terms are replaced. Only the current target may act on an open trade.
//! Every transition bumps the record's `version` so the persistence layer
//! can reject stale writes.

use chrono::Utc;
use tracing::{info, warn};

use crate::types::{
    EconomyError, EconomyResult, GameState, Owner, PlayerId, PropertyId, StateChange,
    TradeId, TradeRequest, TradeStatus, TradeTerms,
};

pub struct Negotiation;

impl Negotiation {
    /// Open a new trade after validating the draft against `state`.
    pub fn propose(
        state: &GameState,
        proposer: PlayerId,
        target: PlayerId,
        terms: TradeTerms,
        sequence: u64,
    ) -> EconomyResult<TradeRequest> {
        Self::validate_terms(state, proposer, target, &terms)?;
        let now = Utc::now();
        let trade = TradeRequest {
            id: TradeId::new(),
            game_id: state.game_id,
            proposer,
            target,
            terms,
            status: TradeStatus::Pending,
            sequence,
            version: 1,
            counter_count: 0,
            created_at: now,
            updated_at: now,
        };
        info!(trade = %trade.id, %proposer, %target, "Trade proposed");
        Ok(trade)
    }

    /// Check that `proposer` may offer `terms` to `target` right now.
    pub fn validate_terms(
        state: &GameState,
        proposer: PlayerId,
        target: PlayerId,
        terms: &TradeTerms,
    ) -> EconomyResult<()> {
        if proposer == target {
            return Err(EconomyError::InvalidTrade(format!("{proposer} cannot trade with themselves")));
        }
        for id in [proposer, target] {
            if !state.player(id)?.is_live() {
                return Err(EconomyError::InvalidTrade(format!("{id} is eliminated")));
            }
        }
        if terms.is_empty() {
            return Err(EconomyError::InvalidTrade("nothing is exchanged".to_string()));
        }
        if terms.offered_cash < 0 || terms.requested_cash < 0 {
            return Err(EconomyError::InvalidTrade("cash amounts must not be negative".to_string()));
        }
        if let Some(id) = terms
            .offered_properties
            .intersection(&terms.requested_properties)
            .next()
        {
            return Err(EconomyError::InvalidTrade(format!("{id} is on both sides")));
        }

        for (owner, properties) in [
            (proposer, &terms.offered_properties),
            (target, &terms.requested_properties),
        ] {
            for id in properties {
                Self::check_tradeable(state, owner, *id).map_err(|e| match e {
                    EconomyError::TradeInfeasible(reason) => EconomyError::InvalidTrade(reason),
                    other => other,
                })?;
            }
        }
        Ok(())
    }

    /// Whether both sides can deliver their half of `trade` in `state`.
    pub fn check_feasible(state: &GameState, trade: &TradeRequest) -> EconomyResult<()> {
        for id in [trade.proposer, trade.target] {
            if !state.player(id)?.is_live() {
                return Err(EconomyError::TradeInfeasible(format!("{id} is eliminated")));
            }
        }

        for (owner, properties) in [
            (trade.proposer, &trade.terms.offered_properties),
            (trade.target, &trade.terms.requested_properties),
        ] {
            for id in properties {
                Self::check_tradeable(state, owner, *id)?;
            }
        }

        for (payer, cash) in [
            (trade.proposer, trade.terms.offered_cash),
            (trade.target, trade.terms.requested_cash),
        ] {
            let balance = state.player(payer)?.balance;
            if balance < cash {
                return Err(EconomyError::TradeInfeasible(format!(
                    "{payer} has ${balance}, needs ${cash}"
                )));
            }
        }
        Ok(())
    }

    fn check_tradeable(state: &GameState, owner: PlayerId, property: PropertyId) -> EconomyResult<()> {
        let ownership = state.ownership(property)?;
        if ownership.owner != Owner::Player(owner) {
            return Err(EconomyError::TradeInfeasible(format!(
                "{property} is not owned by {owner}"
            )));
        }
        let group = &state.property(property)?.group;
        if state.group_has_buildings(group) {
            return Err(EconomyError::TradeInfeasible(format!(
                "{property} is in group {group}, which has buildings"
            )));
        }
        Ok(())
    }

    fn authorize(trade: &TradeRequest, actor: PlayerId) -> EconomyResult<()> {
        if !trade.status.is_open() {
            return Err(EconomyError::InvalidTradeTransition {
                trade: trade.id,
                status: trade.status,
            });
        }
        if actor != trade.target {
            return Err(EconomyError::UnauthorizedActor {
                trade: trade.id,
                actor,
            });
        }
        Ok(())
    }

    /// Accept `trade` and apply the exchange to `state`.
    ///
    /// All-or-nothing: transfers run against a scratch copy that replaces
    /// `state` only once every step has succeeded. On failure the trade goes
    /// back to `Pending` and `state` is untouched.
    pub fn accept(
        trade: &mut TradeRequest,
        actor: PlayerId,
        state: &mut GameState,
    ) -> EconomyResult<Vec<StateChange>> {
        Self::authorize(trade, actor)?;
        if trade.game_id != state.game_id {
            return Err(EconomyError::InvalidTrade(format!(
                "trade {} belongs to game {}",
                trade.id, trade.game_id
            )));
        }

        let result = Self::check_feasible(state, trade).and_then(|_| {
            let mut scratch = state.clone();
            let changes = Self::transfer(&mut scratch, trade)?;
            Ok((scratch, changes))
        });

        match result {
            Ok((scratch, changes)) => {
                *state = scratch;
                trade.status = TradeStatus::Accepted;
                trade.touch();
                info!(
                    trade = %trade.id,
                    proposer = %trade.proposer,
                    target = %trade.target,
                    changes = changes.len(),
                    "Trade accepted"
                );
                Ok(changes)
            }
            Err(e) => {
                trade.status = TradeStatus::Pending;
                trade.touch();
                warn!(trade = %trade.id, error = %e, "Trade infeasible, back to pending");
                Err(match e {
                    EconomyError::TradeInfeasible(_) => e,
                    other => EconomyError::TradeInfeasible(other.to_string()),
                })
            }
        }
    }

    fn transfer(state: &mut GameState, trade: &TradeRequest) -> EconomyResult<Vec<StateChange>> {
        let (proposer, target) = (trade.proposer, trade.target);
        let terms = &trade.terms;
        let mut changes = Vec::new();

        for id in &terms.offered_properties {
            changes.push(state.update_ownership(*id, |o| o.owner = Owner::Player(target))?);
        }
        for id in &terms.requested_properties {
            changes.push(state.update_ownership(*id, |o| o.owner = Owner::Player(proposer))?);
        }
        if terms.offered_cash > 0 {
            changes.push(state.adjust_balance(proposer, -terms.offered_cash)?);
            changes.push(state.adjust_balance(target, terms.offered_cash)?);
        }
        if terms.requested_cash > 0 {
            changes.push(state.adjust_balance(target, -terms.requested_cash)?);
            changes.push(state.adjust_balance(proposer, terms.requested_cash)?);
        }
        Ok(changes)
    }

    pub fn decline(trade: &mut TradeRequest, actor: PlayerId) -> EconomyResult<()> {
        Self::authorize(trade, actor)?;
        trade.status = TradeStatus::Declined;
        trade.touch();
        info!(trade = %trade.id, %actor, "Trade declined");
        Ok(())
    }

    /// Counter in place. The actor becomes the proposer of `terms`, or of the
    /// mirrored original when no terms are given, and the previous proposer
    /// becomes the only party allowed to respond.
    pub fn counter(
        trade: &mut TradeRequest,
        actor: PlayerId,
        terms: Option<TradeTerms>,
        state: &GameState,
    ) -> EconomyResult<()> {
        Self::authorize(trade, actor)?;
        let terms = terms.unwrap_or_else(|| trade.terms.mirrored());
        Self::validate_terms(state, actor, trade.proposer, &terms)?;

        trade.target = trade.proposer;
        trade.proposer = actor;
        trade.terms = terms;
        trade.status = TradeStatus::Countered;
        trade.counter_count += 1;
        trade.touch();
        info!(
            trade = %trade.id,
            proposer = %trade.proposer,
            target = %trade.target,
            counters = trade.counter_count,
            "Trade countered"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
