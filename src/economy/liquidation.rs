//! Liquidation planning.
//!
//! Given a player in deficit, produce an ordered list of disposals that
//! raises enough cash, or report how much stays uncovered. Planning runs
//! every step through [`DevelopmentRules`] on a scratch copy of the
//! snapshot, so each planned action is legal in sequence and the caller's
//! state is never touched.
//!
//! Order:
//! 1. Sell houses, always from the sellable property with the highest hotel
//!    rent (the improvements most over-invested relative to their half-price
//!    resale).
//! 2. Mortgage bare unmortgaged properties, most expensive first.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;

use crate::config::RulesConfig;
use crate::economy::development::{DevelopmentAction, DevelopmentRules};
use crate::types::{EconomyError, EconomyResult, GameState, PlayerId, PropertyId};

/// One planned disposal and the cash it is expected to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: DevelopmentAction,
    pub proceeds: i64,
}

/// Ordered disposals for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationPlan {
    pub player: PlayerId,
    pub shortfall: i64,
    pub actions: Vec<PlannedAction>,
    /// Cash the actions raise in total.
    pub covered: i64,
    /// Zero when the plan covers the shortfall; anything else is insolvency.
    pub remaining_shortfall: i64,
}

impl LiquidationPlan {
    fn empty(player: PlayerId, shortfall: i64) -> Self {
        Self {
            player,
            shortfall,
            actions: Vec::new(),
            covered: 0,
            remaining_shortfall: shortfall.max(0),
        }
    }

    fn push(&mut self, action: DevelopmentAction, proceeds: i64) {
        self.actions.push(PlannedAction { action, proceeds });
        self.covered += proceeds;
        self.remaining_shortfall = (self.shortfall - self.covered).max(0);
    }

    pub fn is_covered(&self) -> bool {
        self.remaining_shortfall == 0
    }

    /// `Insolvent` when the plan leaves part of the shortfall uncovered.
    pub fn require_covered(&self) -> EconomyResult<()> {
        if self.is_covered() {
            Ok(())
        } else {
            Err(EconomyError::Insolvent {
                player: self.player,
                shortfall: self.remaining_shortfall,
            })
        }
    }
}

pub struct LiquidationPlanner {
    engine: DevelopmentRules,
}

impl LiquidationPlanner {
    pub fn new(config: RulesConfig) -> Self {
        Self {
            engine: DevelopmentRules::new(config),
        }
    }

    /// Plan disposals covering `shortfall` for `player`.
    pub fn plan(&self, state: &GameState, player: PlayerId, shortfall: i64) -> EconomyResult<LiquidationPlan> {
        state.player(player)?;
        let mut plan = LiquidationPlan::empty(player, shortfall);
        if shortfall <= 0 {
            return Ok(plan);
        }

        let mut scratch = state.clone();

        // Phase 1: buildings.
        while !plan.is_covered() {
            let Some(target) = self.next_house_sale(&scratch, player)? else {
                break;
            };
            let proceeds = self.engine.check_sell_house(&scratch, player, target)?;
            self.engine.sell_house(&mut scratch, player, target)?;
            plan.push(DevelopmentAction::SellHouse(target), proceeds);
        }

        // Phase 2: mortgages.
        if !plan.is_covered() {
            for target in self.mortgage_candidates(&scratch, player)? {
                if plan.is_covered() {
                    break;
                }
                let proceeds = self.engine.check_mortgage(&scratch, player, target)?;
                self.engine.mortgage(&mut scratch, player, target)?;
                plan.push(DevelopmentAction::Mortgage(target), proceeds);
            }
        }

        debug!(
            %player,
            shortfall,
            actions = plan.actions.len(),
            covered = plan.covered,
            remaining = plan.remaining_shortfall,
            "Liquidation planned"
        );

        Ok(plan)
    }

    /// The sellable developed property with the highest hotel rent.
    fn next_house_sale(&self, state: &GameState, player: PlayerId) -> EconomyResult<Option<PropertyId>> {
        let mut best: Option<(i64, Reverse<PropertyId>)> = None;
        for id in state.holdings(player) {
            if !state.ownership(id)?.is_developed() {
                continue;
            }
            if self.engine.check_sell_house(state, player, id).is_err() {
                continue;
            }
            let key = (state.property(id)?.hotel_rent, Reverse(id));
            if best.map_or(true, |b| key > b) {
                best = Some(key);
            }
        }
        Ok(best.map(|(_, Reverse(id))| id))
    }

    /// Bare, unmortgaged holdings by descending purchase price.
    fn mortgage_candidates(&self, state: &GameState, player: PlayerId) -> EconomyResult<Vec<PropertyId>> {
        let mut candidates = Vec::new();
        for id in state.holdings(player) {
            let ownership = state.ownership(id)?;
            if ownership.mortgaged || ownership.is_developed() {
                continue;
            }
            candidates.push((state.property(id)?.price, id));
        }
        candidates.sort_by_key(|(price, id)| (Reverse(*price), *id));
        Ok(candidates.into_iter().map(|(_, id)| id).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
