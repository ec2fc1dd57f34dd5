//! Development rules for houses, hotels and mortgages.
//!
//! Per property: `Undeveloped(mortgaged | unmortgaged) -> Houses(1..4) -> Hotel`.
//!
//! Building requires the whole monopoly group and must proceed evenly: the
//! target has to sit at the group minimum. Selling runs the same rule in
//! reverse, always from the group maximum, so levels within a group never
//! drift more than one increment apart. Every check returns a typed error
//! instead of mutating, and a rejected action leaves the state untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::RulesConfig;
use crate::economy::valuation::{increment_cost, sale_value};
use crate::types::{
    EconomyError, EconomyResult, GameState, Owner, PlayerId, PropertyId, PropertyOwnership,
    StateChange, HOTEL_LEVEL,
};

/// A single primitive development transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevelopmentAction {
    Build(PropertyId),
    SellHouse(PropertyId),
    Mortgage(PropertyId),
    Unmortgage(PropertyId),
}

impl DevelopmentAction {
    pub fn property(&self) -> PropertyId {
        match self {
            DevelopmentAction::Build(id)
            | DevelopmentAction::SellHouse(id)
            | DevelopmentAction::Mortgage(id)
            | DevelopmentAction::Unmortgage(id) => *id,
        }
    }
}

impl fmt::Display for DevelopmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevelopmentAction::Build(id) => write!(f, "build on {id}"),
            DevelopmentAction::SellHouse(id) => write!(f, "sell house on {id}"),
            DevelopmentAction::Mortgage(id) => write!(f, "mortgage {id}"),
            DevelopmentAction::Unmortgage(id) => write!(f, "unmortgage {id}"),
        }
    }
}

/// Validates and applies development transitions.
#[derive(Debug, Clone, Default)]
pub struct DevelopmentRules {
    config: RulesConfig,
}

impl DevelopmentRules {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    /// Access the rules configuration.
    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// Apply any action.
    pub fn apply(
        &self,
        state: &mut GameState,
        player: PlayerId,
        action: DevelopmentAction,
    ) -> EconomyResult<Vec<StateChange>> {
        match action {
            DevelopmentAction::Build(id) => self.build(state, player, id),
            DevelopmentAction::SellHouse(id) => self.sell_house(state, player, id),
            DevelopmentAction::Mortgage(id) => self.mortgage(state, player, id),
            DevelopmentAction::Unmortgage(id) => self.unmortgage(state, player, id),
        }
    }

    /// Check an action without applying it. Returns the player's signed
    /// cash effect, positive when the bank pays out.
    pub fn check(&self, state: &GameState, player: PlayerId, action: DevelopmentAction) -> EconomyResult<i64> {
        match action {
            DevelopmentAction::Build(id) => self.check_build(state, player, id).map(|cost| -cost),
            DevelopmentAction::SellHouse(id) => self.check_sell_house(state, player, id),
            DevelopmentAction::Mortgage(id) => self.check_mortgage(state, player, id),
            DevelopmentAction::Unmortgage(id) => self.check_unmortgage(state, player, id).map(|cost| -cost),
        }
    }

    // -- build -------------------------------------------------------------

    /// Validate a build and return its cost.
    pub fn check_build(&self, state: &GameState, player: PlayerId, property: PropertyId) -> EconomyResult<i64> {
        let ownership = owned_by(state, player, property)?;
        let prop = state.property(property)?;

        if ownership.mortgaged {
            return Err(invalid(property, "mortgaged properties cannot be developed"));
        }
        if ownership.development >= HOTEL_LEVEL {
            return Err(invalid(property, "already carries a hotel"));
        }
        if !state.owns_group(player, &prop.group) {
            return Err(invalid(property, &format!("{player} does not own all of group {}", prop.group)));
        }

        let group_min = state
            .group_levels(&prop.group)
            .into_iter()
            .map(|(_, level)| level)
            .min()
            .unwrap_or(0);
        if ownership.development > group_min {
            return Err(EconomyError::UnevenBuildViolation {
                property,
                group: prop.group.clone(),
            });
        }

        let cost = increment_cost(prop, ownership.development + 1, &self.config);
        let available = state.player(player)?.balance;
        if available < cost {
            return Err(EconomyError::InsufficientFunds { needed: cost, available });
        }
        Ok(cost)
    }

    /// Add one house (or convert four houses into a hotel).
    pub fn build(&self, state: &mut GameState, player: PlayerId, property: PropertyId) -> EconomyResult<Vec<StateChange>> {
        let cost = self.check_build(state, player, property)?;
        let changes = vec![
            state.adjust_balance(player, -cost)?,
            state.update_ownership(property, |o| o.development += 1)?,
        ];
        debug!(%player, %property, cost, "Built increment");
        Ok(changes)
    }

    // -- sell ----------------------------------------------------------------

    /// Validate selling one increment and return the bank's payout.
    pub fn check_sell_house(&self, state: &GameState, player: PlayerId, property: PropertyId) -> EconomyResult<i64> {
        let ownership = owned_by(state, player, property)?;
        let prop = state.property(property)?;

        if ownership.development == 0 {
            return Err(invalid(property, "no houses to sell"));
        }

        let group_max = state
            .group_levels(&prop.group)
            .into_iter()
            .map(|(_, level)| level)
            .max()
            .unwrap_or(0);
        if ownership.development < group_max {
            return Err(EconomyError::UnevenBuildViolation {
                property,
                group: prop.group.clone(),
            });
        }

        Ok(sale_value(prop, ownership.development, &self.config))
    }

    /// Sell one increment back to the bank at half its cost.
    pub fn sell_house(&self, state: &mut GameState, player: PlayerId, property: PropertyId) -> EconomyResult<Vec<StateChange>> {
        let payout = self.check_sell_house(state, player, property)?;
        let changes = vec![
            state.adjust_balance(player, payout)?,
            state.update_ownership(property, |o| o.development -= 1)?,
        ];
        debug!(%player, %property, payout, "Sold increment");
        Ok(changes)
    }

    // -- mortgage ----------------------------------------------------------

    /// Validate a mortgage and return the cash it raises.
    pub fn check_mortgage(&self, state: &GameState, player: PlayerId, property: PropertyId) -> EconomyResult<i64> {
        let ownership = owned_by(state, player, property)?;
        if ownership.mortgaged {
            return Err(invalid(property, "already mortgaged"));
        }
        if ownership.development > 0 {
            return Err(invalid(property, "sell all buildings before mortgaging"));
        }
        Ok(state.property(property)?.mortgage_value())
    }

    pub fn mortgage(&self, state: &mut GameState, player: PlayerId, property: PropertyId) -> EconomyResult<Vec<StateChange>> {
        let raised = self.check_mortgage(state, player, property)?;
        let changes = vec![
            state.adjust_balance(player, raised)?,
            state.update_ownership(property, |o| o.mortgaged = true)?,
        ];
        debug!(%player, %property, raised, "Mortgaged");
        Ok(changes)
    }

    /// Validate lifting a mortgage and return its cost including interest.
    pub fn check_unmortgage(&self, state: &GameState, player: PlayerId, property: PropertyId) -> EconomyResult<i64> {
        let ownership = owned_by(state, player, property)?;
        if !ownership.mortgaged {
            return Err(invalid(property, "not mortgaged"));
        }
        let cost = self.config.unmortgage_cost(state.property(property)?);
        let available = state.player(player)?.balance;
        if available < cost {
            return Err(EconomyError::InsufficientFunds { needed: cost, available });
        }
        Ok(cost)
    }

    pub fn unmortgage(&self, state: &mut GameState, player: PlayerId, property: PropertyId) -> EconomyResult<Vec<StateChange>> {
        let cost = self.check_unmortgage(state, player, property)?;
        let changes = vec![
            state.adjust_balance(player, -cost)?,
            state.update_ownership(property, |o| o.mortgaged = false)?,
        ];
        debug!(%player, %property, cost, "Unmortgaged");
        Ok(changes)
    }

    // -- purchase ----------------------------------------------------------

    /// Validate buying a bank-held property at list price.
    pub fn check_purchase(&self, state: &GameState, player: PlayerId, property: PropertyId) -> EconomyResult<i64> {
        if state.player(player)?.eliminated {
            return Err(invalid(property, &format!("{player} has been eliminated")));
        }
        if state.ownership(property)?.owner != Owner::Bank {
            return Err(invalid(property, "already owned"));
        }
        let price = state.property(property)?.price;
        let available = state.player(player)?.balance;
        if available < price {
            return Err(EconomyError::InsufficientFunds { needed: price, available });
        }
        Ok(price)
    }

    pub fn purchase(&self, state: &mut GameState, player: PlayerId, property: PropertyId) -> EconomyResult<Vec<StateChange>> {
        let price = self.check_purchase(state, player, property)?;
        let changes = vec![
            state.adjust_balance(player, -price)?,
            state.update_ownership(property, |o| {
                *o = PropertyOwnership::unowned(property);
                o.owner = Owner::Player(player);
            })?,
        ];
        debug!(%player, %property, price, "Purchased");
        Ok(changes)
    }
}

/// The ownership record of `property`, if `player` is live and holds it.
fn owned_by(state: &GameState, player: PlayerId, property: PropertyId) -> EconomyResult<&PropertyOwnership> {
    if state.player(player)?.eliminated {
        return Err(invalid(property, &format!("{player} has been eliminated")));
    }
    let ownership = state.ownership(property)?;
    if ownership.owner != Owner::Player(player) {
        return Err(invalid(property, &format!("not owned by {player}")));
    }
    Ok(ownership)
}

fn invalid(property: PropertyId, reason: &str) -> EconomyError {
    EconomyError::InvalidPropertyState {
        property,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
