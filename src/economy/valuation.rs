//! Property valuation and player liquidity.
//!
//! Pure functions over static board data and the current ownership records.
//! The only failure mode is a dangling property or player reference.

use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;
use crate::types::{
    EconomyResult, GameState, Owner, PlayerId, Property, PropertyId, PropertyOwnership,
    HOTEL_LEVEL, MAX_HOUSES,
};

/// Price of the increment that raises a property to `level_after`.
/// The fifth increment is the hotel.
pub fn increment_cost(property: &Property, level_after: u8, rules: &RulesConfig) -> i64 {
    if level_after >= HOTEL_LEVEL {
        rules.hotel_cost(property)
    } else {
        property.house_cost
    }
}

/// Cash returned by the bank for selling the increment at `level`.
pub fn sale_value(property: &Property, level: u8, rules: &RulesConfig) -> i64 {
    increment_cost(property, level, rules) / 2
}

/// Total spent to develop a property up to `level`.
pub fn development_cost_basis(property: &Property, level: u8, rules: &RulesConfig) -> i64 {
    let houses = i64::from(level.min(MAX_HOUSES)) * property.house_cost;
    let hotel = if level >= HOTEL_LEVEL {
        rules.hotel_cost(property)
    } else {
        0
    };
    houses + hotel
}

/// Effective value: purchase price plus development cost basis, less the
/// mortgage value when mortgaged.
pub fn property_value(property: &Property, ownership: &PropertyOwnership, rules: &RulesConfig) -> i64 {
    let mut value = property.price + development_cost_basis(property, ownership.development, rules);
    if ownership.mortgaged {
        value -= property.mortgage_value();
    }
    value
}

/// [`property_value`] looked up from a snapshot.
pub fn value_of(state: &GameState, property: PropertyId, rules: &RulesConfig) -> EconomyResult<i64> {
    Ok(property_value(
        state.property(property)?,
        state.ownership(property)?,
        rules,
    ))
}

/// Rent a visitor owes on landing. Unowned and mortgaged properties charge
/// nothing; bare lots in a complete group charge double the base rent.
pub fn rent_due(state: &GameState, property: PropertyId) -> EconomyResult<i64> {
    let prop = state.property(property)?;
    let ownership = state.ownership(property)?;
    let owner = match ownership.owner {
        Owner::Bank => return Ok(0),
        Owner::Player(id) => id,
    };
    if ownership.mortgaged {
        return Ok(0);
    }
    if ownership.development == 0 && state.owns_group(owner, &prop.group) {
        return Ok(prop.base_rent * 2);
    }
    Ok(prop.rent_at(ownership.development))
}

// ---------------------------------------------------------------------------
// Liquidity
// ---------------------------------------------------------------------------

/// A player's cash plus what their holdings could raise from the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Liquidity {
    pub cash: i64,
    /// Half-price over every unmortgaged property, developed or not:
    /// what mortgaging could raise once all buildings are sold.
    pub unmortgaged_equity: i64,
    /// Half-price over unmortgaged properties with no buildings:
    /// what mortgaging could raise right now.
    pub mortgageable_equity: i64,
    /// Sale value of every house and hotel.
    pub house_equity: i64,
}

impl Liquidity {
    /// Everything liquidation could raise, excluding cash on hand.
    pub fn total_liquidatable(&self) -> i64 {
        self.house_equity + self.unmortgaged_equity
    }

    /// Cash plus everything liquidation could raise.
    pub fn net_worth_in_cash(&self) -> i64 {
        self.cash + self.total_liquidatable()
    }

    /// Whether liquidation could cover `shortfall`.
    pub fn covers(&self, shortfall: i64) -> bool {
        self.total_liquidatable() >= shortfall
    }
}

/// Partition a player's holdings into cash and recoverable value.
pub fn player_liquidity(state: &GameState, player: PlayerId, rules: &RulesConfig) -> EconomyResult<Liquidity> {
    let mut liquidity = Liquidity {
        cash: state.player(player)?.balance,
        ..Liquidity::default()
    };

    for id in state.holdings(player) {
        let property = state.property(id)?;
        let ownership = state.ownership(id)?;

        liquidity.house_equity += (1..=ownership.development)
            .map(|level| sale_value(property, level, rules))
            .sum::<i64>();

        if !ownership.mortgaged {
            liquidity.unmortgaged_equity += property.mortgage_value();
            if ownership.development == 0 {
                liquidity.mortgageable_equity += property.mortgage_value();
            }
        }
    }

    Ok(liquidity)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
