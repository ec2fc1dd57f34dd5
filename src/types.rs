//! Shared types for the economy engine.
//!
//! These types form the data model used across all modules: static board
//! data, the dynamic per-game snapshot, trade records, the state changes the
//! core emits, and the domain error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Development level of a property carrying a hotel.
pub const HOTEL_LEVEL: u8 = 5;

/// Houses a property can carry before the next increment becomes a hotel.
pub const MAX_HOUSES: u8 = 4;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub u32);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "property-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub Uuid);

impl GameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub Uuid);

impl TradeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Static board data
// ---------------------------------------------------------------------------

/// Immutable reference data for one purchasable property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    /// Square index around the board.
    pub position: u8,
    pub price: i64,
    /// Rent with no development.
    pub base_rent: i64,
    /// Rent with one to four houses.
    pub house_rents: [i64; 4],
    pub hotel_rent: i64,
    pub house_cost: i64,
    /// Monopoly group (colour set) identifier.
    pub group: String,
}

impl Property {
    /// Cash raised by mortgaging, always half the purchase price.
    pub fn mortgage_value(&self) -> i64 {
        self.price / 2
    }

    /// Listed rent at a development level, ignoring the monopoly bonus.
    pub fn rent_at(&self, level: u8) -> i64 {
        match level {
            0 => self.base_rent,
            l if l >= HOTEL_LEVEL => self.hotel_rent,
            l => self.house_rents[usize::from(l) - 1],
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ${} (house ${}, group {})",
            self.name, self.id, self.price, self.house_cost, self.group
        )
    }
}

/// The full set of properties in play, keyed by id.
///
/// Serialized as a plain list of properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Property>", into = "Vec<Property>")]
pub struct Board {
    properties: BTreeMap<PropertyId, Property>,
}

impl From<Vec<Property>> for Board {
    fn from(properties: Vec<Property>) -> Self {
        Self::new(properties)
    }
}

impl From<Board> for Vec<Property> {
    fn from(board: Board) -> Self {
        board.properties.into_values().collect()
    }
}

impl Board {
    pub fn new(properties: Vec<Property>) -> Self {
        Self {
            properties: properties.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn get(&self, id: PropertyId) -> EconomyResult<&Property> {
        self.properties
            .get(&id)
            .ok_or(EconomyError::UnknownProperty(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Property ids sharing `group`, in id order.
    pub fn group_members(&self, group: &str) -> Vec<PropertyId> {
        self.properties
            .values()
            .filter(|p| p.group == group)
            .map(|p| p.id)
            .collect()
    }

    /// Distinct group identifiers, sorted.
    pub fn groups(&self) -> BTreeSet<&str> {
        self.properties.values().map(|p| p.group.as_str()).collect()
    }

    /// The property occupying a board square, if any.
    pub fn at_position(&self, position: u8) -> Option<&Property> {
        self.properties.values().find(|p| p.position == position)
    }

    /// A small three-group board for unit tests.
    ///
    /// red: 200/150/100 (house 50), blue: 300/250 (house 100),
    /// green: 120/120 (house 50).
    #[cfg(test)]
    pub fn sample() -> Self {
        fn prop(
            id: u32,
            price: i64,
            base_rent: i64,
            house_rents: [i64; 4],
            hotel_rent: i64,
            house_cost: i64,
            group: &str,
        ) -> Property {
            Property {
                id: PropertyId(id),
                name: format!("{} {}", group, id),
                position: id as u8,
                price,
                base_rent,
                house_rents,
                hotel_rent,
                house_cost,
                group: group.to_string(),
            }
        }

        Board::new(vec![
            prop(1, 200, 16, [80, 220, 600, 800], 1000, 50, "red"),
            prop(2, 150, 12, [60, 180, 500, 700], 900, 50, "red"),
            prop(3, 100, 8, [40, 100, 300, 450], 600, 50, "red"),
            prop(4, 300, 26, [130, 390, 900, 1100], 1275, 100, "blue"),
            prop(5, 250, 22, [110, 330, 800, 975], 1150, 100, "blue"),
            prop(6, 120, 8, [40, 100, 300, 450], 600, 50, "green"),
            prop(7, 120, 8, [40, 100, 300, 450], 600, 50, "green"),
        ])
    }
}

// ---------------------------------------------------------------------------
// Dynamic per-game state
// ---------------------------------------------------------------------------

/// Who holds a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Owner {
    /// Unowned, or returned to the bank.
    #[default]
    Bank,
    Player(PlayerId),
}

impl Owner {
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Owner::Bank => None,
            Owner::Player(id) => Some(*id),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Bank => write!(f, "bank"),
            Owner::Player(id) => write!(f, "{id}"),
        }
    }
}

/// Ownership and development record for one property in one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOwnership {
    pub property: PropertyId,
    pub owner: Owner,
    /// 0-4 houses, 5 = hotel.
    pub development: u8,
    pub mortgaged: bool,
}

impl PropertyOwnership {
    /// A record held by the bank with no development.
    pub fn unowned(property: PropertyId) -> Self {
        Self {
            property,
            owner: Owner::Bank,
            development: 0,
            mortgaged: false,
        }
    }

    pub fn is_developed(&self) -> bool {
        self.development > 0
    }

    /// Development and mortgage are mutually exclusive, and bank-held
    /// property is always bare.
    pub fn is_consistent(&self) -> bool {
        self.inconsistency().is_none()
    }

    /// The first rule this record breaks, if any.
    pub fn inconsistency(&self) -> Option<&'static str> {
        if self.development > HOTEL_LEVEL {
            Some("development above hotel level")
        } else if self.development > 0 && self.mortgaged {
            Some("developed and mortgaged at the same time")
        } else if self.owner == Owner::Bank && self.development > 0 {
            Some("bank-held but developed")
        } else if self.owner == Owner::Bank && self.mortgaged {
            Some("bank-held but mortgaged")
        } else {
            None
        }
    }
}

/// A participant in one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// May go negative during a turn until liquidation resolves it.
    pub balance: i64,
    pub position: u8,
    pub turn_order: u32,
    pub eliminated: bool,
    /// Driven by the automated trader rather than a human.
    pub automated: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: &str, balance: i64, turn_order: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            balance,
            position: 0,
            turn_order,
            eliminated: false,
            automated: false,
        }
    }

    /// Same as `new` but flagged as an automated participant.
    pub fn automated(id: PlayerId, name: &str, balance: i64, turn_order: u32) -> Self {
        Self {
            automated: true,
            ..Self::new(id, name, balance, turn_order)
        }
    }

    pub fn is_live(&self) -> bool {
        !self.eliminated
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) balance=${} pos={}{}",
            self.name,
            self.id,
            self.balance,
            self.position,
            if self.eliminated { " [eliminated]" } else { "" }
        )
    }
}

/// A mutation the core applied to its in-memory snapshot. The caller
/// replays these against the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    Balance { player: PlayerId, delta: i64 },
    /// Full replacement of one ownership record.
    Ownership(PropertyOwnership),
    Eliminated { player: PlayerId },
    Moved { player: PlayerId, position: u8 },
}

/// In-memory snapshot of one game: the board plus every ownership record
/// and player. All core operations run against this.
#[derive(Debug, Clone)]
pub struct GameState {
    pub game_id: GameId,
    board: Arc<Board>,
    ownerships: BTreeMap<PropertyId, PropertyOwnership>,
    players: BTreeMap<PlayerId, Player>,
}

impl GameState {
    /// Fresh game: every property held by the bank.
    pub fn new(game_id: GameId, board: Arc<Board>, players: Vec<Player>) -> Self {
        let ownerships = board
            .iter()
            .map(|p| (p.id, PropertyOwnership::unowned(p.id)))
            .collect();
        Self {
            game_id,
            board,
            ownerships,
            players: players.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Rebuild a snapshot from repository records, validating every
    /// reference. Properties without a record are treated as unowned.
    pub fn from_snapshot(
        game_id: GameId,
        board: Arc<Board>,
        players: Vec<Player>,
        ownerships: Vec<PropertyOwnership>,
    ) -> EconomyResult<Self> {
        let mut state = Self::new(game_id, board, players);
        for record in ownerships {
            state.board.get(record.property)?;
            if let Some(owner) = record.owner.player() {
                state.player(owner)?;
            }
            if let Some(reason) = record.inconsistency() {
                return Err(EconomyError::InvalidPropertyState {
                    property: record.property,
                    reason: reason.to_string(),
                });
            }
            state.ownerships.insert(record.property, record);
        }
        Ok(state)
    }

    // -- lookups ---------------------------------------------------------

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_handle(&self) -> Arc<Board> {
        Arc::clone(&self.board)
    }

    pub fn property(&self, id: PropertyId) -> EconomyResult<&Property> {
        self.board.get(id)
    }

    pub fn ownership(&self, id: PropertyId) -> EconomyResult<&PropertyOwnership> {
        self.ownerships
            .get(&id)
            .ok_or(EconomyError::UnknownProperty(id))
    }

    pub fn ownerships(&self) -> impl Iterator<Item = &PropertyOwnership> {
        self.ownerships.values()
    }

    pub fn player(&self, id: PlayerId) -> EconomyResult<&Player> {
        self.players.get(&id).ok_or(EconomyError::UnknownPlayer(id))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> EconomyResult<&mut Player> {
        self.players
            .get_mut(&id)
            .ok_or(EconomyError::UnknownPlayer(id))
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Non-eliminated players in turn order. Eliminated players drop out.
    pub fn turn_order(&self) -> Vec<PlayerId> {
        let mut live: Vec<&Player> = self.players.values().filter(|p| p.is_live()).collect();
        live.sort_by_key(|p| (p.turn_order, p.id));
        live.into_iter().map(|p| p.id).collect()
    }

    /// Property ids currently held by `player`, in id order.
    pub fn holdings(&self, player: PlayerId) -> Vec<PropertyId> {
        self.ownerships
            .values()
            .filter(|o| o.owner == Owner::Player(player))
            .map(|o| o.property)
            .collect()
    }

    /// Whether `player` holds every property of `group`.
    pub fn owns_group(&self, player: PlayerId, group: &str) -> bool {
        let members = self.board.group_members(group);
        !members.is_empty()
            && members.iter().all(|id| {
                self.ownerships
                    .get(id)
                    .is_some_and(|o| o.owner == Owner::Player(player))
            })
    }

    /// Development level of every member of `group`.
    pub fn group_levels(&self, group: &str) -> Vec<(PropertyId, u8)> {
        self.board
            .group_members(group)
            .into_iter()
            .map(|id| {
                let level = self.ownerships.get(&id).map_or(0, |o| o.development);
                (id, level)
            })
            .collect()
    }

    /// Whether any member of `group` carries a house or hotel.
    pub fn group_has_buildings(&self, group: &str) -> bool {
        self.group_levels(group).iter().any(|(_, level)| *level > 0)
    }

    // -- primitive mutations ---------------------------------------------

    /// Add `delta` to a player's balance.
    pub fn adjust_balance(&mut self, player: PlayerId, delta: i64) -> EconomyResult<StateChange> {
        let p = self.player_mut(player)?;
        p.balance += delta;
        Ok(StateChange::Balance { player, delta })
    }

    /// Edit one ownership record in place and report the new record.
    pub fn update_ownership<F>(&mut self, property: PropertyId, edit: F) -> EconomyResult<StateChange>
    where
        F: FnOnce(&mut PropertyOwnership),
    {
        let record = self
            .ownerships
            .get_mut(&property)
            .ok_or(EconomyError::UnknownProperty(property))?;
        edit(record);
        Ok(StateChange::Ownership(record.clone()))
    }

    /// Flag a player as eliminated, which removes them from turn order.
    pub fn eliminate(&mut self, player: PlayerId) -> EconomyResult<StateChange> {
        self.player_mut(player)?.eliminated = true;
        Ok(StateChange::Eliminated { player })
    }

    pub fn move_player(&mut self, player: PlayerId, position: u8) -> EconomyResult<StateChange> {
        self.player_mut(player)?.position = position;
        Ok(StateChange::Moved { player, position })
    }

    /// Replay a change produced elsewhere (e.g. from a repository log).
    pub fn apply_change(&mut self, change: &StateChange) -> EconomyResult<()> {
        match change {
            StateChange::Balance { player, delta } => {
                self.adjust_balance(*player, *delta)?;
            }
            StateChange::Ownership(record) => {
                let record = record.clone();
                self.update_ownership(record.property, |o| *o = record)?;
            }
            StateChange::Eliminated { player } => {
                self.eliminate(*player)?;
            }
            StateChange::Moved { player, position } => {
                self.move_player(*player, *position)?;
            }
        }
        Ok(())
    }

    /// Sample game on `Board::sample()` with the given (id, balance) players.
    #[cfg(test)]
    pub fn sample(players: &[(u32, i64)]) -> Self {
        let players = players
            .iter()
            .enumerate()
            .map(|(i, (id, balance))| {
                Player::automated(PlayerId(*id), &format!("P{id}"), *balance, i as u32)
            })
            .collect();
        Self::new(GameId::new(), Arc::new(Board::sample()), players)
    }

    /// Hand a property to a player at a given development level.
    #[cfg(test)]
    pub fn grant(&mut self, player: u32, property: u32, development: u8) {
        self.update_ownership(PropertyId(property), |o| {
            o.owner = Owner::Player(PlayerId(player));
            o.development = development;
            o.mortgaged = false;
        })
        .unwrap();
    }

    #[cfg(test)]
    pub fn balance(&self, player: u32) -> i64 {
        self.player(PlayerId(player)).unwrap().balance
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// Lifecycle status of a trade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Accepted,
    Declined,
    Countered,
}

impl TradeStatus {
    /// Pending and Countered trades still await a response.
    pub fn is_open(&self) -> bool {
        matches!(self, TradeStatus::Pending | TradeStatus::Countered)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "pending"),
            TradeStatus::Accepted => write!(f, "accepted"),
            TradeStatus::Declined => write!(f, "declined"),
            TradeStatus::Countered => write!(f, "countered"),
        }
    }
}

/// What each side of a trade hands over, from the proposer's viewpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TradeTerms {
    pub offered_properties: BTreeSet<PropertyId>,
    pub offered_cash: i64,
    pub requested_properties: BTreeSet<PropertyId>,
    pub requested_cash: i64,
}

impl TradeTerms {
    /// Offer and request swapped.
    pub fn mirrored(&self) -> Self {
        Self {
            offered_properties: self.requested_properties.clone(),
            offered_cash: self.requested_cash,
            requested_properties: self.offered_properties.clone(),
            requested_cash: self.offered_cash,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.offered_properties.is_empty()
            && self.requested_properties.is_empty()
            && self.offered_cash == 0
            && self.requested_cash == 0
    }

    /// Every property on either side of the trade.
    pub fn all_properties(&self) -> impl Iterator<Item = &PropertyId> {
        self.offered_properties
            .iter()
            .chain(self.requested_properties.iter())
    }
}

/// A trade proposal between two players of one game.
///
/// A counter mutates this record in place rather than creating a new one,
/// so a negotiation chain stays on a single id. `version` is bumped on
/// every transition for optimistic concurrency at the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub id: TradeId,
    pub game_id: GameId,
    pub proposer: PlayerId,
    pub target: PlayerId,
    #[serde(flatten)]
    pub terms: TradeTerms,
    pub status: TradeStatus,
    /// Creation order within the game.
    pub sequence: u64,
    pub version: u64,
    pub counter_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradeRequest {
    /// Record a status transition.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

impl fmt::Display for TradeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trade {} [{}] {} -> {}: offers {:?} + ${}, wants {:?} + ${}",
            self.id,
            self.status,
            self.proposer,
            self.target,
            self.terms.offered_properties,
            self.terms.offered_cash,
            self.terms.requested_properties,
            self.terms.requested_cash,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors raised by the economy core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EconomyError {
    #[error("Unknown property: {0}")]
    UnknownProperty(PropertyId),

    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("Invalid property state ({property}): {reason}")]
    InvalidPropertyState { property: PropertyId, reason: String },

    #[error("Insufficient funds: need ${needed}, have ${available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("Uneven build on {property}: group {group} must stay within one increment")]
    UnevenBuildViolation { property: PropertyId, group: String },

    #[error("Trade infeasible: {0}")]
    TradeInfeasible(String),

    #[error("{player} is insolvent: ${shortfall} cannot be covered")]
    Insolvent { player: PlayerId, shortfall: i64 },

    #[error("{actor} may not act on trade {trade}")]
    UnauthorizedActor { trade: TradeId, actor: PlayerId },

    #[error("Trade {trade} is {status} and cannot change")]
    InvalidTradeTransition { trade: TradeId, status: TradeStatus },

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result type for core economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
