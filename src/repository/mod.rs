//! Persistence collaborators.
//!
//! Defines the `GameStateRepository` and `TradeRepository` traits the
//! service talks to, plus in-memory implementations:
//! - `InMemoryGameStore`: players and ownership records per game
//! - `InMemoryTradeStore`: trade requests with optimistic versioning

pub mod memory;

pub use memory::{InMemoryGameStore, InMemoryTradeStore};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    GameId, Player, PlayerId, PropertyOwnership, StateChange, TradeId, TradeRequest,
    TradeStatus, TradeTerms,
};

/// Player and ownership records for running games.
#[async_trait]
pub trait GameStateRepository: Send + Sync {
    /// Every ownership record of a game.
    async fn get_ownership(&self, game: GameId) -> Result<Vec<PropertyOwnership>>;

    /// Every player of a game, eliminated ones included.
    async fn get_players(&self, game: GameId) -> Result<Vec<Player>>;

    /// Replace one ownership record.
    async fn apply_ownership_change(&self, game: GameId, change: PropertyOwnership) -> Result<()>;

    /// Add `delta` to a player's balance.
    async fn apply_balance_change(&self, game: GameId, player: PlayerId, delta: i64) -> Result<()>;

    async fn mark_eliminated(&self, game: GameId, player: PlayerId) -> Result<()>;

    /// Apply a batch of changes atomically: either every change lands or
    /// none does.
    async fn apply_changes(&self, game: GameId, changes: &[StateChange]) -> Result<()>;
}

/// Trade request storage.
#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn create_trade(&self, trade: &TradeRequest) -> Result<()>;

    async fn get_trade(&self, id: TradeId) -> Result<Option<TradeRequest>>;

    /// Write a transition. Fails with [`RepositoryError::VersionConflict`]
    /// unless the stored record is still at `expected_version`.
    async fn update_trade_status(
        &self,
        id: TradeId,
        status: TradeStatus,
        fields: TradeFields,
        expected_version: u64,
    ) -> Result<()>;

    /// Open trades awaiting a response from `player`, oldest first.
    async fn list_pending(&self, game: GameId, player: PlayerId) -> Result<Vec<TradeRequest>>;
}

/// The mutable part of a trade record, written alongside a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFields {
    pub proposer: PlayerId,
    pub target: PlayerId,
    pub terms: TradeTerms,
    pub counter_count: u32,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl From<&TradeRequest> for TradeFields {
    fn from(trade: &TradeRequest) -> Self {
        Self {
            proposer: trade.proposer,
            target: trade.target,
            terms: trade.terms.clone(),
            counter_count: trade.counter_count,
            version: trade.version,
            updated_at: trade.updated_at,
        }
    }
}

/// Errors raised by repository implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("Trade not found: {0}")]
    TradeNotFound(TradeId),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Trade {trade} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        trade: TradeId,
        expected: u64,
        found: u64,
    },

    #[error("Duplicate trade: {0}")]
    DuplicateTrade(TradeId),
}
