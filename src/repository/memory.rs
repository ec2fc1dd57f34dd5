//! In-memory repositories.
//!
//! Used by the simulation binary and tests. Each store guards its maps with
//! a `tokio::sync::RwLock` so it can be shared across tasks behind an `Arc`.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use super::{GameStateRepository, RepositoryError, TradeFields, TradeRepository};
use crate::types::{
    GameId, GameState, Player, PlayerId, PropertyId, PropertyOwnership, StateChange, TradeId,
    TradeRequest, TradeStatus,
};

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct GameRecord {
    players: BTreeMap<PlayerId, Player>,
    ownerships: BTreeMap<PropertyId, PropertyOwnership>,
}

impl GameRecord {
    fn player_mut(&mut self, player: PlayerId) -> Result<&mut Player, RepositoryError> {
        self.players
            .get_mut(&player)
            .ok_or_else(|| RepositoryError::RecordNotFound(player.to_string()))
    }

    fn apply(&mut self, change: &StateChange) -> Result<(), RepositoryError> {
        match change {
            StateChange::Balance { player, delta } => self.player_mut(*player)?.balance += delta,
            StateChange::Ownership(record) => {
                let slot = self
                    .ownerships
                    .get_mut(&record.property)
                    .ok_or_else(|| RepositoryError::RecordNotFound(record.property.to_string()))?;
                *slot = record.clone();
            }
            StateChange::Eliminated { player } => self.player_mut(*player)?.eliminated = true,
            StateChange::Moved { player, position } => self.player_mut(*player)?.position = *position,
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryGameStore {
    games: RwLock<HashMap<GameId, GameRecord>>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a full snapshot, replacing any previous records for the game.
    pub async fn insert_game(&self, state: &GameState) {
        let record = GameRecord {
            players: state.players().map(|p| (p.id, p.clone())).collect(),
            ownerships: state.ownerships().map(|o| (o.property, o.clone())).collect(),
        };
        self.games.write().await.insert(state.game_id, record);
        debug!(game = %state.game_id, "Game stored");
    }

    pub async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }
}

#[async_trait]
impl GameStateRepository for InMemoryGameStore {
    async fn get_ownership(&self, game: GameId) -> Result<Vec<PropertyOwnership>> {
        let games = self.games.read().await;
        let record = games.get(&game).ok_or(RepositoryError::GameNotFound(game))?;
        Ok(record.ownerships.values().cloned().collect())
    }

    async fn get_players(&self, game: GameId) -> Result<Vec<Player>> {
        let games = self.games.read().await;
        let record = games.get(&game).ok_or(RepositoryError::GameNotFound(game))?;
        Ok(record.players.values().cloned().collect())
    }

    async fn apply_ownership_change(&self, game: GameId, change: PropertyOwnership) -> Result<()> {
        self.apply_changes(game, &[StateChange::Ownership(change)]).await
    }

    async fn apply_balance_change(&self, game: GameId, player: PlayerId, delta: i64) -> Result<()> {
        self.apply_changes(game, &[StateChange::Balance { player, delta }]).await
    }

    async fn mark_eliminated(&self, game: GameId, player: PlayerId) -> Result<()> {
        self.apply_changes(game, &[StateChange::Eliminated { player }]).await
    }

    async fn apply_changes(&self, game: GameId, changes: &[StateChange]) -> Result<()> {
        let mut games = self.games.write().await;
        let record = games.get_mut(&game).ok_or(RepositoryError::GameNotFound(game))?;

        // Stage on a copy so a bad change leaves the stored record untouched.
        let mut staged = record.clone();
        for change in changes {
            staged.apply(change)?;
        }
        *record = staged;
        debug!(%game, count = changes.len(), "Changes applied");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryTradeStore {
    trades: RwLock<HashMap<TradeId, TradeRequest>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored trade of a game, in creation order.
    pub async fn all_trades(&self, game: GameId) -> Vec<TradeRequest> {
        let trades = self.trades.read().await;
        let mut found: Vec<_> = trades.values().filter(|t| t.game_id == game).cloned().collect();
        found.sort_by_key(|t| t.sequence);
        found
    }
}

#[async_trait]
impl TradeRepository for InMemoryTradeStore {
    async fn create_trade(&self, trade: &TradeRequest) -> Result<()> {
        let mut trades = self.trades.write().await;
        if trades.contains_key(&trade.id) {
            return Err(RepositoryError::DuplicateTrade(trade.id).into());
        }
        trades.insert(trade.id, trade.clone());
        Ok(())
    }

    async fn get_trade(&self, id: TradeId) -> Result<Option<TradeRequest>> {
        Ok(self.trades.read().await.get(&id).cloned())
    }

    async fn update_trade_status(
        &self,
        id: TradeId,
        status: TradeStatus,
        fields: TradeFields,
        expected_version: u64,
    ) -> Result<()> {
        let mut trades = self.trades.write().await;
        let stored = trades.get_mut(&id).ok_or(RepositoryError::TradeNotFound(id))?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                trade: id,
                expected: expected_version,
                found: stored.version,
            }
            .into());
        }

        stored.status = status;
        stored.proposer = fields.proposer;
        stored.target = fields.target;
        stored.terms = fields.terms;
        stored.counter_count = fields.counter_count;
        stored.version = fields.version;
        stored.updated_at = fields.updated_at;
        debug!(trade = %id, %status, version = stored.version, "Trade updated");
        Ok(())
    }

    async fn list_pending(&self, game: GameId, player: PlayerId) -> Result<Vec<TradeRequest>> {
        let trades = self.trades.read().await;
        let mut pending: Vec<_> = trades
            .values()
            .filter(|t| t.game_id == game && t.target == player && t.status.is_open())
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.sequence);
        Ok(pending)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
