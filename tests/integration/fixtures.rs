//! Shared fixtures for integration testing.
//!
//! Seeds games on the classic board and provides a game store whose writes
//! can be made to fail on demand, all in-memory with no external
//! dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use monopoly_economy::config::AppConfig;
use monopoly_economy::engine::EconomyService;
use monopoly_economy::repository::{GameStateRepository, InMemoryGameStore, InMemoryTradeStore};
use monopoly_economy::storage::classic_board;
use monopoly_economy::types::*;

// Classic board ids used across the tests.
pub const MEDITERRANEAN: PropertyId = PropertyId(1);
pub const BALTIC: PropertyId = PropertyId(2);
pub const ORIENTAL: PropertyId = PropertyId(3);
pub const VERMONT: PropertyId = PropertyId(4);
pub const CONNECTICUT: PropertyId = PropertyId(5);
pub const PARK_PLACE: PropertyId = PropertyId(21);
pub const BOARDWALK: PropertyId = PropertyId(22);

/// A seat at the table: id, starting balance, automated or human.
pub struct Seat {
    pub id: u32,
    pub balance: i64,
    pub automated: bool,
}

pub fn human(id: u32, balance: i64) -> Seat {
    Seat { id, balance, automated: false }
}

pub fn bot(id: u32, balance: i64) -> Seat {
    Seat { id, balance, automated: true }
}

/// Build a game on the classic board. `holdings` are
/// (player, property, development) triples.
pub fn make_state(seats: &[Seat], holdings: &[(u32, PropertyId, u8)]) -> GameState {
    let players = seats
        .iter()
        .enumerate()
        .map(|(i, seat)| {
            let id = PlayerId(seat.id);
            let name = format!("Player {}", seat.id);
            if seat.automated {
                Player::automated(id, &name, seat.balance, i as u32)
            } else {
                Player::new(id, &name, seat.balance, i as u32)
            }
        })
        .collect();
    let mut state = GameState::new(GameId::new(), Arc::new(classic_board()), players);
    for (player, property, development) in holdings {
        state
            .update_ownership(*property, |o| {
                o.owner = Owner::Player(PlayerId(*player));
                o.development = *development;
            })
            .expect("fixture property exists");
    }
    state
}

/// A service over fresh in-memory stores holding one game.
pub struct Table {
    pub service: EconomyService,
    pub games: Arc<InMemoryGameStore>,
    pub trades: Arc<InMemoryTradeStore>,
    pub game: GameId,
}

pub async fn make_table(seats: &[Seat], holdings: &[(u32, PropertyId, u8)]) -> Table {
    make_table_with(AppConfig::default(), seats, holdings).await
}

pub async fn make_table_with(config: AppConfig, seats: &[Seat], holdings: &[(u32, PropertyId, u8)]) -> Table {
    let state = make_state(seats, holdings);
    let games = Arc::new(InMemoryGameStore::new());
    games.insert_game(&state).await;
    let trades = Arc::new(InMemoryTradeStore::new());
    let service = EconomyService::new(state.board_handle(), config, games.clone(), trades.clone());
    Table {
        service,
        games,
        trades,
        game: state.game_id,
    }
}

impl Table {
    pub async fn state(&self) -> GameState {
        self.service.snapshot(self.game).await.unwrap()
    }

    pub async fn balance(&self, player: u32) -> i64 {
        self.state().await.player(PlayerId(player)).unwrap().balance
    }

    pub async fn owner(&self, property: PropertyId) -> Owner {
        self.state().await.ownership(property).unwrap().owner
    }
}

// ---------------------------------------------------------------------------
// Flaky store
// ---------------------------------------------------------------------------

/// A game store whose writes can be forced to fail.
///
/// Reads always go through to the wrapped in-memory store.
pub struct FlakyGameStore {
    inner: InMemoryGameStore,
    writes: Arc<Mutex<usize>>,
    /// If set, all writes will return this error.
    force_error: Arc<Mutex<Option<String>>>,
    /// If set, changes left before writes start failing.
    fail_after: Arc<Mutex<Option<usize>>>,
}

impl FlakyGameStore {
    pub async fn new(state: &GameState) -> Self {
        let inner = InMemoryGameStore::new();
        inner.insert_game(state).await;
        Self {
            inner,
            writes: Arc::new(Mutex::new(0)),
            force_error: Arc::new(Mutex::new(None)),
            fail_after: Arc::new(Mutex::new(None)),
        }
    }

    /// Let `changes` more changes through, then fail every write.
    pub fn fail_after(&self, changes: usize) {
        *self.fail_after.lock().unwrap() = Some(changes);
    }

    /// Force all subsequent writes to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Writes that reached the inner store.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    /// Admit a write of `count` changes, or fail it as a whole.
    fn check_write(&self, count: usize) -> Result<()> {
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", msg));
        }
        let mut budget = self.fail_after.lock().unwrap();
        if let Some(left) = budget.as_mut() {
            if *left < count {
                *left = 0;
                return Err(anyhow!("store unavailable"));
            }
            *left -= count;
        }
        *self.writes.lock().unwrap() += count;
        Ok(())
    }
}

#[async_trait]
impl GameStateRepository for FlakyGameStore {
    async fn get_ownership(&self, game: GameId) -> Result<Vec<PropertyOwnership>> {
        self.inner.get_ownership(game).await
    }

    async fn get_players(&self, game: GameId) -> Result<Vec<Player>> {
        self.inner.get_players(game).await
    }

    async fn apply_ownership_change(&self, game: GameId, change: PropertyOwnership) -> Result<()> {
        self.check_write(1)?;
        self.inner.apply_ownership_change(game, change).await
    }

    async fn apply_balance_change(&self, game: GameId, player: PlayerId, delta: i64) -> Result<()> {
        self.check_write(1)?;
        self.inner.apply_balance_change(game, player, delta).await
    }

    async fn mark_eliminated(&self, game: GameId, player: PlayerId) -> Result<()> {
        self.check_write(1)?;
        self.inner.mark_eliminated(game, player).await
    }

    async fn apply_changes(&self, game: GameId, changes: &[StateChange]) -> Result<()> {
        self.check_write(changes.len())?;
        self.inner.apply_changes(game, changes).await
    }
}
