//! Economy service.
//!
//! Bridges the synchronous core and the async repositories: every operation
//! loads a fresh snapshot, runs the core against it, then replays the
//! resulting changes through the repositories. Trade writes carry the
//! version the caller loaded so concurrent responses cannot both land.

use anyhow::{Context, Result};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::economy::valuation::rent_due;
use crate::economy::{
    BankruptcyReport, BankruptcyResolver, DevelopmentAction, DevelopmentRules, LiquidationPlan,
    LiquidationPlanner,
};
use crate::repository::{GameStateRepository, RepositoryError, TradeFields, TradeRepository};
use crate::storage::BOARD_SQUARES;
use crate::trade::{AutomatedTrader, Decision, Negotiation};
use crate::types::{
    Board, EconomyError, GameId, GameState, Owner, PlayerId, PropertyId, StateChange, TradeId,
    TradeRequest, TradeTerms,
};

/// Result of a development request. Rule violations are an expected outcome
/// rather than an error, so the caller can retry with something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied(Vec<StateChange>),
    Rejected(EconomyError),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }
}

/// Where a move took a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub from: u8,
    pub to: u8,
    pub passed_go: bool,
}

/// A human (or scripted) response to a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeResponse {
    Accept,
    Decline,
    /// Counter with new terms, or with the mirrored original when `None`.
    Counter(Option<TradeTerms>),
}

/// One trade answered by an automated player.
#[derive(Debug, Clone)]
pub struct AutomatedResponse {
    pub trade: TradeId,
    pub responder: PlayerId,
    pub decision: Decision,
}

pub struct EconomyService {
    board: Arc<Board>,
    config: AppConfig,
    games: Arc<dyn GameStateRepository>,
    trades: Arc<dyn TradeRepository>,
    rules: DevelopmentRules,
    planner: LiquidationPlanner,
    resolver: BankruptcyResolver,
    trader: AutomatedTrader,
    sequence: AtomicU64,
}

impl EconomyService {
    pub fn new(
        board: Arc<Board>,
        config: AppConfig,
        games: Arc<dyn GameStateRepository>,
        trades: Arc<dyn TradeRepository>,
    ) -> Self {
        Self {
            rules: DevelopmentRules::new(config.rules.clone()),
            planner: LiquidationPlanner::new(config.rules.clone()),
            resolver: BankruptcyResolver::new(config.rules.clone()),
            trader: AutomatedTrader::new(config.rules.clone(), config.ai.clone()),
            board,
            config,
            games,
            trades,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn board(&self) -> Arc<Board> {
        Arc::clone(&self.board)
    }

    pub fn rules(&self) -> &DevelopmentRules {
        &self.rules
    }

    pub fn trader(&self) -> &AutomatedTrader {
        &self.trader
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Load and validate the current state of a game.
    pub async fn snapshot(&self, game: GameId) -> Result<GameState> {
        let (players, ownerships) =
            tokio::try_join!(self.games.get_players(game), self.games.get_ownership(game))
                .with_context(|| format!("Failed to load game {game}"))?;
        GameState::from_snapshot(game, Arc::clone(&self.board), players, ownerships)
            .with_context(|| format!("Inconsistent records for game {game}"))
    }

    /// Write core changes through the repository as one atomic batch.
    pub async fn persist(&self, game: GameId, changes: &[StateChange]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.games
            .apply_changes(game, changes)
            .await
            .with_context(|| format!("Failed to persist {} changes for game {game}", changes.len()))?;
        debug!(%game, count = changes.len(), "Changes persisted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Property actions
    // -----------------------------------------------------------------------

    pub async fn develop(&self, game: GameId, player: PlayerId, action: DevelopmentAction) -> Result<ActionOutcome> {
        let mut state = self.snapshot(game).await?;
        match self.rules.apply(&mut state, player, action) {
            Ok(changes) => {
                self.persist(game, &changes).await?;
                info!(%game, %player, %action, "Development applied");
                Ok(ActionOutcome::Applied(changes))
            }
            Err(e) => {
                info!(%game, %player, %action, reason = %e, "Development rejected");
                Ok(ActionOutcome::Rejected(e))
            }
        }
    }

    pub async fn purchase(&self, game: GameId, player: PlayerId, property: PropertyId) -> Result<ActionOutcome> {
        let mut state = self.snapshot(game).await?;
        match self.rules.purchase(&mut state, player, property) {
            Ok(changes) => {
                self.persist(game, &changes).await?;
                info!(%game, %player, %property, "Property purchased");
                Ok(ActionOutcome::Applied(changes))
            }
            Err(e) => {
                debug!(%game, %player, %property, reason = %e, "Purchase rejected");
                Ok(ActionOutcome::Rejected(e))
            }
        }
    }

    /// Charge `player` the rent due on `property` and pay its owner. The
    /// balance may go negative; resolving that is the caller's next step.
    pub async fn charge_rent(&self, game: GameId, player: PlayerId, property: PropertyId) -> Result<i64> {
        let mut state = self.snapshot(game).await?;
        let rent = rent_due(&state, property)?;
        let owner = state.ownership(property)?.owner;
        let Owner::Player(landlord) = owner else {
            return Ok(0);
        };
        if rent == 0 || landlord == player {
            return Ok(0);
        }

        let changes = vec![
            state.adjust_balance(player, -rent)?,
            state.adjust_balance(landlord, rent)?,
        ];
        self.persist(game, &changes).await?;
        debug!(%game, %player, %landlord, %property, rent, "Rent paid");
        Ok(rent)
    }

    /// Move `player` forward `steps` squares. Passing or landing on Go
    /// credits the salary in the same write as the move.
    pub async fn advance(&self, game: GameId, player: PlayerId, steps: u8) -> Result<Movement> {
        let mut state = self.snapshot(game).await?;
        let from = state.player(player)?.position;
        let target = u16::from(from) + u16::from(steps);
        let squares = u16::from(BOARD_SQUARES);
        let to = (target % squares) as u8;
        let passed_go = target >= squares;

        let mut changes = vec![state.move_player(player, to)?];
        if passed_go {
            changes.push(state.adjust_balance(player, self.config.rules.go_salary)?);
        }
        self.persist(game, &changes).await?;
        debug!(%game, %player, steps, from, to, passed_go, "Moved");
        Ok(Movement { from, to, passed_go })
    }

    /// Credit the configured salary for passing Go.
    pub async fn pay_salary(&self, game: GameId, player: PlayerId) -> Result<()> {
        let salary = self.config.rules.go_salary;
        self.persist(game, &[StateChange::Balance { player, delta: salary }])
            .await
    }

    // -----------------------------------------------------------------------
    // Liquidation and bankruptcy
    // -----------------------------------------------------------------------

    /// Plan disposals for a player's current deficit without applying them.
    pub async fn plan_liquidation(&self, game: GameId, player: PlayerId) -> Result<LiquidationPlan> {
        let state = self.snapshot(game).await?;
        let shortfall = -state.player(player)?.balance;
        Ok(self.planner.plan(&state, player, shortfall)?)
    }

    pub async fn resolve_bankruptcy(
        &self,
        game: GameId,
        player: PlayerId,
        creditor_property: Option<PropertyId>,
    ) -> Result<BankruptcyReport> {
        let mut state = self.snapshot(game).await?;
        let report = self
            .resolver
            .resolve(&mut state, player, creditor_property)
            .with_context(|| format!("Bankruptcy resolution failed for {player} in game {game}"))?;
        self.persist(game, &report.changes).await?;
        info!(
            %game,
            %player,
            outcome = ?report.outcome,
            applied = report.actions_applied,
            failed = report.failures.len(),
            "Bankruptcy resolved"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Trades
    // -----------------------------------------------------------------------

    pub async fn propose_trade(
        &self,
        game: GameId,
        proposer: PlayerId,
        target: PlayerId,
        terms: TradeTerms,
    ) -> Result<TradeRequest> {
        let state = self.snapshot(game).await?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let trade = Negotiation::propose(&state, proposer, target, terms, sequence)?;
        self.trades
            .create_trade(&trade)
            .await
            .with_context(|| format!("Failed to store trade {}", trade.id))?;
        Ok(trade)
    }

    /// Apply a response from `actor`. A failed accept is still written back
    /// so the stored record shows the trade reverted to `Pending`.
    pub async fn respond_to_trade(
        &self,
        trade_id: TradeId,
        actor: PlayerId,
        response: TradeResponse,
    ) -> Result<TradeRequest> {
        let mut trade = self
            .trades
            .get_trade(trade_id)
            .await?
            .ok_or(RepositoryError::TradeNotFound(trade_id))?;
        let original = trade.clone();
        let mut state = self.snapshot(trade.game_id).await?;

        let result = match response {
            TradeResponse::Accept => Negotiation::accept(&mut trade, actor, &mut state),
            TradeResponse::Decline => Negotiation::decline(&mut trade, actor).map(|_| Vec::new()),
            TradeResponse::Counter(terms) => {
                Negotiation::counter(&mut trade, actor, terms, &state).map(|_| Vec::new())
            }
        };

        match result {
            Ok(changes) => {
                self.commit(&original, &trade, &changes).await?;
                Ok(trade)
            }
            Err(e) => {
                if trade.version != original.version {
                    self.commit(&original, &trade, &[]).await?;
                }
                Err(e.into())
            }
        }
    }

    /// Let every live automated player answer the trades waiting on them.
    pub async fn run_automated_responses<R: Rng + Send + ?Sized>(
        &self,
        game: GameId,
        rng: &mut R,
    ) -> Result<Vec<AutomatedResponse>> {
        let mut state = self.snapshot(game).await?;
        let responders: Vec<PlayerId> = state
            .players()
            .filter(|p| p.automated && p.is_live())
            .map(|p| p.id)
            .collect();

        let mut responses = Vec::new();
        for responder in responders {
            for mut trade in self.trades.list_pending(game, responder).await? {
                let original = trade.clone();
                match self.trader.act(&mut trade, &mut state, rng) {
                    Ok((decision, changes)) => {
                        self.commit(&original, &trade, &changes).await?;
                        responses.push(AutomatedResponse {
                            trade: trade.id,
                            responder,
                            decision,
                        });
                    }
                    Err(e) => {
                        warn!(trade = %trade.id, %responder, error = %e, "Automated response failed");
                        if trade.version != original.version {
                            self.commit(&original, &trade, &[]).await?;
                        }
                    }
                }
            }
        }
        Ok(responses)
    }

    /// Write the trade transition first so a stale response is rejected
    /// before any of its changes reach the game records. If the changes then
    /// fail to land, the trade record is put back the way it was loaded,
    /// under a fresh version.
    async fn commit(&self, original: &TradeRequest, trade: &TradeRequest, changes: &[StateChange]) -> Result<()> {
        self.trades
            .update_trade_status(trade.id, trade.status, TradeFields::from(trade), original.version)
            .await
            .with_context(|| format!("Failed to update trade {}", trade.id))?;

        let Err(e) = self.persist(trade.game_id, changes).await else {
            return Ok(());
        };

        let mut restored = original.clone();
        restored.version = trade.version;
        restored.touch();
        match self
            .trades
            .update_trade_status(restored.id, restored.status, TradeFields::from(&restored), trade.version)
            .await
        {
            Ok(()) => warn!(trade = %trade.id, status = %restored.status, "Trade changes failed to persist, transition undone"),
            Err(undo) => error!(trade = %trade.id, error = %undo, "Failed to undo trade transition"),
        }
        Err(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
