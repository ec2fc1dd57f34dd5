//! Seeded self-play.
//!
//! Seats automated players on a board and plays turns through the
//! [`EconomyService`]: roll, move, buy or pay rent, resolve bankruptcy,
//! develop, then trade. Dice and trade decisions draw from one injected
//! random source, so a seed reproduces a game exactly.

use anyhow::Result;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::economy::DevelopmentAction;
use crate::engine::service::{ActionOutcome, EconomyService};
use crate::repository::{InMemoryGameStore, InMemoryTradeStore, TradeRepository};
use crate::trade::Verdict;
use crate::types::{Board, GameId, GameState, Owner, Player, PlayerId, PropertyId};

/// Summary of one simulated game.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub rounds: u32,
    pub winner: Option<PlayerId>,
    /// Players in the order they went bankrupt.
    pub eliminated: Vec<PlayerId>,
    pub properties_purchased: u32,
    pub houses_built: u32,
    pub mortgages_lifted: u32,
    pub rent_paid: i64,
    /// Deficits liquidated back to solvency.
    pub recoveries: u32,
    pub trades_proposed: u32,
    pub trades_accepted: u32,
    pub trades_declined: u32,
    pub trades_countered: u32,
    pub final_balances: Vec<(PlayerId, i64)>,
}

pub struct Simulation {
    service: EconomyService,
    trades: Arc<InMemoryTradeStore>,
    game: GameId,
    players: usize,
    max_rounds: u32,
    max_builds_per_turn: usize,
}

impl Simulation {
    /// Seat `config.simulation.players` automated players on `board`.
    pub async fn new(board: Arc<Board>, config: AppConfig) -> Self {
        let players: Vec<Player> = (0..config.simulation.players)
            .map(|i| {
                Player::automated(
                    PlayerId(i as u32 + 1),
                    &format!("Bot {}", i + 1),
                    config.rules.starting_balance,
                    i as u32,
                )
            })
            .collect();
        let state = GameState::new(GameId::new(), Arc::clone(&board), players);

        let games = Arc::new(InMemoryGameStore::new());
        games.insert_game(&state).await;
        let trades = Arc::new(InMemoryTradeStore::new());

        let sim = &config.simulation;
        Self {
            game: state.game_id,
            players: sim.players,
            max_rounds: sim.max_rounds,
            max_builds_per_turn: sim.max_builds_per_turn,
            service: EconomyService::new(board, config.clone(), games, trades.clone()),
            trades,
        }
    }

    pub fn game(&self) -> GameId {
        self.game
    }

    pub fn service(&self) -> &EconomyService {
        &self.service
    }

    /// Play until one player remains or the round limit is reached.
    pub async fn run<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> Result<SimulationReport> {
        let mut report = SimulationReport::default();

        info!(game = %self.game, players = self.players, max_rounds = self.max_rounds, "Simulation starting");

        for round in 1..=self.max_rounds {
            let order = self.service.snapshot(self.game).await?.turn_order();
            if order.len() <= 1 {
                break;
            }
            report.rounds = round;

            for player in order {
                if !self.service.snapshot(self.game).await?.player(player)?.is_live() {
                    continue;
                }
                self.take_turn(player, rng, &mut report).await?;
            }

            for response in self.service.run_automated_responses(self.game, rng).await? {
                match response.decision.verdict {
                    Verdict::Accept => report.trades_accepted += 1,
                    Verdict::Decline => report.trades_declined += 1,
                    Verdict::Counter(_) => report.trades_countered += 1,
                }
            }
        }

        let state = self.service.snapshot(self.game).await?;
        let live = state.turn_order();
        report.winner = match live.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        report.final_balances = state.players().map(|p| (p.id, p.balance)).collect();

        info!(
            game = %self.game,
            rounds = report.rounds,
            winner = ?report.winner,
            eliminated = report.eliminated.len(),
            houses = report.houses_built,
            trades_accepted = report.trades_accepted,
            "Simulation finished"
        );
        Ok(report)
    }

    async fn take_turn<R: Rng + Send + ?Sized>(
        &self,
        player: PlayerId,
        rng: &mut R,
        report: &mut SimulationReport,
    ) -> Result<()> {
        let roll: u8 = rng.gen_range(1..=6) + rng.gen_range(1..=6);
        let to = self.service.advance(self.game, player, roll).await?.to;

        let state = self.service.snapshot(self.game).await?;
        if let Some(property) = state.board().at_position(to) {
            let id = property.id;
            match state.ownership(id)?.owner {
                Owner::Bank => {
                    let balance = state.player(player)?.balance;
                    let reserve = self.service.config().ai.cash_reserve;
                    if balance - property.price >= reserve
                        && self.service.purchase(self.game, player, id).await?.is_applied()
                    {
                        report.properties_purchased += 1;
                    }
                }
                Owner::Player(owner) if owner != player => {
                    if self.pay_rent(player, id, report).await? {
                        return Ok(());
                    }
                }
                Owner::Player(_) => {}
            }
        }

        self.improve(player, report).await?;
        self.seek_acquisition(player, report).await
    }

    /// Charge rent and resolve any deficit. Returns true if the player was
    /// eliminated.
    async fn pay_rent(&self, player: PlayerId, property: PropertyId, report: &mut SimulationReport) -> Result<bool> {
        report.rent_paid += self.service.charge_rent(self.game, player, property).await?;

        let balance = self.service.snapshot(self.game).await?.player(player)?.balance;
        if balance >= 0 {
            return Ok(false);
        }

        let resolution = self
            .service
            .resolve_bankruptcy(self.game, player, Some(property))
            .await?;
        if resolution.is_eliminated() {
            report.eliminated.push(player);
            Ok(true)
        } else {
            report.recoveries += 1;
            Ok(false)
        }
    }

    /// Lift mortgages when flush, then build evenly on completed groups,
    /// always keeping the cash reserve.
    async fn improve(&self, player: PlayerId, report: &mut SimulationReport) -> Result<()> {
        let reserve = self.service.config().ai.cash_reserve;
        let rules = self.service.rules();

        let state = self.service.snapshot(self.game).await?;
        for id in state.holdings(player) {
            let state = self.service.snapshot(self.game).await?;
            let balance = state.player(player)?.balance;
            let Ok(cost) = rules.check_unmortgage(&state, player, id) else {
                continue;
            };
            if balance - cost >= reserve * 2 {
                let outcome = self
                    .service
                    .develop(self.game, player, DevelopmentAction::Unmortgage(id))
                    .await?;
                if outcome.is_applied() {
                    report.mortgages_lifted += 1;
                }
            }
        }

        for _ in 0..self.max_builds_per_turn {
            let state = self.service.snapshot(self.game).await?;
            let balance = state.player(player)?.balance;
            let target = state.holdings(player).into_iter().find(|id| {
                rules
                    .check_build(&state, player, *id)
                    .is_ok_and(|cost| balance - cost >= reserve)
            });
            let Some(id) = target else {
                break;
            };
            match self
                .service
                .develop(self.game, player, DevelopmentAction::Build(id))
                .await?
            {
                ActionOutcome::Applied(_) => report.houses_built += 1,
                ActionOutcome::Rejected(_) => break,
            }
        }
        Ok(())
    }

    /// Offer to buy the missing members of a group, unless an offer to the
    /// same seller is already open.
    async fn seek_acquisition(&self, player: PlayerId, report: &mut SimulationReport) -> Result<()> {
        let state = self.service.snapshot(self.game).await?;
        let Some((seller, terms)) = self.service.trader().propose_acquisition(&state, player)? else {
            return Ok(());
        };

        let open = self.trades.list_pending(self.game, seller).await?;
        if open.iter().any(|t| t.proposer == player) {
            return Ok(());
        }

        match self.service.propose_trade(self.game, player, seller, terms).await {
            Ok(trade) => {
                report.trades_proposed += 1;
                debug!(trade = %trade.id, %player, %seller, "Acquisition proposed");
            }
            Err(e) => debug!(%player, %seller, error = %e, "Acquisition offer rejected"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
