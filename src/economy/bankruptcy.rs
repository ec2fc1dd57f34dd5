//! Bankruptcy resolution.
//!
//! Drives a player in deficit to either `Solvent` or `Eliminated`:
//!
//! ```text
//! Solvent -> Liquidating -> { Solvent, Eliminated }
//! ```
//!
//! Planned disposals are applied one at a time because later steps depend
//! on earlier ones (a groupmate's house may have to go before the next sale
//! is legal). A step that fails is logged, recorded and skipped: partial
//! liquidation beats none. If the deficit survives every available action
//! the player is eliminated and their remaining holdings pass to the
//! creditor, or back to the bank.
//!
//! A player creditor has already been credited the rent on
//! `creditor_property` by the caller. Whatever part of that rent the
//! debtor could not raise is charged back to the creditor, so elimination
//! never creates cash. Deficit beyond the rent is owed to the bank and is
//! written off.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RulesConfig;
use crate::economy::development::{DevelopmentAction, DevelopmentRules};
use crate::economy::liquidation::{LiquidationPlan, LiquidationPlanner};
use crate::economy::valuation::rent_due;
use crate::types::{
    EconomyError, EconomyResult, GameState, Owner, PlayerId, PropertyId, PropertyOwnership,
    StateChange,
};

/// Re-planning rounds allowed after a round that made progress.
const MAX_PLANNING_ROUNDS: usize = 8;

/// Final state of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Solvency {
    Solvent,
    Eliminated { creditor: Owner },
}

/// A step of the resolution that could not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStep {
    Liquidate(DevelopmentAction),
    Transfer(PropertyId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: ResolutionStep,
    pub error: EconomyError,
}

/// Outcome of driving one player through bankruptcy.
#[derive(Debug, Clone)]
pub struct BankruptcyReport {
    pub player: PlayerId,
    pub initial_shortfall: i64,
    pub outcome: Solvency,
    pub actions_attempted: usize,
    pub actions_applied: usize,
    pub failures: Vec<StepFailure>,
    /// Properties handed to the creditor or returned to the bank.
    pub transferred: Vec<PropertyId>,
    /// Unpaid rent charged back to a player creditor on elimination.
    pub charged_to_creditor: i64,
    /// Residual debt forgiven by the bank on elimination.
    pub written_off: i64,
    /// Every change applied, in order.
    pub changes: Vec<StateChange>,
}

impl BankruptcyReport {
    fn new(player: PlayerId, initial_shortfall: i64) -> Self {
        Self {
            player,
            initial_shortfall,
            outcome: Solvency::Solvent,
            actions_attempted: 0,
            actions_applied: 0,
            failures: Vec::new(),
            transferred: Vec::new(),
            charged_to_creditor: 0,
            written_off: 0,
            changes: Vec::new(),
        }
    }

    pub fn is_eliminated(&self) -> bool {
        matches!(self.outcome, Solvency::Eliminated { .. })
    }
}

pub struct BankruptcyResolver {
    planner: LiquidationPlanner,
    engine: DevelopmentRules,
}

impl BankruptcyResolver {
    pub fn new(config: RulesConfig) -> Self {
        Self {
            planner: LiquidationPlanner::new(config.clone()),
            engine: DevelopmentRules::new(config),
        }
    }

    /// Resolve `player`'s deficit, if any.
    ///
    /// `creditor_property` is the property whose owner is owed, resolved once
    /// by the caller at the moment of insolvency (`None` for bank debts such
    /// as taxes).
    pub fn resolve(
        &self,
        state: &mut GameState,
        player: PlayerId,
        creditor_property: Option<PropertyId>,
    ) -> EconomyResult<BankruptcyReport> {
        let shortfall = -state.player(player)?.balance;
        let plan = self.planner.plan(state, player, shortfall)?;
        self.resolve_with_plan(state, player, plan, creditor_property)
    }

    /// Resolve starting from a plan computed earlier, for instance one that
    /// was shown to a human player before they confirmed it. Steps made
    /// stale by intervening changes fail individually and are skipped.
    pub fn resolve_with_plan(
        &self,
        state: &mut GameState,
        player: PlayerId,
        plan: LiquidationPlan,
        creditor_property: Option<PropertyId>,
    ) -> EconomyResult<BankruptcyReport> {
        let balance = state.player(player)?.balance;
        let mut report = BankruptcyReport::new(player, (-balance).max(0));
        if balance >= 0 {
            return Ok(report);
        }
        // The creditor's claim, priced before liquidation changes anything.
        let claim = self.creditor_claim(state, player, creditor_property)?;

        if let Err(e) = plan.require_covered() {
            info!(%player, error = %e, "Liquidation cannot cover the deficit");
        }

        let mut plan = plan;
        for round in 1..=MAX_PLANNING_ROUNDS {
            if plan.actions.is_empty() {
                break;
            }
            self.apply_plan(state, player, &plan, &mut report)?;
            let balance = state.player(player)?.balance;
            if balance >= 0 {
                break;
            }
            // Skipped steps may have left other disposals available.
            plan = self.planner.plan(state, player, -balance)?;
            info!(%player, round, next_actions = plan.actions.len(), "Re-planning liquidation");
        }

        if state.player(player)?.balance >= 0 {
            info!(
                %player,
                applied = report.actions_applied,
                failed = report.failures.len(),
                "Player liquidated back to solvency"
            );
            report.outcome = Solvency::Solvent;
            return Ok(report);
        }

        let creditor = self.eliminate(state, player, creditor_property, claim, &mut report)?;
        report.outcome = Solvency::Eliminated { creditor };

        if !state.player(player)?.eliminated {
            return Err(EconomyError::InvariantViolation(format!(
                "{player} left in deficit without being eliminated"
            )));
        }
        Ok(report)
    }

    /// Apply each planned action in order until the deficit is gone.
    fn apply_plan(
        &self,
        state: &mut GameState,
        player: PlayerId,
        plan: &LiquidationPlan,
        report: &mut BankruptcyReport,
    ) -> EconomyResult<()> {
        for planned in &plan.actions {
            if state.player(player)?.balance >= 0 {
                break;
            }
            report.actions_attempted += 1;
            match self.engine.apply(state, player, planned.action) {
                Ok(changes) => {
                    report.actions_applied += 1;
                    report.changes.extend(changes);
                }
                Err(error) => {
                    warn!(
                        %player,
                        action = %planned.action,
                        error = %error,
                        "Liquidation step failed, skipping"
                    );
                    report.failures.push(StepFailure {
                        step: ResolutionStep::Liquidate(planned.action),
                        error,
                    });
                }
            }
        }
        Ok(())
    }

    /// The live player owed the debt, or the bank.
    pub fn creditor_for(
        &self,
        state: &GameState,
        debtor: PlayerId,
        creditor_property: Option<PropertyId>,
    ) -> Owner {
        let owner = creditor_property
            .and_then(|id| state.ownership(id).ok())
            .and_then(|o| o.owner.player());
        match owner {
            Some(id) if id != debtor && state.player(id).is_ok_and(|p| p.is_live()) => Owner::Player(id),
            _ => Owner::Bank,
        }
    }

    /// Rent on `creditor_property` owed to a live player creditor, or 0 for
    /// bank debts.
    fn creditor_claim(
        &self,
        state: &GameState,
        debtor: PlayerId,
        creditor_property: Option<PropertyId>,
    ) -> EconomyResult<i64> {
        match (self.creditor_for(state, debtor, creditor_property), creditor_property) {
            (Owner::Player(_), Some(id)) => rent_due(state, id),
            _ => Ok(0),
        }
    }

    fn eliminate(
        &self,
        state: &mut GameState,
        player: PlayerId,
        creditor_property: Option<PropertyId>,
        claim: i64,
        report: &mut BankruptcyReport,
    ) -> EconomyResult<Owner> {
        let creditor = self.creditor_for(state, player, creditor_property);

        for id in state.holdings(player) {
            let result = match creditor {
                Owner::Player(to) => state.update_ownership(id, |o| o.owner = Owner::Player(to)),
                Owner::Bank => state.update_ownership(id, |o| *o = PropertyOwnership::unowned(id)),
            };
            match result {
                Ok(change) => {
                    report.transferred.push(id);
                    report.changes.push(change);
                }
                Err(error) => {
                    warn!(%player, property = %id, error = %error, "Asset transfer failed, skipping");
                    report.failures.push(StepFailure {
                        step: ResolutionStep::Transfer(id),
                        error,
                    });
                }
            }
        }

        // Unpaid rent comes back out of the creditor; the rest is the bank's.
        let residual = state.player(player)?.balance;
        let unpaid = (-residual).clamp(0, claim.max(0));
        if let (Owner::Player(to), true) = (creditor, unpaid > 0) {
            report.changes.push(state.adjust_balance(to, -unpaid)?);
            report.charged_to_creditor = unpaid;
        }
        report.written_off = (-residual - report.charged_to_creditor).max(0);
        if residual != 0 {
            report.changes.push(state.adjust_balance(player, -residual)?);
        }
        report.changes.push(state.eliminate(player)?);

        info!(
            %player,
            %creditor,
            transferred = report.transferred.len(),
            charged_to_creditor = report.charged_to_creditor,
            written_off = report.written_off,
            "Player eliminated"
        );
        Ok(creditor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
