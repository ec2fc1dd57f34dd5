//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section and key is optional: anything left out falls back to the
//! defaults below, so an empty file is a valid configuration.

use anyhow::{ensure, Context, Result};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::types::Property;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub rules: RulesConfig,
    pub ai: AiConfig,
    pub simulation: SimulationConfig,
}

// ---------------------------------------------------------------------------
// Game rules
// ---------------------------------------------------------------------------

/// House rules that change how much development and mortgages cost.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RulesConfig {
    /// Cash each player starts the game with.
    pub starting_balance: i64,
    /// Salary collected when passing Go.
    pub go_salary: i64,
    /// Hotel price as a multiple of the house cost. Boards disagree on
    /// this, so it is configuration rather than a constant.
    pub hotel_cost_multiplier: i64,
    /// Surcharge on the mortgage value when lifting a mortgage (0.10 = 10%).
    pub unmortgage_interest: Decimal,
}

impl RulesConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.hotel_cost_multiplier >= 1,
            "rules.hotel_cost_multiplier must be at least 1, got {}",
            self.hotel_cost_multiplier
        );
        ensure!(
            self.unmortgage_interest >= Decimal::ZERO,
            "rules.unmortgage_interest must not be negative, got {}",
            self.unmortgage_interest
        );
        Ok(())
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1500,
            go_salary: 200,
            hotel_cost_multiplier: 1,
            unmortgage_interest: dec!(0.10),
        }
    }
}

impl RulesConfig {
    /// Price of the fifth development increment (four houses to a hotel).
    pub fn hotel_cost(&self, property: &Property) -> i64 {
        property.house_cost * self.hotel_cost_multiplier
    }

    /// Cash needed to lift the mortgage on `property`, rounded up.
    pub fn unmortgage_cost(&self, property: &Property) -> i64 {
        let base = Decimal::from(property.mortgage_value());
        (base * (Decimal::ONE + self.unmortgage_interest))
            .ceil()
            .to_i64()
            .unwrap_or(i64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Automated participants
// ---------------------------------------------------------------------------

/// Tuning for automated trade decisions.
///
/// Scores are `(value given) - (value received)` from the deciding player's
/// point of view, so lower is better for the AI.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AiConfig {
    /// At or below this score the AI always accepts.
    pub accept_threshold: i64,
    /// Above this score the AI always declines.
    pub decline_threshold: i64,
    /// Acceptance probability just below the decline threshold.
    pub min_accept_probability: f64,
    /// Acceptance probability just above the accept threshold.
    pub max_accept_probability: f64,
    /// Whether a failed roll in the middle band produces a counter-offer.
    pub counter_enabled: bool,
    /// Counters allowed on a single trade before the AI stops haggling.
    pub max_counters: u32,
    /// Multiple of the assessed value offered when buying out a group.
    pub acquisition_premium: Decimal,
    /// Cash the AI keeps in hand after buying, building or trading.
    pub cash_reserve: i64,
}

impl AiConfig {
    fn validate(&self) -> Result<()> {
        for (key, p) in [
            ("min_accept_probability", self.min_accept_probability),
            ("max_accept_probability", self.max_accept_probability),
        ] {
            ensure!(
                p.is_finite() && (0.0..=1.0).contains(&p),
                "ai.{key} must be a probability in [0, 1], got {p}"
            );
        }
        ensure!(
            self.min_accept_probability <= self.max_accept_probability,
            "ai.min_accept_probability ({}) exceeds ai.max_accept_probability ({})",
            self.min_accept_probability,
            self.max_accept_probability
        );
        ensure!(
            self.decline_threshold >= self.accept_threshold,
            "ai.decline_threshold ({}) is below ai.accept_threshold ({})",
            self.decline_threshold,
            self.accept_threshold
        );
        ensure!(
            self.acquisition_premium >= Decimal::ZERO,
            "ai.acquisition_premium must not be negative, got {}",
            self.acquisition_premium
        );
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            accept_threshold: -20,
            decline_threshold: 100,
            min_accept_probability: 0.05,
            max_accept_probability: 0.75,
            counter_enabled: true,
            max_counters: 2,
            acquisition_premium: dec!(1.25),
            cash_reserve: 150,
        }
    }
}

// ---------------------------------------------------------------------------
// Self-play simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub players: usize,
    pub max_rounds: u32,
    pub seed: u64,
    pub max_builds_per_turn: usize,
    /// JSON board file; the classic board is used when unset.
    pub board_path: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            players: 4,
            max_rounds: 300,
            seed: 7,
            max_builds_per_turn: 3,
            board_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text and check it is usable.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the rules or the automated players cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.rules.validate()?;
        self.ai.validate()?;
        Ok(())
    }
}
