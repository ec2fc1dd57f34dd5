//! Economy core: valuation, development rules, liquidation and bankruptcy.
//!
//! Everything here is synchronous and operates on an in-memory
//! [`GameState`](crate::types::GameState). Mutating operations return the
//! [`StateChange`](crate::types::StateChange)s they applied so the caller can
//! persist them.

pub mod bankruptcy;
pub mod development;
pub mod liquidation;
pub mod valuation;

pub use bankruptcy::{BankruptcyReport, BankruptcyResolver, Solvency};
pub use development::{DevelopmentAction, DevelopmentRules};
pub use liquidation::{LiquidationPlan, LiquidationPlanner};
pub use valuation::Liquidity;
