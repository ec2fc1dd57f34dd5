//! Trade evaluation, negotiation and the automated trade participant.

pub mod automated;
pub mod evaluator;
pub mod negotiation;

pub use automated::{AutomatedTrader, Decision, Verdict};
pub use evaluator::{DecisionPolicy, ScoreBand, TradeEvaluator};
pub use negotiation::Negotiation;
