//! Integration tests over the public API with in-memory stores.

mod bankruptcy_flow;
mod fixtures;
mod simulation;
mod trade_flow;
