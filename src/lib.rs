//! Monopoly economy engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the simulator binary.

pub mod config;
pub mod types;
pub mod economy;
pub mod trade;
pub mod repository;
pub mod engine;
pub mod storage;
