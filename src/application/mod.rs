//! Application layer containing the settlement orchestration.
//!
//! This module defines the `SettlementEngine`, the primary entry point for
//! settling obligations. It owns the storage ports and serializes work on a
//! single obligation with a per-obligation async lock.

pub mod engine;
