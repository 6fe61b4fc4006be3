//! oxmon metrics agent.
//!
//! Pollers feed samples from the collectors into a [`registry::BufferRegistry`]
//! of per-metric accumulators. A [`reporter::Reporter`] periodically stages
//! every accumulator, hands the snapshots to a
//! [`executor::DeliveryExecutor`], then commits what was delivered and rolls
//! back the rest so no sample is lost or counted twice.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod executor;
pub mod poller;
pub mod registry;
pub mod reporter;
pub mod retry;
pub mod sender;
