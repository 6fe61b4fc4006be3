//! Types shared between oxmon collectors and the reporting agent.

pub mod types;
