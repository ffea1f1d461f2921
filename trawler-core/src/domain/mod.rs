//! Core domain types
//!
//! This module contains the core domain structures used across Trawler crates.
//! These types represent the fundamental business entities and are shared between
//! the coordinator client (for transport) and the runner (for execution).

pub mod job;
pub mod log;
pub mod runner;
