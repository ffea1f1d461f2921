//! Trawler Core
//!
//! Core types and abstractions for the Trawler scraping system.
//!
//! This crate contains:
//! - Domain types: Core business entities (PendingJob, JobConfig, RunnerIdentity, etc.)
//! - DTOs: Data transfer objects exchanged with the coordinator and the admin dashboard

pub mod domain;
pub mod dto;
