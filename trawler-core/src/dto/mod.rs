//! Data transfer objects
//!
//! Wire types exchanged with the coordinator API and broadcast to the
//! admin dashboard over the realtime transport.

pub mod broadcast;
pub mod job;
pub mod runner;
