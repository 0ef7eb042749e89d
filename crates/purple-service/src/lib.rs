//! Request coordination and backend services for Purple Music.
//!
//! The [`coordination`] module provides the [`RequestCoordinator`](coordination::RequestCoordinator),
//! which deduplicates concurrent backend calls and caches their results for a short time. The
//! [`services`] module builds the consumers of the Purple Music backend on top of it.

#[macro_use]
pub mod metrics;

pub mod backend;
pub mod config;
pub mod coordination;
pub mod logging;
pub mod services;
pub mod types;
pub mod utils;
