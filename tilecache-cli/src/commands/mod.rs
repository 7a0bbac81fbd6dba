//! CLI command implementations.
//!
//! - [`serve`] - Run the tile server
//! - [`warm`] - Bulk-warm the cache with a progress bar
//! - [`purge`] - Remove one cached tile
//! - [`config`] - Show the effective configuration

pub mod common;
pub mod config;
pub mod purge;
pub mod serve;
pub mod warm;
