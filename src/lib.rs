//! Itinerary sync - journey reconciliation and state event sync core
//!
//! This crate provides the matching, merging and synchronization logic behind
//! the `itin` CLI tool.
//!
//! # Architecture
//!
//! - [`model`] - Public transport value types and the merge engine
//! - [`matcher`] - Name, route and trip identity checks
//! - [`sync`] - State event codec and the inbound/outbound queues
//! - [`config`] - Configuration management
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod model;
pub mod sync;

pub use error::{Error, Result};
