//! Stratus Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ResourceRecord`, `CloudItem`, `AccountDescriptor`, `RecycleRecord`
//! - **Port definitions** - Traits for adapters: `ICloudGateway`, `IResourceStore`,
//!   `IAccountStore`, `IRecycleStore`, `ILeaderGate`, `IRecycleWorker`
//! - **Configuration** - YAML-backed [`config::Config`] with validation
//!
//! # Architecture
//!
//! The domain module contains pure data types and state rules with no I/O.
//! Ports define trait interfaces that adapter crates (`stratus-cache`,
//! `stratus-gateway`) implement and that `stratus-sync` consumes.

pub mod config;
pub mod domain;
pub mod ports;
