//! Plugin-oriented package registry server.
//!
//! Everything that touches a package — authentication, storage, the
//! database, validation, caching, and every HTTP route — is supplied by
//! plugins. This crate is the composition layer that loads them, orders
//! them, wires them into an HTTP middleware chain, and streams their
//! responses back to clients.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │               REGISTRY HOST                  │
//!                    │                                              │
//!  Client Request    │  ┌────────┐   ┌────────────┐   ┌─────────┐  │
//!  ──────────────────┼─▶│  http  │──▶│ middleware │──▶│ plugins │  │
//!                    │  │ server │   │   chain    │   │ (yours) │  │
//!                    │  └────────┘   └────────────┘   └────┬────┘  │
//!                    │       ▲                             │       │
//!  Client Response   │       │        ┌──────────┐         │       │
//!  ◀─────────────────┼───────┴────────│ response │◀────────┘       │
//!                    │                │  stages  │                 │
//!                    │                └──────────┘                 │
//!                    │                                             │
//!                    │  ┌───────────────────────────────────────┐  │
//!                    │  │         Cross-Cutting Concerns        │  │
//!                    │  │  ┌────────┐ ┌──────┐ ┌─────────────┐  │  │
//!                    │  │  │ config │ │ auth │ │  bootstrap  │  │  │
//!                    │  │  └────────┘ └──────┘ └─────────────┘  │  │
//!                    │  │  ┌─────────┐ ┌─────────────────────┐  │  │
//!                    │  │  │ routing │ │   observability     │  │  │
//!                    │  │  └─────────┘ └─────────────────────┘  │  │
//!                    │  └───────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Plugin machinery
pub mod auth;
pub mod bootstrap;
pub mod middleware;
pub mod plugins;

// Cross-cutting concerns
pub mod observability;

pub use bootstrap::{boot, BootedRegistry, PluginSet};
pub use config::RegistryConfig;
pub use http::RegistryServer;
