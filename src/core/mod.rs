//! # Core Session Logic
//!
//! Parley's business logic. It knows nothing about terminals and talks to
//! the backend only through the `ChatBackend` trait.
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │          CORE            │
//!                    │                          │
//!                    │  • SessionState (data)   │
//!                    │  • Action (events)       │
//!                    │  • update() (reducer)    │
//!                    │  • SessionController     │
//!                    └────────────┬─────────────┘
//!                                 │
//!                 ┌───────────────┴───────────────┐
//!                 ▼                               ▼
//!          ┌────────────┐                  ┌────────────┐
//!          │    REPL    │                  │    API     │
//!          │  Adapter   │                  │  (reqwest) │
//!          └────────────┘                  └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: `SessionState`, everything a view renders
//! - [`action`]: `Action`, `Effect` and the pure `update()` reducer
//! - [`attachments`]: content-type allow-list and the pending attachment set
//! - [`conversation`]: turns and request payload construction
//! - [`session`]: the controller that runs effects and publishes state
//! - [`config`]: layered configuration

pub mod action;
pub mod attachments;
pub mod config;
pub mod conversation;
pub mod session;
pub mod state;
