//! # wirebridge
//!
//! The server side of the command bridge: it owns the live document on a
//! single host loop and serves newline-delimited commands over a local
//! socket.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                   apps/wirebridge (THE BINARY)                │
//! │                                                               │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐    │
//! │  │  transport  │──►│ host (queue) │──►│    dispatch      │    │
//! │  │ (tokio UDS) │   │  one thread  │   │ (tracing, panic  │    │
//! │  └─────────────┘   └──────────────┘   │   containment)   │    │
//! │         ▲                             └────────┬─────────┘    │
//! │  ┌──────┴──────┐                               ▼              │
//! │  │  cli/config │                      ┌────────────────┐      │
//! │  │ (clap/toml) │                      │ wirebridge-core│      │
//! │  └─────────────┘                      │  (THE LOGIC)   │      │
//! │                                       └────────────────┘      │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod host;
pub mod transport;
