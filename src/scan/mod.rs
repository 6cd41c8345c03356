//! The scan control loop.
//!
//! ```text
//!  Idle ──start──▶ Acquiring ──Playing──▶ Waiting ──timer──▶ Decoding
//!   ▲                  │                     ▲                  │
//!   │             acquisition                └──── retry ◀──────┤
//!   │                failed                                     │
//!   └──────────── reset / halt / stream ended ◀─────────────────┘
//! ```
//!
//! [`ScanLoop`] is the public handle; each session runs as one task that
//! owns the stream, the capture buffer and the single pending timer.
//! Retry decisions come from [`RetryPolicy::decide`], a pure table over
//! outcome tags.

mod config;
mod error;
mod policy;
mod scanner;
mod session;
mod state;

pub use config::{ConfigError, FileConfig, OutputConfig, ScanConfig, SourceConfig};
pub use error::{ErrorSink, LogSink, ScanError};
pub use policy::{Decision, RetryPolicy};
pub use scanner::ScanLoop;
pub use state::ScanState;
