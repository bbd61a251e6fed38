//! # airvoice-core
//!
//! Foundation types and utilities shared by the airvoice client crates:
//!
//! - **Retry**: [`retry::RetryConfig`] and backoff calculation
//! - **Messages**: [`events::Message`] — the aggregated, append-only
//!   conversation log vocabulary, plus the streaming-reply fragment types
//! - **Logging**: [`logging::init_subscriber`] for `tracing` setup
//! - **Text**: UTF-8-safe truncation for log previews
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `airvoice-sse`.

#![deny(unsafe_code)]

pub mod events;
pub mod logging;
pub mod retry;
pub mod text;
