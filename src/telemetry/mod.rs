// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing infrastructure.
//!
//! Structured logging for server startup, discovery, routing and turns.
//!
//! # Usage
//!
//! Initialize telemetry at application startup:
//!
//! ```rust,ignore
//! use mcp_chatbot::telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::for_verbosity(cli.verbose))?;
//! ```
//!
//! Log with fields, not interpolated strings, where the value is data:
//!
//! ```rust,ignore
//! tracing::info!(server = %name, tools = n, "Discovered capabilities");
//! ```
//!
//! `RUST_LOG` overrides the preset level, e.g. `RUST_LOG=mcp_chatbot::mcp=debug`.

mod init;

pub use init::{init_telemetry, TelemetryConfig};
