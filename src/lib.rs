// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Pingback Receiver
//!
//! This crate accepts inbound pingback notifications (XML-RPC
//! `pingback.ping`) for a blog and decides whether to record them:
//!
//! - XML-RPC decoding with DTDs refused
//! - Per-IP and per-source rate limiting (fault 49)
//! - Self-ping blocking
//! - Target post resolution (faults 32/33)
//! - Duplicate detection backed by a unique (source, target) store index
//! - Source fetch under a timeout and exact link verification (faults 16/17)
//! - Recording with a caller-supplied success callback

pub mod config;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod limiter;
pub mod links;
pub mod metrics;
pub mod models;
pub mod recorder;
pub mod service;
pub mod store;
pub mod validator;
pub mod xmlrpc;

pub use config::Config;
pub use error::{FaultCode, PingbackError};
pub use models::{PingbackRecord, PingbackRequest, PingbackResponse, Post};
pub use recorder::{NoopCallback, PingSuccessCallback};
pub use service::{Collaborators, InboundPing, PingbackService};
pub use validator::{PingbackValidator, ValidationResult};
