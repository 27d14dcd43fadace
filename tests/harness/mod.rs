// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for the pingback receiver.
//!
//! Provides an in-process blog (post catalog, pingback store and a fake
//! web of source pages) plus generators and outcome tallies for flood
//! simulations.

#![allow(dead_code)]

pub mod blog;
pub mod generators;
pub mod metrics;
