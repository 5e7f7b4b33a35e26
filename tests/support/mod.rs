//! Shared utilities for integration tests: mock origins.

#![allow(dead_code)]

pub mod range_server;
pub mod trickle_server;
