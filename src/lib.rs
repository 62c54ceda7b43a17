// src/lib.rs

//! Flight-deal watcher library.
//!
//! Discovers offers on a deal site, resolves them into structured records,
//! filters them and forwards new or changed ones to a chat transport.

pub mod dom;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
