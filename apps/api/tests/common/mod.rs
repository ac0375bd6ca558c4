//! Common test utilities for API integration tests
//!
//! This module provides shared test infrastructure for integration tests,
//! including an in-memory conversation store, app builders and SSE helpers.

#![allow(unused_imports)]

pub mod fixtures;
pub mod helpers;
pub mod memory_repo;

pub use fixtures::*;
pub use helpers::*;
pub use memory_repo::MemoryConversationRepository;
