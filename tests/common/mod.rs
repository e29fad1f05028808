//! Shared fixtures for the integration tests: scripted processors and factories, item
//! sources that fail on demand, an event log for listener assertions and proptest
//! strategies.
#![allow(dead_code)]

pub mod mock_processor;
pub mod strategies;

pub use mock_processor::*;
pub use strategies::*;
