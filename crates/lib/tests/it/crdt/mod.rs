//! CRDT integration tests
//!
//! Tests are organized by model, plus wire-format and property tests that cut
//! across all of them.

mod entity_tests;
mod helpers;
mod property_tests;
