//! Property-based tests

mod presence_proptest;
mod registry_proptest;
