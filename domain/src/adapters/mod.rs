//! Adapters that live inside the domain crate for convenience.
//!
//! Intended for unit testing and local demos. The relational store lives in
//! the `sqlite-adapter` crate.

pub mod memory_repo;
