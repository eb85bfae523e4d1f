//! Tessera CMS Kernel Library
//!
//! Content type system, polymorphic form binding and permalink routing.
//! The main entry point for running the server is the `tessera` binary.

pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod error;
pub mod permalink;
pub mod routes;
pub mod store;
