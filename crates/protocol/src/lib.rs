//! Wire types for the dwitter backend.
//!
//! This crate contains the serde-serializable types exchanged with the
//! dwitter server, both over the HTTP API and over the live socket. These
//! types represent the "protocol layer" - the shapes of data as they appear
//! on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with the server: field names follow the server's camelCase JSON
//! * Stable: Changes only when the wire format changes
//!
//! Session handling, retry and classification logic live in `dwitter-rs`.

pub mod auth;
pub mod socket;
pub mod tweet;

pub use auth::*;
pub use socket::*;
pub use tweet::*;
