//! Domain types with no I/O.
//!
//! # Modules
//!
//! - [`connection`] – [`ConnectionId`], the opaque identity of one client
//!   session, unique for the lifetime of that session.

pub mod connection;

pub use connection::ConnectionId;
