//! # cartlink - THE BINARY
//!
//! Library surface of the cartlink application, exposed so integration
//! tests can build the router and clients without spawning the binary.

pub mod api;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod push;
pub mod sync;
