//! Provisions DKIM keys for the mail domains of a server and keeps the
//! OpenDKIM `KeyTable`, `SigningTable` and `TrustedHosts` files in step.

pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod provision;
pub mod resolver;
pub mod storage;
pub mod utils;
