//! Bitwarden CLI metadata-store provider.
//!
//! Implements the `MetadataStore` trait by driving the `bw` binary.  Only
//! two of each item's fields are ever read (`HostName` and `User`, on
//! SSH-key items); everything else in the vault stays opaque to this crate.

mod cli;
mod error;

pub use cli::BwCli;
pub use error::BwError;
