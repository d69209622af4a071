//! Errors for the few fallible entry points of the crate.
//!
//! Touch handling and composition never fail; only loading configuration and
//! key catalogs from disk can.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("cannot serialize TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid dictionary: {0}")]
    Dictionary(#[from] fst::Error),
}
