//! Global error handling.
//!
//! The codec crate defines its own error type, which is unified here with
//! the errors of the command line tools when winding results at the
//! top-level.
//!
//! ```rust
//! use resworks::prelude::*;
//!
//! fn load() -> RwResult<()> { // can return a RwError
//!     let _table = resworks::resources::decode_table(&[])?; // can return a ResourcesError
//!     Ok(())
//! }
//! # fn main() { assert!(load().is_err()); }
//! ```

use rw_resources::errors::ResourcesError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`RwError`].
pub type RwResult<T> = Result<T, RwError>;

/// The main error type for error winding at the top-level.
#[derive(Debug, Error)]
pub enum RwError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error(transparent)]
    IO(#[from] io::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error that can be returned from [`rw_resources`] functions.
    #[error(transparent)]
    Resources(#[from] ResourcesError),
}
