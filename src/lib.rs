//! # `ResWorks`
//!
//! `resworks` is the main crate of the `ResWorks` project, a codec for the
//! compiled resources of Android applications: resource tables
//! (`resources.arsc`) and binary XML documents (`AndroidManifest.xml`,
//! compiled layouts, ...). It re-exports the sub-crates and gathers the most
//! used items in the `resworks::prelude` namespace.
//!
//! ## Library basics
//!
//! Low level decoding and encoding functions live in [`rw_resources`].
//! Decoding then encoding an unmodified structure gives back the input bytes:
//!
//! ```rust
//! use resworks::prelude::*;
//! use resworks::resources;
//!
//! let mut table = ResourceTable::new(true);
//! table.add_package(0x7f, "com.example", &["string"])?;
//! let bytes = resources::encode_table(&table)?;
//! let decoded = resources::decode_table(&bytes)?;
//! assert_eq!(resources::encode_table(&decoded)?, bytes);
//! # Ok::<(), RwError>(())
//! ```
//!
//! A [`Session`] decodes the resource table of an application once, and then
//! turns binary XML documents into editable trees where resource ids are
//! replaced by their symbolic names (and back).
//!
//! ## Sub-crates
//!
//!  - [`rw_resources`] contains the data structures, parsers and writers of
//!    the binary formats, and the identifier resolver,
//!  - [`rw_utils`] contains small helpers the other crates can benefit.

mod errors;
mod session;

pub mod cli;
pub mod rw_roundtrip;
pub mod rw_table;
pub mod rw_xml;

pub use rw_resources as resources;
pub use rw_utils as utils;
pub use session::Session;

/// Reexport module of commonly used structures and functions from `ResWorks`
/// project sub-crates:
///
/// ```rust
/// use resworks::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{RwError, RwResult};
    pub use crate::session::Session;

    pub use rw_resources::{
        config::Config,
        errors::ResourcesError,
        ids::{IdentifierTable, ResId, ResName, ResRef},
        tables::ResourceTable,
        tree::XmlTree,
        values::{ResolvedValue, Value},
        xml::XmlDocument,
    };

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("RW_LOG", "info")
            .write_style("RW_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
