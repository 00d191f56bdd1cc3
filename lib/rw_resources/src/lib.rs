//! Codec for the compiled Android resource formats: resource tables
//! (`resources.arsc`) and binary XML documents (`AndroidManifest.xml`,
//! layouts, ...).
//!
//! Decoding then encoding an unmodified structure gives back the exact
//! input bytes. Structures that are edited after decoding are written in
//! the canonical layout of the build tools.

mod parsers;
mod writers;

pub mod chunk;
pub mod config;
pub mod errors;
pub mod ids;
pub mod strings;
pub mod tables;
pub mod tree;
pub mod values;
pub mod xml;

use crate::errors::ResourcesResult;
use crate::strings::StringPool;
use crate::tables::ResourceTable;
use crate::xml::XmlDocument;

pub fn decode_string_pool(bytes: &[u8]) -> ResourcesResult<StringPool> {
    parsers::parse_string_pool(bytes)
}

pub fn encode_string_pool(pool: &StringPool) -> ResourcesResult<Vec<u8>> {
    writers::encode_with(|w| writers::write_string_pool(w, pool))
}

/// Decodes a complete resource table.
pub fn decode_table(bytes: &[u8]) -> ResourcesResult<ResourceTable> {
    let table = parsers::parse_table(bytes)?;
    for id in table.missing_defaults() {
        log::warn!("resource {id:#010x} has no default configuration");
    }
    Ok(table)
}

pub fn encode_table(table: &ResourceTable) -> ResourcesResult<Vec<u8>> {
    writers::encode_with(|w| writers::write_table(w, table))
}

/// Decodes a binary XML document.
pub fn decode_xml(bytes: &[u8]) -> ResourcesResult<XmlDocument> {
    parsers::parse_xml(bytes)
}

pub fn encode_xml(document: &XmlDocument) -> ResourcesResult<Vec<u8>> {
    writers::encode_with(|w| writers::write_xml(w, document))
}
