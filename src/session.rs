//! Decoding context of one application.

use crate::errors::RwResult;
use rayon::prelude::*;
use rw_resources::ids::IdentifierTable;
use rw_resources::tables::ResourceTable;
use rw_resources::tree::XmlTree;
use std::sync::Arc;

/// Resource table of an application, decoded once, and the identifier
/// table built from it.
///
/// The identifier table is an immutable snapshot: every document of the
/// session is decoded against the same names, possibly from several threads.
#[derive(Debug, Default)]
pub struct Session {
    table: Option<ResourceTable>,
    ids: Option<Arc<IdentifierTable>>,
}

impl Session {
    /// Session without any table, references are kept numeric.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(table_bytes: &[u8]) -> RwResult<Self> {
        let table = rw_resources::decode_table(table_bytes)?;
        let ids = IdentifierTable::from_table(&table)?;
        log::info!(
            "resource table: {} packages, {} identifiers",
            table.packages().len(),
            ids.len()
        );
        Ok(Self {
            table: Some(table),
            ids: Some(Arc::new(ids)),
        })
    }

    /// Uses the framework table (usually the `android` package) for the ids
    /// the application table does not define.
    pub fn with_framework(self, framework_bytes: &[u8]) -> RwResult<Self> {
        let framework = rw_resources::decode_table(framework_bytes)?;
        let framework_ids = IdentifierTable::from_table(&framework)?;
        log::info!("framework table: {} identifiers", framework_ids.len());

        let ids = match &self.table {
            Some(table) => IdentifierTable::from_table(table)?,
            None => IdentifierTable::new(),
        };
        Ok(Self {
            table: self.table,
            ids: Some(Arc::new(ids.with_fallback(Arc::new(framework_ids)))),
        })
    }

    #[must_use]
    pub const fn table(&self) -> Option<&ResourceTable> {
        self.table.as_ref()
    }

    /// Shared snapshot of the identifier table.
    #[must_use]
    pub fn identifiers(&self) -> Option<Arc<IdentifierTable>> {
        self.ids.clone()
    }

    pub fn decode_xml(&self, bytes: &[u8]) -> RwResult<XmlTree> {
        let document = rw_resources::decode_xml(bytes)?;
        Ok(document.to_tree(self.ids.as_deref())?)
    }

    pub fn encode_xml(&self, tree: &XmlTree) -> RwResult<Vec<u8>> {
        let document = tree.to_document(self.ids.as_deref())?;
        Ok(rw_resources::encode_xml(&document)?)
    }

    /// Decodes many documents in parallel, results being in input order.
    pub fn decode_xml_all<B>(&self, documents: &[B]) -> Vec<RwResult<XmlTree>>
    where
        B: AsRef<[u8]> + Sync,
    {
        documents
            .par_iter()
            .map(|bytes| self.decode_xml(bytes.as_ref()))
            .collect()
    }

    pub fn encode_xml_all(&self, trees: &[XmlTree]) -> Vec<RwResult<Vec<u8>>> {
        trees.par_iter().map(|tree| self.encode_xml(tree)).collect()
    }
}
