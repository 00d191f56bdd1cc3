//! Resource table model: packages, types, configurations and entries.

use crate::chunk::OpaqueChunk;
use crate::config::Config;
use crate::errors::{ResourcesError, ResourcesResult};
use crate::ids::{IdentifierTable, ResId};
use crate::strings::{StringPool, StringPoolIndex};
use crate::values::{ResolvedValue, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Offset of an absent entry in a type chunk.
pub const NO_ENTRY: u32 = 0xffff_ffff;
/// Absent entry in an `OFFSET16` type chunk.
pub const NO_ENTRY16: u16 = 0xffff;

pub const TYPE_FLAG_SPARSE: u8 = 0x01;
pub const TYPE_FLAG_OFFSET16: u8 = 0x02;

pub const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
pub const ENTRY_FLAG_PUBLIC: u16 = 0x0002;
pub const ENTRY_FLAG_WEAK: u16 = 0x0004;
pub const ENTRY_FLAG_COMPACT: u16 = 0x0008;

pub const SPEC_PUBLIC: u32 = 0x4000_0000;
pub const SPEC_STAGED_API: u32 = 0x2000_0000;

pub(crate) const PACKAGE_NAME_SIZE: usize = 128;
pub(crate) const OVERLAYABLE_NAME_SIZE: usize = 256;

/// Compiled resource table (`resources.arsc`).
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    pub(crate) string_pool: StringPool,
    pub(crate) packages: Vec<Package>,
    /// Unknown children of the table chunk, by child position.
    pub(crate) opaque: Vec<OpaqueChunk>,
}

impl ResourceTable {
    #[must_use]
    pub fn new(utf8: bool) -> Self {
        Self {
            string_pool: StringPool::new(utf8),
            ..Self::default()
        }
    }

    /// Global pool holding the string values of every package.
    #[must_use]
    pub const fn string_pool(&self) -> &StringPool {
        &self.string_pool
    }

    pub fn string_pool_mut(&mut self) -> &mut StringPool {
        &mut self.string_pool
    }

    #[must_use]
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    #[must_use]
    pub fn package(&self, id: u8) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn opaque_chunks(&self) -> &[OpaqueChunk] {
        &self.opaque
    }

    /// Forgets the layouts kept verbatim at decode time: the whole table is
    /// then written in the canonical layout.
    pub fn canonicalize(&mut self) {
        self.string_pool.preserved = None;
        for package in &mut self.packages {
            package.preserved = None;
            package.type_strings.preserved = None;
            package.key_strings.preserved = None;
            for typ in package.types.values_mut() {
                for configuration in &mut typ.configs {
                    configuration.preserved = None;
                }
            }
        }
    }

    /// Adds an empty package declaring the given resource types, whose ids
    /// follow their order (starting at 1).
    pub fn add_package(&mut self, id: u8, name: &str, type_names: &[&str]) -> ResourcesResult<()> {
        if self.package(id).is_some() {
            return Err(ResourcesError::Format(format!(
                "package {id:#04x} is already defined"
            )));
        }
        let utf8 = self.string_pool.is_utf8();
        let mut type_strings = StringPool::new(utf8);
        for typ in type_names {
            type_strings.push(typ);
        }
        self.packages.push(Package {
            id,
            name: fixed_utf16(name, PACKAGE_NAME_SIZE),
            last_public_type: 0,
            last_public_key: 0,
            type_id_offset: None,
            type_strings,
            key_strings: StringPool::new(utf8),
            types: BTreeMap::new(),
            libraries: Vec::new(),
            overlayables: Vec::new(),
            staged_aliases: Vec::new(),
            opaque: Vec::new(),
            layout: Vec::new(),
            preserved: None,
        });
        Ok(())
    }

    /// Every variant of a resource, with the configuration selecting it.
    #[must_use]
    pub fn entries(&self, id: u32) -> Vec<(&Config, &Entry)> {
        let res_id = ResId(id);
        self.package(res_id.package())
            .and_then(|p| p.types.get(&res_id.typ()))
            .map(|t| {
                t.configs
                    .iter()
                    .filter_map(|c| c.entries.get(&res_id.entry()).map(|e| (&c.config, e)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Variant of a resource for the given configuration.
    #[must_use]
    pub fn entry(&self, id: u32, config: &Config) -> Option<&Entry> {
        self.entries(id)
            .into_iter()
            .find(|(c, _)| c.same_qualifiers(config))
            .map(|(_, e)| e)
    }

    /// Adds (or replaces) a resource variant and returns the resource id.
    ///
    /// The id of an existing entry with the same name is reused, a new id
    /// is allocated after the last one of the type otherwise. The key
    /// string, the configuration block and the type spec are created when
    /// missing.
    pub fn define_entry(
        &mut self,
        package_id: u8,
        typ: &str,
        config: &Config,
        name: &str,
        content: EntryContent,
    ) -> ResourcesResult<u32> {
        let location = format!("package {package_id:#04x}");
        let unresolved = || ResourcesError::Resolution {
            location: location.clone(),
            name: format!("{typ}/{name}"),
        };
        let package = self
            .packages
            .iter_mut()
            .find(|p| p.id == package_id)
            .ok_or_else(unresolved)?;
        let type_id = package.type_id(typ).ok_or_else(unresolved)?;
        let key = package.key_strings.get_or_push(name);
        package.preserved = None;

        if !package.types.contains_key(&type_id) {
            package.types.insert(
                type_id,
                ResType {
                    id: type_id,
                    spec: None,
                    configs: Vec::new(),
                },
            );
        }
        if package.types.get(&type_id).is_some_and(|t| t.spec.is_none()) {
            let at = package
                .layout
                .iter()
                .position(|c| c.type_id() == Some(type_id))
                .unwrap_or(package.layout.len());
            package.layout.insert(at, PackageChunk::TypeSpec(type_id));
        }
        let res_type = package
            .types
            .get_mut(&type_id)
            .ok_or_else(|| ResourcesError::Internal(format!("type {type_id:#04x} vanished")))?;
        let entry_id = match res_type.entry_keys().into_iter().find(|(_, k)| *k == key) {
            Some((entry_id, _)) => entry_id,
            None => {
                let next = res_type
                    .configs
                    .iter()
                    .filter_map(|c| c.entries.keys().next_back())
                    .map(|id| usize::from(*id) + 1)
                    .max()
                    .unwrap_or(0)
                    .max(res_type.spec.as_ref().map_or(0, |s| s.flags.len()));
                u16::try_from(next).map_err(|_| {
                    ResourcesError::Format(format!("type {typ} has no entry id left"))
                })?
            }
        };
        let spec = res_type.spec.get_or_insert_with(TypeSpec::default);
        if spec.flags.len() <= usize::from(entry_id) {
            spec.flags.resize(usize::from(entry_id) + 1, 0);
        }

        let config_idx = match res_type
            .configs
            .iter()
            .position(|c| c.config.same_qualifiers(config))
        {
            Some(idx) => idx,
            None => {
                res_type.configs.push(Configuration::new(config.clone()));
                let idx = res_type.configs.len() - 1;
                let at = package
                    .layout
                    .iter()
                    .rposition(|c| c.type_id() == Some(type_id))
                    .map_or(package.layout.len(), |p| p + 1);
                package.layout.insert(at, PackageChunk::Type(type_id, idx));
                idx
            }
        };
        let configuration = &mut res_type.configs[config_idx];
        configuration.preserved = None;
        configuration.entries.insert(entry_id, Entry::new(key, content));
        configuration.entry_count = configuration.entry_count.max(u32::from(entry_id) + 1);

        let id = ResId::new(package_id, type_id, entry_id).0;
        log::debug!("defined {typ}/{name} as {id:#010x} in {config}");
        Ok(id)
    }

    /// Same as [`Self::define_entry`] for a simple value given in symbolic
    /// form.
    pub fn define_value(
        &mut self,
        package_id: u8,
        typ: &str,
        config: &Config,
        name: &str,
        value: &ResolvedValue,
        ids: Option<&IdentifierTable>,
    ) -> ResourcesResult<u32> {
        let location = format!("{typ}/{name}");
        let value = value.unresolve(&mut self.string_pool, ids, &location)?;
        self.define_entry(package_id, typ, config, name, EntryContent::Value(value))
    }

    fn map_entry(&self, id: u32) -> Option<&MapEntry> {
        let mut entries = self.entries(id);
        // default configuration first
        entries.sort_by_key(|(c, _)| !c.is_default());
        entries.into_iter().find_map(|(_, e)| match &e.content {
            EntryContent::Map(map) => Some(map),
            EntryContent::Value(_) => None,
        })
    }

    /// Follows the parent references of a style (or any complex entry),
    /// starting with `id` itself. The chain stops at the first parent that
    /// is not a complex entry of this table.
    pub fn style_chain(&self, id: u32) -> ResourcesResult<Vec<u32>> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(map) = self.map_entry(current) {
            let parent = map.parent;
            if parent == 0 {
                break;
            }
            if chain.contains(&parent) {
                let msg = format!(
                    "style {current:#010x} inherits from {parent:#010x}, closing a cycle"
                );
                log::error!("{msg}");
                return Err(ResourcesError::Format(msg));
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Ids only defined in qualified configurations, sparse configurations
    /// being ignored.
    #[must_use]
    pub fn missing_defaults(&self) -> Vec<u32> {
        let mut missing = BTreeSet::new();
        for package in &self.packages {
            for typ in package.types.values() {
                let defaults: BTreeSet<u16> = typ
                    .configs
                    .iter()
                    .filter(|c| c.config.is_default())
                    .flat_map(|c| c.entries.keys().copied())
                    .collect();
                for configuration in &typ.configs {
                    if configuration.config.is_default() || configuration.is_sparse() {
                        continue;
                    }
                    for entry_id in configuration.entries.keys() {
                        if !defaults.contains(entry_id) {
                            missing.insert(ResId::new(package.id, typ.id, *entry_id).0);
                        }
                    }
                }
            }
        }
        missing.into_iter().collect()
    }

    /// Human readable listing of every resource, in the fashion of
    /// `aapt dump resources`.
    pub fn dump<W: fmt::Write>(
        &self,
        f: &mut W,
        ids: Option<&IdentifierTable>,
    ) -> ResourcesResult<()> {
        writeln!(f, "Package Groups ({})", self.packages.len())?;
        for package in &self.packages {
            package.dump(f, self, ids)?;
        }
        Ok(())
    }
}

/// Position of a child chunk in a package, used to write chunks back in
/// their original order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PackageChunk {
    TypeSpec(u8),
    Type(u8, usize),
    Library(usize),
    Overlayable(usize),
    StagedAlias(usize),
    Opaque(usize),
}

impl PackageChunk {
    const fn type_id(self) -> Option<u8> {
        match self {
            Self::TypeSpec(id) | Self::Type(id, _) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Package {
    pub(crate) id: u8,
    /// Raw `char16_t[128]` name, kept whole.
    pub(crate) name: Vec<u16>,
    pub(crate) last_public_type: u32,
    pub(crate) last_public_key: u32,
    /// Only present with the 288-bytes header.
    pub(crate) type_id_offset: Option<u32>,
    pub(crate) type_strings: StringPool,
    pub(crate) key_strings: StringPool,
    pub(crate) types: BTreeMap<u8, ResType>,
    pub(crate) libraries: Vec<Library>,
    pub(crate) overlayables: Vec<Overlayable>,
    pub(crate) staged_aliases: Vec<StagedAlias>,
    pub(crate) opaque: Vec<OpaqueChunk>,
    pub(crate) layout: Vec<PackageChunk>,
    pub(crate) preserved: Option<Vec<u8>>,
}

impl Package {
    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> String {
        utf16_until_nul(&self.name)
    }

    #[must_use]
    pub const fn type_strings(&self) -> &StringPool {
        &self.type_strings
    }

    #[must_use]
    pub const fn key_strings(&self) -> &StringPool {
        &self.key_strings
    }

    pub fn types(&self) -> impl Iterator<Item = &ResType> {
        self.types.values()
    }

    #[must_use]
    pub fn get_type(&self, id: u8) -> Option<&ResType> {
        self.types.get(&id)
    }

    /// Name of a type, type ids being 1-based indices in the type strings.
    pub fn type_name(&self, type_id: u8) -> ResourcesResult<String> {
        if type_id == 0 {
            return Err(ResourcesError::Format("type id 0 is reserved".to_string()));
        }
        self.type_strings
            .string(StringPoolIndex::new(usize::from(type_id) - 1))
    }

    #[must_use]
    pub fn type_id(&self, name: &str) -> Option<u8> {
        self.type_strings
            .find(name)
            .and_then(|idx| u8::try_from(idx.index() + 1).ok())
    }

    #[must_use]
    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    #[must_use]
    pub fn overlayables(&self) -> &[Overlayable] {
        &self.overlayables
    }

    #[must_use]
    pub fn staged_aliases(&self) -> &[StagedAlias] {
        &self.staged_aliases
    }

    #[must_use]
    pub fn opaque_chunks(&self) -> &[OpaqueChunk] {
        &self.opaque
    }

    /// Whether the original package chunk is re-emitted verbatim on encode.
    #[must_use]
    pub const fn is_preserved(&self) -> bool {
        self.preserved.is_some()
    }

    fn dump<W: fmt::Write>(
        &self,
        f: &mut W,
        table: &ResourceTable,
        ids: Option<&IdentifierTable>,
    ) -> ResourcesResult<()> {
        writeln!(f, "Package name={} id={:02x}", self.name(), self.id)?;
        for library in &self.libraries {
            for entry in &library.entries {
                writeln!(f, "  library {:#04x} {}", entry.id, entry.name())?;
            }
        }
        for typ in self.types.values() {
            let type_name = self.type_name(typ.id)?;
            let count = typ.spec.as_ref().map_or(0, |s| s.flags.len());
            writeln!(f, "  type {type_name} id={:02x} entryCount={count}", typ.id)?;
            for configuration in &typ.configs {
                writeln!(f, "    config {}:", configuration.config)?;
                for (entry_id, entry) in &configuration.entries {
                    let key = self.key_strings.get(entry.key)?;
                    let res_id = ResId::new(self.id, typ.id, *entry_id);
                    write!(f, "      resource {res_id} {type_name}/{key}")?;
                    if entry.is_public() {
                        write!(f, " (public)")?;
                    }
                    match &entry.content {
                        EntryContent::Value(value) => {
                            let resolved = value.resolve(&table.string_pool, ids)?;
                            match resolved {
                                ResolvedValue::String(s) => writeln!(f, ": {s:?}")?,
                                resolved => writeln!(f, ": {resolved}")?,
                            }
                        }
                        EntryContent::Map(map) => {
                            write!(f, ": ({type_name}) size={}", map.items.len())?;
                            if map.parent != 0 {
                                let parent = Value::Reference(map.parent)
                                    .resolve(&table.string_pool, ids)?;
                                write!(f, " parent={parent}")?;
                            }
                            writeln!(f)?;
                            for item in &map.items {
                                let name = match ids {
                                    Some(ids) => ids.reference(item.name).to_string(),
                                    None => format!("{:#010x}", item.name),
                                };
                                let value = item.value.resolve(&table.string_pool, ids)?;
                                writeln!(f, "        {name} = {value}")?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Type spec flags and configuration blocks of one resource type.
#[derive(Debug, Clone)]
pub struct ResType {
    pub(crate) id: u8,
    pub(crate) spec: Option<TypeSpec>,
    pub(crate) configs: Vec<Configuration>,
}

impl ResType {
    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[must_use]
    pub const fn spec(&self) -> Option<&TypeSpec> {
        self.spec.as_ref()
    }

    #[must_use]
    pub fn configurations(&self) -> &[Configuration] {
        &self.configs
    }

    /// Key string of every entry id, as first declared.
    #[must_use]
    pub fn entry_keys(&self) -> BTreeMap<u16, StringPoolIndex> {
        let mut keys = BTreeMap::new();
        for configuration in &self.configs {
            for (entry_id, entry) in &configuration.entries {
                keys.entry(*entry_id).or_insert(entry.key);
            }
        }
        keys
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSpec {
    pub res0: u8,
    /// Number of type chunks, as declared by recent build tools.
    pub types_count: u16,
    /// Configuration change flags of every entry (`SPEC_PUBLIC`, ...).
    pub flags: Vec<u32>,
}

/// Entries of a type for one configuration (a type chunk).
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) flags: u8,
    pub(crate) reserved: u16,
    pub(crate) config: Config,
    /// Declared number of entry slots of a non-sparse chunk.
    pub(crate) entry_count: u32,
    pub(crate) entries: BTreeMap<u16, Entry>,
    pub(crate) preserved: Option<Vec<u8>>,
}

impl Configuration {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            flags: 0,
            reserved: 0,
            config,
            entry_count: 0,
            entries: BTreeMap::new(),
            preserved: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn is_sparse(&self) -> bool {
        self.flags & TYPE_FLAG_SPARSE != 0
    }

    #[must_use]
    pub const fn is_offset16(&self) -> bool {
        self.flags & TYPE_FLAG_OFFSET16 != 0
    }

    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<u16, Entry> {
        &self.entries
    }

    /// Number of slots written in the offsets array.
    #[must_use]
    pub(crate) fn slot_count(&self) -> usize {
        if self.is_sparse() {
            self.entries.len()
        } else {
            let used = self
                .entries
                .keys()
                .next_back()
                .map_or(0, |id| usize::from(*id) + 1);
            used.max(self.entry_count as usize)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub(crate) flags: u16,
    pub(crate) key: StringPoolIndex,
    pub(crate) content: EntryContent,
}

impl Entry {
    #[must_use]
    pub fn new(key: StringPoolIndex, content: EntryContent) -> Self {
        let flags = match content {
            EntryContent::Map(_) => ENTRY_FLAG_COMPLEX,
            EntryContent::Value(_) => 0,
        };
        Self {
            flags,
            key,
            content,
        }
    }

    #[must_use]
    pub const fn key(&self) -> StringPoolIndex {
        self.key
    }

    #[must_use]
    pub const fn content(&self) -> &EntryContent {
        &self.content
    }

    #[must_use]
    pub const fn is_complex(&self) -> bool {
        (self.flags & ENTRY_FLAG_COMPLEX) != 0
    }

    #[must_use]
    pub const fn is_public(&self) -> bool {
        (self.flags & ENTRY_FLAG_PUBLIC) != 0
    }

    #[must_use]
    pub const fn is_weak(&self) -> bool {
        (self.flags & ENTRY_FLAG_WEAK) != 0
    }

    /// Compact entries hold their key in the size field and their value in
    /// place of the key.
    #[must_use]
    pub const fn is_compact(&self) -> bool {
        (self.flags & ENTRY_FLAG_COMPACT) != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryContent {
    Value(Value),
    Map(MapEntry),
}

/// Content of a complex entry (style, array, plurals, attr, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapEntry {
    /// Id of the parent style, 0 for none.
    pub parent: u32,
    pub items: Vec<MapItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapItem {
    /// Attribute id (or special key such as `^type`) of the item.
    pub name: u32,
    pub value: Value,
}

/// Shared library references of a package (package id to package name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
    pub entries: Vec<LibraryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub id: u32,
    /// Raw `char16_t[128]` name.
    pub name: Vec<u16>,
}

impl LibraryEntry {
    #[must_use]
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: fixed_utf16(name, PACKAGE_NAME_SIZE),
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        utf16_until_nul(&self.name)
    }
}

/// Named set of resources an overlay may replace, and the policies
/// restricting which overlays may do so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlayable {
    /// Raw `char16_t[256]` name.
    pub name: Vec<u16>,
    /// Raw `char16_t[256]` actor.
    pub actor: Vec<u16>,
    pub policies: Vec<OverlayablePolicy>,
    pub opaque: Vec<OpaqueChunk>,
}

impl Overlayable {
    #[must_use]
    pub fn name(&self) -> String {
        utf16_until_nul(&self.name)
    }

    #[must_use]
    pub fn actor(&self) -> String {
        utf16_until_nul(&self.actor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayablePolicy {
    pub flags: u32,
    pub entries: Vec<u32>,
}

impl OverlayablePolicy {
    #[must_use]
    pub const fn is_public(&self) -> bool {
        (self.flags & 0x0000_0001) != 0
    }

    #[must_use]
    pub const fn is_signature(&self) -> bool {
        (self.flags & 0x0000_0010) != 0
    }
}

/// Mapping from staged (pre-release) resource ids to their final ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedAlias {
    pub entries: Vec<StagedAliasEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedAliasEntry {
    pub stage_id: u32,
    pub finalized_id: u32,
}

pub(crate) fn utf16_until_nul(raw: &[u16]) -> String {
    let end = raw.iter().position(|c| *c == 0).unwrap_or(raw.len());
    String::from_utf16_lossy(&raw[..end])
}

pub(crate) fn fixed_utf16(s: &str, size: usize) -> Vec<u16> {
    let mut raw: Vec<u16> = s.encode_utf16().take(size.saturating_sub(1)).collect();
    raw.resize(size, 0);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ResourceTable {
        let mut table = ResourceTable::new(true);
        table
            .add_package(0x7f, "com.example", &["attr", "string", "style"])
            .unwrap();
        table
    }

    fn style(parent: u32) -> EntryContent {
        EntryContent::Map(MapEntry {
            parent,
            items: Vec::new(),
        })
    }

    #[test]
    fn define_entries() {
        let mut table = table();
        let default = Config::default();
        let id = table
            .define_value(
                0x7f,
                "string",
                &default,
                "app_name",
                &ResolvedValue::String("Example".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(id, 0x7f02_0000);

        let mut french = Config::default();
        french.set_locale("fr", "");
        let same = table
            .define_value(
                0x7f,
                "string",
                &french,
                "app_name",
                &ResolvedValue::String("Exemple".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(same, id);

        let other = table
            .define_entry(
                0x7f,
                "string",
                &default,
                "title",
                EntryContent::Value(Value::IntDec(3)),
            )
            .unwrap();
        assert_eq!(other, 0x7f02_0001);
        assert_eq!(table.entries(id).len(), 2);
        assert!(table.entry(id, &french).is_some());

        let package = table.package(0x7f).unwrap();
        assert_eq!(package.key_strings().len(), 2);
        assert_eq!(package.get_type(2).unwrap().configurations().len(), 2);
        assert_eq!(
            package.layout,
            vec![
                PackageChunk::TypeSpec(2),
                PackageChunk::Type(2, 0),
                PackageChunk::Type(2, 1)
            ]
        );
    }

    #[test]
    fn unknown_type_or_package() {
        let mut table = table();
        let content = EntryContent::Value(Value::Null);
        assert!(matches!(
            table.define_entry(0x7f, "color", &Config::default(), "red", content.clone()),
            Err(ResourcesError::Resolution { .. })
        ));
        assert!(matches!(
            table.define_entry(0x42, "string", &Config::default(), "red", content),
            Err(ResourcesError::Resolution { .. })
        ));
    }

    #[test]
    fn style_inheritance() {
        let mut table = table();
        let default = Config::default();
        let base = table
            .define_entry(0x7f, "style", &default, "Base", style(0x0103_0005))
            .unwrap();
        let theme = table
            .define_entry(0x7f, "style", &default, "Theme", style(base))
            .unwrap();
        assert_eq!(
            table.style_chain(theme).unwrap(),
            vec![theme, base, 0x0103_0005]
        );
    }

    #[test]
    fn style_cycles_are_rejected() {
        let mut table = table();
        let default = Config::default();
        let a = table
            .define_entry(0x7f, "style", &default, "A", style(0x7f03_0001))
            .unwrap();
        let b = table
            .define_entry(0x7f, "style", &default, "B", style(a))
            .unwrap();
        assert_eq!(b, 0x7f03_0001);
        assert!(table.style_chain(a).unwrap_err().is_format_error());

        let own = table
            .define_entry(0x7f, "style", &default, "Self", style(0x7f03_0002))
            .unwrap();
        assert_eq!(own, 0x7f03_0002);
        assert!(table.style_chain(own).is_err());
    }

    #[test]
    fn missing_default_configurations() {
        let mut table = table();
        let mut land = Config::default();
        land.orientation = 2;
        let value = || EntryContent::Value(Value::IntDec(1));
        let both = table
            .define_entry(0x7f, "string", &Config::default(), "both", value())
            .unwrap();
        table
            .define_entry(0x7f, "string", &land, "both", value())
            .unwrap();
        let land_only = table
            .define_entry(0x7f, "string", &land, "land_only", value())
            .unwrap();
        assert_ne!(both, land_only);
        assert_eq!(table.missing_defaults(), vec![land_only]);
    }

    #[test]
    fn dump_lists_resources() {
        let mut table = table();
        table
            .define_value(
                0x7f,
                "string",
                &Config::default(),
                "app_name",
                &ResolvedValue::String("Example".to_string()),
                None,
            )
            .unwrap();
        let mut out = String::new();
        table.dump(&mut out, None).unwrap();
        assert!(out.contains("Package name=com.example id=7f"));
        assert!(out.contains("type string id=02 entryCount=1"));
        assert!(out.contains("resource 0x7f020000 string/app_name: \"Example\""));
    }

    #[test]
    fn package_names() {
        let raw = fixed_utf16("com.example", PACKAGE_NAME_SIZE);
        assert_eq!(raw.len(), PACKAGE_NAME_SIZE);
        assert_eq!(utf16_until_nul(&raw), "com.example");
        assert_eq!(LibraryEntry::new(2, "lib").name(), "lib");
    }
}
