//! Bidirectional mapping between numeric resource ids and symbolic names.

use crate::errors::{ResourcesError, ResourcesResult};
use crate::tables::ResourceTable;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Package id reserved for the platform resources.
pub const FRAMEWORK_PACKAGE_ID: u8 = 0x01;
/// Package id conventionally given to applications.
pub const APP_PACKAGE_ID: u8 = 0x7f;

/// A packed resource id: `package << 24 | type << 16 | entry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResId(pub u32);

impl ResId {
    #[must_use]
    pub const fn new(package: u8, typ: u8, entry: u16) -> Self {
        Self(((package as u32) << 24) | ((typ as u32) << 16) | entry as u32)
    }

    #[must_use]
    pub const fn package(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[must_use]
    pub const fn typ(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[must_use]
    pub const fn entry(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResName {
    pub package: String,
    #[serde(rename = "type")]
    pub typ: String,
    pub name: String,
}

impl fmt::Display for ResName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}/{}", self.package, self.typ, self.name)
    }
}

/// Reference target in the editable representation: either a name, or the
/// numeric id when no name maps back to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResRef {
    Named {
        /// `None` stands for the package being decoded.
        package: Option<String>,
        #[serde(rename = "type")]
        typ: String,
        name: String,
    },
    Unresolved(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// `@...`
    Reference,
    /// `?...`
    Attribute,
}

lazy_static! {
    static ref NAMED_REF: Regex =
        Regex::new(r"^([@?])\+?(?:([A-Za-z0-9_.]+):)?([A-Za-z0-9_.\-]+)/(.+)$").expect("regex");
    static ref NUMERIC_REF: Regex = Regex::new(r"^([@?])0x([0-9a-fA-F]{1,8})$").expect("regex");
}

impl ResRef {
    #[must_use]
    pub fn named(typ: &str, name: &str) -> Self {
        Self::Named {
            package: None,
            typ: typ.to_string(),
            name: name.to_string(),
        }
    }

    /// Parses `@[+][package:]type/name`, `?[package:]type/name`, `@0x...`
    /// and `@null`.
    #[must_use]
    pub fn parse(s: &str) -> Option<(RefKind, Self)> {
        let kind = |sigil: &str| {
            if sigil == "?" {
                RefKind::Attribute
            } else {
                RefKind::Reference
            }
        };
        if s == "@null" {
            return Some((RefKind::Reference, Self::Unresolved(0)));
        }
        if let Some(caps) = NUMERIC_REF.captures(s) {
            let id = u32::from_str_radix(&caps[2], 16).ok()?;
            return Some((kind(&caps[1]), Self::Unresolved(id)));
        }
        let caps = NAMED_REF.captures(s)?;
        Some((
            kind(&caps[1]),
            Self::Named {
                package: caps.get(2).map(|m| m.as_str().to_string()),
                typ: caps[3].to_string(),
                name: caps[4].to_string(),
            },
        ))
    }

    /// Numeric id of the reference, `location` being reported on failure.
    pub fn to_id(&self, ids: Option<&IdentifierTable>, location: &str) -> ResourcesResult<u32> {
        match self {
            Self::Unresolved(id) => Ok(*id),
            Self::Named { package, typ, name } => ids
                .and_then(|ids| ids.name_to_id(package.as_deref(), typ, name))
                .ok_or_else(|| {
                    log::error!("cannot resolve {self} in {location}");
                    ResourcesError::Resolution {
                        location: location.to_string(),
                        name: self.to_string(),
                    }
                }),
        }
    }
}

impl fmt::Display for ResRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Named {
                package: Some(package),
                typ,
                name,
            } => write!(f, "{package}:{typ}/{name}"),
            Self::Named {
                package: None,
                typ,
                name,
            } => write!(f, "{typ}/{name}"),
            Self::Unresolved(id) => write!(f, "{id:#010x}"),
        }
    }
}

/// Id ↔ name lookup built from a decoded resource table, optionally backed
/// by a framework table for ids the primary table does not define.
///
/// Once built it is only read, and can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct IdentifierTable {
    packages: BTreeMap<u8, String>,
    names: BTreeMap<u32, ResName>,
    ids: HashMap<(u8, String, String), u32>,
    fallback: Option<Arc<IdentifierTable>>,
}

impl IdentifierTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every entry declared in any configuration of the table.
    pub fn from_table(table: &ResourceTable) -> ResourcesResult<Self> {
        let mut ids = Self::new();
        for package in table.packages() {
            let package_name = package.name();
            ids.packages.insert(package.id(), package_name.clone());
            for typ in package.types() {
                let type_name = package.type_name(typ.id())?;
                for (entry_id, key) in typ.entry_keys() {
                    let name = package.key_strings().string(key)?;
                    ids.insert(
                        ResId::new(package.id(), typ.id(), entry_id).0,
                        &package_name,
                        &type_name,
                        &name,
                    );
                }
            }
        }
        log::debug!(
            "identifier table: {} ids in {} packages",
            ids.names.len(),
            ids.packages.len()
        );
        Ok(ids)
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<IdentifierTable>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&IdentifierTable> {
        self.fallback.as_deref()
    }

    /// Registers a new id. When a name is declared twice, lookups by name
    /// keep returning the first id.
    pub fn insert(&mut self, id: u32, package: &str, typ: &str, name: &str) {
        let res_id = ResId(id);
        self.packages
            .entry(res_id.package())
            .or_insert_with(|| package.to_string());
        let key = (res_id.package(), typ.to_string(), name.to_string());
        if let Some(previous) = self.ids.get(&key) {
            if *previous != id {
                log::debug!("{typ}/{name} declared by {previous:#010x} and {id:#010x}");
            }
        } else {
            self.ids.insert(key, id);
        }
        self.names.entry(id).or_insert_with(|| ResName {
            package: package.to_string(),
            typ: typ.to_string(),
            name: name.to_string(),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Package considered as the one being decoded: the only package that
    /// is not the framework one, the framework itself when alone, or the
    /// conventional application package.
    #[must_use]
    pub fn current_package(&self) -> Option<u8> {
        let mut others = self
            .packages
            .keys()
            .filter(|id| **id != FRAMEWORK_PACKAGE_ID);
        match (others.next(), others.next()) {
            (Some(id), None) => Some(*id),
            (None, _) if !self.packages.is_empty() => Some(FRAMEWORK_PACKAGE_ID),
            _ if self.packages.contains_key(&APP_PACKAGE_ID) => Some(APP_PACKAGE_ID),
            _ => None,
        }
    }

    #[must_use]
    pub fn id_to_name(&self, id: u32) -> Option<&ResName> {
        match self.names.get(&id) {
            Some(name) => Some(name),
            None if !self.packages.contains_key(&ResId(id).package()) => {
                self.fallback.as_ref()?.id_to_name(id)
            }
            None => None,
        }
    }

    /// Looks a name up, `package` being a package name or `None` for the
    /// current package.
    #[must_use]
    pub fn name_to_id(&self, package: Option<&str>, typ: &str, name: &str) -> Option<u32> {
        let package_id = match package {
            None => self.current_package(),
            Some(package) => self
                .packages
                .iter()
                .find(|(_, n)| n.as_str() == package)
                .map(|(id, _)| *id),
        };
        match package_id {
            Some(package_id) => self
                .ids
                .get(&(package_id, typ.to_string(), name.to_string()))
                .copied(),
            None => self.fallback.as_ref()?.name_to_id(package, typ, name),
        }
    }

    pub fn resolve_id(&self, id: u32) -> ResourcesResult<&ResName> {
        self.id_to_name(id)
            .ok_or(ResourcesError::UnknownResource(id))
    }

    /// Symbolic form of an id, only when the name maps back to this exact
    /// id; numeric otherwise.
    #[must_use]
    pub fn reference(&self, id: u32) -> ResRef {
        let Some(res_name) = self.id_to_name(id) else {
            log::debug!("{}", ResourcesError::UnknownResource(id));
            return ResRef::Unresolved(id);
        };
        let package = if Some(ResId(id).package()) == self.current_package() {
            None
        } else {
            Some(res_name.package.clone())
        };
        if self.name_to_id(package.as_deref(), &res_name.typ, &res_name.name) != Some(id) {
            return ResRef::Unresolved(id);
        }
        ResRef::Named {
            package,
            typ: res_name.typ.clone(),
            name: res_name.name.clone(),
        }
    }

    /// Ids of the primary table, in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = (ResId, &ResName)> {
        self.names.iter().map(|(id, name)| (ResId(*id), name))
    }
}
