use crate::errors::{ResourcesError, ResourcesResult};
use serde::Serialize;
use std::fmt;

pub(crate) const STRING_POOL_HEADER_SIZE: usize = 0x1c;
pub(crate) const SORTED_FLAG: u32 = 1 << 0;
pub(crate) const UTF8_FLAG: u32 = 1 << 8;
pub(crate) const SPAN_END: u32 = 0xffff_ffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StringPoolIndex(usize);

impl StringPoolIndex {
    #[must_use]
    pub const fn new(idx: usize) -> Self {
        Self(idx)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Decodes an optional index, `0xffffffff` meaning "no string".
    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        (raw != 0xffff_ffff).then_some(Self(raw as usize))
    }

    pub(crate) fn to_raw(index: Option<Self>) -> u32 {
        index.map_or(0xffff_ffff, |idx| idx.0 as u32)
    }
}

/// Shared, indexed table of strings.
///
/// Indices are stable: strings are only ever appended. When the decoded
/// chunk layout differs from the one the writer produces (shared offsets,
/// unusual padding, ...), the original chunk bytes are kept and re-emitted
/// as long as the pool is not modified.
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    pub(crate) sorted: bool,
    pub(crate) utf8: bool,
    pub(crate) strings: Vec<UtfString>,
    pub(crate) styles: Vec<Style>,
    pub(crate) preserved: Option<Vec<u8>>,
}

impl StringPool {
    #[must_use]
    pub fn new(utf8: bool) -> Self {
        Self {
            utf8,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_utf8(&self) -> bool {
        self.utf8
    }

    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Whether the original chunk bytes are re-emitted verbatim on encode.
    #[must_use]
    pub const fn is_preserved(&self) -> bool {
        self.preserved.is_some()
    }

    pub fn get(&self, id: StringPoolIndex) -> ResourcesResult<&UtfString> {
        self.strings.get(id.0).ok_or_else(|| {
            ResourcesError::Format(format!(
                "string index {} out of a {} strings pool",
                id.0,
                self.strings.len()
            ))
        })
    }

    pub fn string(&self, id: StringPoolIndex) -> ResourcesResult<String> {
        self.get(id)?.string()
    }

    pub fn strings(&self) -> impl Iterator<Item = &UtfString> {
        self.strings.iter()
    }

    /// Style spans attached to the string at the given index, if any.
    #[must_use]
    pub fn style(&self, id: StringPoolIndex) -> Option<&Style> {
        self.styles.get(id.0)
    }

    #[must_use]
    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    pub fn find(&self, string: &str) -> Option<StringPoolIndex> {
        let candidate = UtfString::new(string, self.utf8);
        self.strings
            .iter()
            .position(|utf| utf.same_data(&candidate))
            .map(StringPoolIndex::new)
    }

    /// Appends a string, even if an equal one already exists.
    pub fn push(&mut self, string: &str) -> StringPoolIndex {
        let index = StringPoolIndex::new(self.strings.len());
        // very small chances for the pool to still be sorted,
        // better consider unsorted than checking if it is sorted
        self.sorted = false;
        self.preserved = None;
        self.strings.push(UtfString::new(string, self.utf8));
        index
    }

    pub fn get_or_push(&mut self, string: &str) -> StringPoolIndex {
        match self.find(string) {
            Some(index) => index,
            None => self.push(string),
        }
    }

    /// Attaches style spans to an existing string. Strings before it that
    /// have no style get an empty span list, as the format requires styles
    /// to be indexed like the strings they decorate.
    pub fn set_style(&mut self, id: StringPoolIndex, style: Style) -> ResourcesResult<()> {
        let _ = self.get(id)?;
        if self.styles.len() <= id.0 {
            self.styles.resize_with(id.0 + 1, Style::default);
        }
        self.styles[id.0] = style;
        self.preserved = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtfString {
    Utf8 {
        raw: Vec<u8>,
        /// Length in UTF-16 code units, as declared in the pool.
        size: usize,
    },
    Utf16 {
        raw: Vec<u16>,
    },
}

impl UtfString {
    #[must_use]
    pub fn new(string: &str, utf8: bool) -> Self {
        if utf8 {
            Self::Utf8 {
                raw: string.as_bytes().to_vec(),
                size: string.encode_utf16().count(),
            }
        } else {
            Self::Utf16 {
                raw: string.encode_utf16().collect(),
            }
        }
    }

    fn same_data(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Utf8 { raw: a, .. }, Self::Utf8 { raw: b, .. }) => a == b,
            (Self::Utf16 { raw: a }, Self::Utf16 { raw: b }) => a == b,
            _ => false,
        }
    }

    pub fn string(&self) -> ResourcesResult<String> {
        match self {
            Self::Utf8 { raw, .. } => String::from_utf8(raw.clone())
                .map_err(|e| ResourcesError::InvalidUtf8(e.to_string())),
            Self::Utf16 { raw } => {
                String::from_utf16(raw).map_err(|e| ResourcesError::InvalidUtf16(e.to_string()))
            }
        }
    }

    /// Lossy conversion, for display purposes.
    #[must_use]
    pub fn lossy(&self) -> String {
        match self {
            Self::Utf8 { raw, .. } => String::from_utf8_lossy(raw).into_owned(),
            Self::Utf16 { raw } => String::from_utf16_lossy(raw),
        }
    }
}

impl fmt::Display for UtfString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.lossy())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Style {
    pub spans: Vec<Span>,
}

/// A styled range of characters: `name` is the index of the tag string
/// (e.g. `b`, `font;color=red`), `first_char` and `last_char` are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub name: u32,
    pub first_char: u32,
    pub last_char: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_find() {
        let mut pool = StringPool::new(true);
        let a = pool.push("alpha");
        let b = pool.get_or_push("beta");
        assert_eq!(pool.get_or_push("alpha"), a);
        assert_eq!(b.index(), 1);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.string(b).unwrap(), "beta");
        assert_eq!(pool.find("gamma"), None);
    }

    #[test]
    fn utf8_size_counts_utf16_units() {
        match UtfString::new("h\u{e9}\u{1f600}", true) {
            UtfString::Utf8 { raw, size } => {
                assert_eq!(raw.len(), 1 + 2 + 4);
                assert_eq!(size, 1 + 1 + 2);
            }
            UtfString::Utf16 { .. } => panic!("utf8 expected"),
        }
    }

    #[test]
    fn out_of_bounds_index() {
        let pool = StringPool::new(false);
        assert!(pool.get(StringPoolIndex::new(0)).is_err());
    }

    #[test]
    fn styles_are_indexed_like_strings() {
        let mut pool = StringPool::new(false);
        let _plain = pool.push("plain");
        let styled = pool.push("bold text");
        let tag = pool.push("b");
        let style = Style {
            spans: vec![Span {
                name: tag.index() as u32,
                first_char: 0,
                last_char: 3,
            }],
        };
        pool.set_style(styled, style.clone()).unwrap();
        assert_eq!(pool.styles().len(), 2);
        assert!(pool.style(StringPoolIndex::new(0)).unwrap().spans.is_empty());
        assert_eq!(pool.style(styled), Some(&style));
        assert_eq!(pool.style(tag), None);
    }

    #[test]
    fn raw_index_sentinel() {
        assert_eq!(StringPoolIndex::from_raw(0xffff_ffff), None);
        assert_eq!(
            StringPoolIndex::from_raw(3),
            Some(StringPoolIndex::new(3))
        );
        assert_eq!(StringPoolIndex::to_raw(None), 0xffff_ffff);
    }
}
