//! Serialization of the decoded structures back to chunks.
//!
//! Every structure that was decoded from a non-canonical layout and left
//! untouched since carries its original bytes, which are emitted verbatim.
//! Everything else is written in the canonical layout.

use crate::chunk::{ChunkHandle, ChunkType, ChunkWriter, OpaqueChunk};
use crate::config::{Config, KNOWN_CONFIG_SIZE};
use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{
    StringPool, StringPoolIndex, Style, UtfString, SORTED_FLAG, SPAN_END, STRING_POOL_HEADER_SIZE,
    UTF8_FLAG,
};
use crate::tables::{
    Configuration, Entry, EntryContent, Library, Overlayable, Package, PackageChunk,
    ResourceTable, StagedAlias, TypeSpec, ENTRY_FLAG_COMPACT, NO_ENTRY, NO_ENTRY16,
};
use crate::values::{Value, VALUE_SIZE};
use crate::xml::{XmlDocument, XmlEvent, XmlNode, ATTRIBUTE_SIZE};
use rw_utils::writers::{bytes, le_u16, le_u32, le_u8, padding4, zeros};
use std::collections::BTreeMap;
use std::io::Write;

/// Runs a chunk writer on a fresh buffer.
pub(crate) fn encode_with<F>(f: F) -> ResourcesResult<Vec<u8>>
where
    F: FnOnce(&mut ChunkWriter) -> ResourcesResult<()>,
{
    let mut writer = ChunkWriter::new();
    f(&mut writer)?;
    Ok(writer.into_inner())
}

fn index(idx: StringPoolIndex) -> ResourcesResult<u32> {
    u32::try_from(idx.index())
        .map_err(|_| ResourcesError::Internal(format!("string index {} overflows", idx.index())))
}

fn opt_index(idx: Option<StringPoolIndex>) -> u32 {
    StringPoolIndex::to_raw(idx)
}

fn count32(n: usize, what: &str) -> ResourcesResult<u32> {
    u32::try_from(n).map_err(|_| ResourcesError::Internal(format!("too many {what}: {n}")))
}

fn write_opaque<W: Write>(output: &mut W, chunk: &OpaqueChunk) -> ResourcesResult<()> {
    bytes(output, &chunk.raw)?;
    Ok(())
}

/// Writes regular children and opaque chunks interleaved, each opaque chunk
/// going back to its recorded child position.
fn write_children<F>(
    output: &mut ChunkWriter,
    regular_count: usize,
    opaque: &[OpaqueChunk],
    mut write_regular: F,
) -> ResourcesResult<()>
where
    F: FnMut(&mut ChunkWriter, usize) -> ResourcesResult<()>,
{
    let mut pending: Vec<&OpaqueChunk> = opaque.iter().collect();
    pending.sort_by_key(|chunk| chunk.position);
    let mut pending = pending.into_iter().peekable();
    let mut regular = 0;
    let mut position = 0;
    while regular < regular_count {
        match pending.peek() {
            Some(chunk) if chunk.position <= position => {
                write_opaque(output, chunk)?;
                pending.next();
            }
            _ => {
                write_regular(output, regular)?;
                regular += 1;
            }
        }
        position += 1;
    }
    for chunk in pending {
        write_opaque(output, chunk)?;
    }
    Ok(())
}

/*
 * String pool
 */

pub(crate) fn write_string_pool(output: &mut ChunkWriter, pool: &StringPool) -> ResourcesResult<()> {
    if let Some(raw) = &pool.preserved {
        bytes(output, raw)?;
        return Ok(());
    }

    let mut data = Vec::new();
    let mut string_offsets = Vec::with_capacity(pool.strings.len());
    for string in &pool.strings {
        string_offsets.push(count32(data.len(), "string bytes")?);
        match string {
            UtfString::Utf8 { raw, size } => {
                if !pool.utf8 {
                    return Err(ResourcesError::Internal(
                        "UTF-8 string in a UTF-16 pool".to_string(),
                    ));
                }
                utf8_length(&mut data, *size)?;
                utf8_length(&mut data, raw.len())?;
                bytes(&mut data, raw)?;
                le_u8(&mut data, 0)?;
            }
            UtfString::Utf16 { raw } => {
                if pool.utf8 {
                    return Err(ResourcesError::Internal(
                        "UTF-16 string in a UTF-8 pool".to_string(),
                    ));
                }
                utf16_length(&mut data, raw.len())?;
                for unit in raw {
                    le_u16(&mut data, *unit)?;
                }
                le_u16(&mut data, 0)?;
            }
        }
    }
    let padding = padding4(data.len());
    zeros(&mut data, padding)?;

    let mut style_data = Vec::new();
    let mut style_offsets = Vec::with_capacity(pool.styles.len());
    for style in &pool.styles {
        style_offsets.push(count32(style_data.len(), "style bytes")?);
        write_style(&mut style_data, style)?;
    }
    if !pool.styles.is_empty() {
        le_u32(&mut style_data, SPAN_END)?;
        le_u32(&mut style_data, SPAN_END)?;
    }

    let indices_size = 4 * (string_offsets.len() + style_offsets.len());
    let strings_start = STRING_POOL_HEADER_SIZE + indices_size;
    let styles_start = if pool.styles.is_empty() {
        0
    } else {
        strings_start + data.len()
    };
    let mut flags = 0;
    if pool.sorted {
        flags |= SORTED_FLAG;
    }
    if pool.utf8 {
        flags |= UTF8_FLAG;
    }

    let mut handle = output.begin_chunk(ChunkType::StringPool)?;
    le_u32(output, count32(pool.strings.len(), "strings")?)?;
    le_u32(output, count32(pool.styles.len(), "styles")?)?;
    le_u32(output, flags)?;
    le_u32(output, count32(strings_start, "string bytes")?)?;
    le_u32(output, count32(styles_start, "style bytes")?)?;
    output.end_header(&mut handle)?;
    for offset in string_offsets.iter().chain(style_offsets.iter()) {
        le_u32(output, *offset)?;
    }
    bytes(output, &data)?;
    bytes(output, &style_data)?;
    output.end_chunk(handle)?;
    Ok(())
}

fn utf8_length<W: Write>(output: &mut W, len: usize) -> ResourcesResult<()> {
    if len < 0x80 {
        le_u8(output, len as u8)?;
    } else if len <= 0x7fff {
        le_u8(output, ((len >> 8) as u8) | 0x80)?;
        le_u8(output, (len & 0xff) as u8)?;
    } else {
        return Err(ResourcesError::Internal(format!(
            "UTF-8 string length {len} cannot be encoded"
        )));
    }
    Ok(())
}

fn utf16_length<W: Write>(output: &mut W, len: usize) -> ResourcesResult<()> {
    if len < 0x8000 {
        le_u16(output, len as u16)?;
    } else if len <= 0x7fff_ffff {
        le_u16(output, ((len >> 16) as u16) | 0x8000)?;
        le_u16(output, (len & 0xffff) as u16)?;
    } else {
        return Err(ResourcesError::Internal(format!(
            "UTF-16 string length {len} cannot be encoded"
        )));
    }
    Ok(())
}

fn write_style<W: Write>(output: &mut W, style: &Style) -> ResourcesResult<()> {
    for span in &style.spans {
        le_u32(output, span.name)?;
        le_u32(output, span.first_char)?;
        le_u32(output, span.last_char)?;
    }
    le_u32(output, SPAN_END)?;
    Ok(())
}

/*
 * Resource table
 */

pub(crate) fn write_table(output: &mut ChunkWriter, table: &ResourceTable) -> ResourcesResult<()> {
    let mut handle = output.begin_chunk(ChunkType::Table)?;
    le_u32(output, count32(table.packages.len(), "packages")?)?;
    output.end_header(&mut handle)?;
    write_children(
        output,
        table.packages.len() + 1,
        &table.opaque,
        |output, idx| match idx {
            0 => write_string_pool(output, &table.string_pool),
            idx => write_package(output, &table.packages[idx - 1]),
        },
    )?;
    output.end_chunk(handle)?;
    Ok(())
}

pub(crate) fn write_package(output: &mut ChunkWriter, package: &Package) -> ResourcesResult<()> {
    if let Some(raw) = &package.preserved {
        bytes(output, raw)?;
        return Ok(());
    }

    let mut handle = output.begin_chunk(ChunkType::TablePackage)?;
    le_u32(output, u32::from(package.id))?;
    for unit in &package.name {
        le_u16(output, *unit)?;
    }
    let type_strings_at = output.position();
    le_u32(output, 0)?;
    le_u32(output, package.last_public_type)?;
    let key_strings_at = output.position();
    le_u32(output, 0)?;
    le_u32(output, package.last_public_key)?;
    if let Some(type_id_offset) = package.type_id_offset {
        le_u32(output, type_id_offset)?;
    }
    output.end_header(&mut handle)?;

    let type_strings = count32(output.offset_in(&handle), "package bytes")?;
    output.patch_u32(type_strings_at, type_strings)?;
    write_string_pool(output, &package.type_strings)?;
    let key_strings = count32(output.offset_in(&handle), "package bytes")?;
    output.patch_u32(key_strings_at, key_strings)?;
    write_string_pool(output, &package.key_strings)?;

    for chunk in &package.layout {
        match *chunk {
            PackageChunk::TypeSpec(id) => {
                if let Some(spec) = package.types.get(&id).and_then(|t| t.spec.as_ref()) {
                    write_type_spec(output, id, spec)?;
                }
            }
            PackageChunk::Type(id, idx) => {
                if let Some(configuration) = package.types.get(&id).and_then(|t| t.configs.get(idx))
                {
                    write_type(output, id, configuration)?;
                }
            }
            PackageChunk::Library(idx) => {
                write_library(output, layout_item(&package.libraries, idx, "library")?)?;
            }
            PackageChunk::Overlayable(idx) => {
                write_overlayable(output, layout_item(&package.overlayables, idx, "overlayable")?)?;
            }
            PackageChunk::StagedAlias(idx) => {
                write_staged_alias(output, layout_item(&package.staged_aliases, idx, "staged alias")?)?;
            }
            PackageChunk::Opaque(idx) => {
                write_opaque(output, layout_item(&package.opaque, idx, "opaque chunk")?)?;
            }
        }
    }
    output.end_chunk(handle)?;
    Ok(())
}

fn layout_item<'a, T>(items: &'a [T], idx: usize, what: &str) -> ResourcesResult<&'a T> {
    items.get(idx).ok_or_else(|| {
        ResourcesError::Internal(format!(
            "package layout refers to {what} {idx}, out of {}",
            items.len()
        ))
    })
}

fn write_type_spec(output: &mut ChunkWriter, id: u8, spec: &TypeSpec) -> ResourcesResult<()> {
    let mut handle = output.begin_chunk(ChunkType::TableTypeSpec)?;
    le_u8(output, id)?;
    le_u8(output, spec.res0)?;
    le_u16(output, spec.types_count)?;
    le_u32(output, count32(spec.flags.len(), "spec flags")?)?;
    output.end_header(&mut handle)?;
    for flags in &spec.flags {
        le_u32(output, *flags)?;
    }
    output.end_chunk(handle)?;
    Ok(())
}

fn write_config<W: Write>(output: &mut W, config: &Config) -> ResourcesResult<()> {
    if config.size < 4 {
        return Err(ResourcesError::Internal(format!(
            "configuration size {} is too small",
            config.size
        )));
    }
    let known = config.size.min(KNOWN_CONFIG_SIZE as u32) as usize - 4;
    if config.size as usize != known + 4 + config.extra.len() {
        return Err(ResourcesError::Internal(format!(
            "configuration size {} does not match its {} extra bytes",
            config.size,
            config.extra.len()
        )));
    }
    le_u32(output, config.size)?;
    bytes(output, &config.known_fields()[..known])?;
    bytes(output, &config.extra)?;
    Ok(())
}

pub(crate) fn write_type(
    output: &mut ChunkWriter,
    id: u8,
    configuration: &Configuration,
) -> ResourcesResult<()> {
    if let Some(raw) = &configuration.preserved {
        bytes(output, raw)?;
        return Ok(());
    }

    let mut data = Vec::new();
    let mut offsets = BTreeMap::new();
    for (entry_id, entry) in &configuration.entries {
        offsets.insert(*entry_id, data.len());
        write_entry(&mut data, entry)?;
    }

    let slot_count = configuration.slot_count();
    let mut index = Vec::new();
    if configuration.is_sparse() {
        for (entry_id, offset) in &offsets {
            le_u16(&mut index, *entry_id)?;
            le_u16(&mut index, offset16(*offset)?)?;
        }
    } else if configuration.is_offset16() {
        for slot in 0..slot_count {
            let offset = offsets.get(&(slot as u16)).copied();
            le_u16(&mut index, offset.map_or(Ok(NO_ENTRY16), offset16)?)?;
        }
    } else {
        for slot in 0..slot_count {
            let offset = offsets.get(&(slot as u16)).copied();
            le_u32(&mut index, offset.map_or(Ok(NO_ENTRY), |o| count32(o, "entry bytes"))?)?;
        }
    }
    let padding = padding4(index.len());
    zeros(&mut index, padding)?;

    let mut handle = output.begin_chunk(ChunkType::TableType)?;
    le_u8(output, id)?;
    le_u8(output, configuration.flags)?;
    le_u16(output, configuration.reserved)?;
    le_u32(output, count32(slot_count, "entries")?)?;
    let entries_start_at = output.position();
    le_u32(output, 0)?;
    write_config(output, &configuration.config)?;
    output.end_header(&mut handle)?;
    bytes(output, &index)?;
    let entries_start = count32(output.offset_in(&handle), "type bytes")?;
    output.patch_u32(entries_start_at, entries_start)?;
    bytes(output, &data)?;
    output.end_chunk(handle)?;
    Ok(())
}

fn offset16(offset: usize) -> ResourcesResult<u16> {
    match u16::try_from(offset / 4) {
        Ok(v) if v != NO_ENTRY16 && offset % 4 == 0 => Ok(v),
        _ => Err(ResourcesError::Internal(format!(
            "entry offset {offset:#x} does not fit a 16-bit slot"
        ))),
    }
}

fn write_entry<W: Write>(output: &mut W, entry: &Entry) -> ResourcesResult<()> {
    let key = index(entry.key)?;
    match &entry.content {
        EntryContent::Value(value) if entry.flags & ENTRY_FLAG_COMPACT != 0 => {
            let key = u16::try_from(key).map_err(|_| {
                ResourcesError::Internal(format!("compact entry key {key} overflows"))
            })?;
            le_u16(output, key)?;
            le_u16(output, (entry.flags & 0xff) | (u16::from(value.data_type()) << 8))?;
            le_u32(output, value.data())?;
        }
        EntryContent::Value(value) => {
            le_u16(output, 8)?;
            le_u16(output, entry.flags)?;
            le_u32(output, key)?;
            write_value(output, value)?;
        }
        EntryContent::Map(map) => {
            if entry.flags & ENTRY_FLAG_COMPACT != 0 {
                return Err(ResourcesError::Internal(
                    "compact entries cannot hold a map".to_string(),
                ));
            }
            le_u16(output, 16)?;
            le_u16(output, entry.flags)?;
            le_u32(output, key)?;
            le_u32(output, map.parent)?;
            le_u32(output, count32(map.items.len(), "map items")?)?;
            for item in &map.items {
                le_u32(output, item.name)?;
                write_value(output, &item.value)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn write_value<W: Write>(output: &mut W, value: &Value) -> ResourcesResult<()> {
    le_u16(output, VALUE_SIZE)?;
    le_u8(output, 0)?;
    le_u8(output, value.data_type())?;
    le_u32(output, value.data())?;
    Ok(())
}

fn write_library(output: &mut ChunkWriter, library: &Library) -> ResourcesResult<()> {
    let mut handle = output.begin_chunk(ChunkType::TableLibrary)?;
    le_u32(output, count32(library.entries.len(), "library entries")?)?;
    output.end_header(&mut handle)?;
    for entry in &library.entries {
        le_u32(output, entry.id)?;
        for unit in &entry.name {
            le_u16(output, *unit)?;
        }
    }
    output.end_chunk(handle)?;
    Ok(())
}

fn write_overlayable(output: &mut ChunkWriter, overlayable: &Overlayable) -> ResourcesResult<()> {
    let mut handle = output.begin_chunk(ChunkType::TableOverlayable)?;
    for unit in overlayable.name.iter().chain(overlayable.actor.iter()) {
        le_u16(output, *unit)?;
    }
    output.end_header(&mut handle)?;
    write_children(
        output,
        overlayable.policies.len(),
        &overlayable.opaque,
        |output, idx| {
            let policy = &overlayable.policies[idx];
            let mut handle = output.begin_chunk(ChunkType::TableOverlayablePolicy)?;
            le_u32(output, policy.flags)?;
            le_u32(output, count32(policy.entries.len(), "policy entries")?)?;
            output.end_header(&mut handle)?;
            for id in &policy.entries {
                le_u32(output, *id)?;
            }
            output.end_chunk(handle)?;
            Ok(())
        },
    )?;
    output.end_chunk(handle)?;
    Ok(())
}

fn write_staged_alias(output: &mut ChunkWriter, alias: &StagedAlias) -> ResourcesResult<()> {
    let mut handle = output.begin_chunk(ChunkType::TableStagedAlias)?;
    le_u32(output, count32(alias.entries.len(), "staged aliases")?)?;
    output.end_header(&mut handle)?;
    for entry in &alias.entries {
        le_u32(output, entry.stage_id)?;
        le_u32(output, entry.finalized_id)?;
    }
    output.end_chunk(handle)?;
    Ok(())
}

/*
 * Binary XML
 */

pub(crate) fn write_xml(output: &mut ChunkWriter, document: &XmlDocument) -> ResourcesResult<()> {
    if let Some(raw) = &document.preserved {
        bytes(output, raw)?;
        return Ok(());
    }

    let mut handle = output.begin_chunk(ChunkType::Xml)?;
    output.end_header(&mut handle)?;
    write_string_pool(output, &document.string_pool)?;
    if let Some(map) = &document.resource_map {
        let mut handle = output.begin_chunk(ChunkType::XmlResourceMap)?;
        output.end_header(&mut handle)?;
        for id in map {
            le_u32(output, *id)?;
        }
        output.end_chunk(handle)?;
    }
    for event in &document.body {
        write_xml_event(output, event)?;
    }
    output.end_chunk(handle)?;
    Ok(())
}

fn begin_node(
    output: &mut ChunkWriter,
    typ: ChunkType,
    node: &XmlNode,
) -> ResourcesResult<ChunkHandle> {
    let mut handle = output.begin_chunk(typ)?;
    le_u32(output, node.line)?;
    le_u32(output, opt_index(node.comment))?;
    output.end_header(&mut handle)?;
    Ok(handle)
}

fn write_xml_event(output: &mut ChunkWriter, event: &XmlEvent) -> ResourcesResult<()> {
    let handle = match event {
        XmlEvent::StartNamespace(ns) | XmlEvent::EndNamespace(ns) => {
            let typ = if matches!(event, XmlEvent::StartNamespace(_)) {
                ChunkType::XmlStartNamespace
            } else {
                ChunkType::XmlEndNamespace
            };
            let handle = begin_node(output, typ, &ns.node)?;
            le_u32(output, opt_index(ns.prefix))?;
            le_u32(output, opt_index(ns.uri))?;
            handle
        }
        XmlEvent::StartElement(elt) => {
            if elt.attribute_start < ATTRIBUTE_SIZE || elt.attribute_size < ATTRIBUTE_SIZE {
                return Err(ResourcesError::Internal(format!(
                    "attribute layout {:#x}/{:#x} is too small",
                    elt.attribute_start, elt.attribute_size
                )));
            }
            let attribute_count = u16::try_from(elt.attributes.len()).map_err(|_| {
                ResourcesError::Internal(format!("{} attributes", elt.attributes.len()))
            })?;
            let handle = begin_node(output, ChunkType::XmlStartElement, &elt.node)?;
            le_u32(output, opt_index(elt.ns))?;
            le_u32(output, index(elt.name)?)?;
            le_u16(output, elt.attribute_start)?;
            le_u16(output, elt.attribute_size)?;
            le_u16(output, attribute_count)?;
            le_u16(output, elt.id_index)?;
            le_u16(output, elt.class_index)?;
            le_u16(output, elt.style_index)?;
            zeros(output, usize::from(elt.attribute_start - ATTRIBUTE_SIZE))?;
            for attribute in &elt.attributes {
                le_u32(output, opt_index(attribute.ns))?;
                le_u32(output, index(attribute.name)?)?;
                le_u32(output, opt_index(attribute.raw_value))?;
                write_value(output, &attribute.value)?;
                zeros(output, usize::from(elt.attribute_size - ATTRIBUTE_SIZE))?;
            }
            handle
        }
        XmlEvent::EndElement(elt) => {
            let handle = begin_node(output, ChunkType::XmlEndElement, &elt.node)?;
            le_u32(output, opt_index(elt.ns))?;
            le_u32(output, index(elt.name)?)?;
            handle
        }
        XmlEvent::Cdata(cdata) => {
            let handle = begin_node(output, ChunkType::XmlCdata, &cdata.node)?;
            le_u32(output, index(cdata.data)?)?;
            write_value(output, &cdata.value)?;
            handle
        }
        XmlEvent::Opaque(chunk) => return write_opaque(output, chunk),
    };
    output.end_chunk(handle)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_length_encodings() {
        let mut out = Vec::new();
        utf8_length(&mut out, 0x7f).unwrap();
        utf8_length(&mut out, 0x80).unwrap();
        assert_eq!(out, [0x7f, 0x80, 0x80]);
        assert!(utf8_length(&mut Vec::new(), 0x8000).is_err());

        let mut out = Vec::new();
        utf16_length(&mut out, 0x7fff).unwrap();
        utf16_length(&mut out, 0x1_2345).unwrap();
        assert_eq!(out, [0xff, 0x7f, 0x01, 0x80, 0x45, 0x23]);
    }

    #[test]
    fn empty_utf8_pool_layout() {
        let bytes = encode_with(|w| write_string_pool(w, &StringPool::new(true))).unwrap();
        assert_eq!(
            bytes,
            [
                0x01, 0x00, 0x1c, 0x00, 0x1c, 0x00, 0x00, 0x00, // header
                0x00, 0x00, 0x00, 0x00, // strings
                0x00, 0x00, 0x00, 0x00, // styles
                0x00, 0x01, 0x00, 0x00, // utf8 flag
                0x1c, 0x00, 0x00, 0x00, // strings start
                0x00, 0x00, 0x00, 0x00, // styles start
            ]
        );
    }

    #[test]
    fn utf16_pool_layout() {
        let mut pool = StringPool::new(false);
        pool.push("ab");
        let bytes = encode_with(|w| write_string_pool(w, &pool)).unwrap();
        // header, one offset, then 2 + 4 + 2 bytes of string padded to 8
        assert_eq!(bytes.len(), 0x1c + 4 + 8);
        assert_eq!(&bytes[0x20..], [0x02, 0x00, 0x61, 0x00, 0x62, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn offset16_slots() {
        assert_eq!(offset16(0x10).unwrap(), 4);
        assert!(offset16(0x3).is_err());
        assert!(offset16(0x4_0000).is_err());
    }

    #[test]
    fn opaque_children_go_back_in_place() {
        let opaque = |position: usize| OpaqueChunk {
            typ: 0x7777,
            position,
            raw: vec![position as u8; 4],
        };
        let mut writer = ChunkWriter::new();
        write_children(&mut writer, 2, &[opaque(4), opaque(1)], |w, idx| {
            bytes(w, &[0xa0 + idx as u8; 4])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(
            writer.into_inner(),
            [
                0xa0, 0xa0, 0xa0, 0xa0, 1, 1, 1, 1, 0xa1, 0xa1, 0xa1, 0xa1, 4, 4, 4, 4
            ]
        );
    }
}
