use crate::chunk::{chunk_parser, chunks_parser, format_failure, Chunk, ChunkType, OpaqueChunk};
use crate::config::{Config, KNOWN_CONFIG_SIZE};
use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{
    Span, StringPool, StringPoolIndex, Style, UtfString, SORTED_FLAG, SPAN_END, UTF8_FLAG,
};
use crate::tables::{
    Configuration, Entry, EntryContent, Library, LibraryEntry, MapEntry, MapItem, Overlayable,
    OverlayablePolicy, Package, PackageChunk, ResType, ResourceTable, StagedAlias,
    StagedAliasEntry, TypeSpec, ENTRY_FLAG_COMPACT, ENTRY_FLAG_COMPLEX, NO_ENTRY, NO_ENTRY16,
    OVERLAYABLE_NAME_SIZE, PACKAGE_NAME_SIZE, TYPE_FLAG_OFFSET16, TYPE_FLAG_SPARSE,
};
use crate::values::Value;
use crate::writers;
use crate::xml::{
    XmlAttribute, XmlCdata, XmlDocument, XmlEndElement, XmlEvent, XmlNamespace, XmlNode,
    XmlStartElement,
};
use nom::bytes::complete::take;
use nom::combinator::complete;
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::tuple;
use nom::Err::Error;
use nom::{Finish, IResult};
use std::collections::BTreeMap;

/// Result of the parsers working on an already framed chunk.
type ChunkResult<T> = Result<T, nom::Err<ResourcesError>>;

/// Package header size of the build tools that append `typeIdOffset`.
const PACKAGE_HEADER_WITH_TYPE_ID_OFFSET: usize = 0x120;

pub fn parse_string_pool(input: &[u8]) -> ResourcesResult<StringPool> {
    let (rem, pool) = complete(string_pool_parser)(input).finish()?;
    no_trailing_bytes(rem, "string pool")?;
    Ok(pool)
}

pub fn parse_table(input: &[u8]) -> ResourcesResult<ResourceTable> {
    let (rem, table) = complete(table_parser)(input).finish()?;
    no_trailing_bytes(rem, "resource table")?;
    Ok(table)
}

pub fn parse_xml(input: &[u8]) -> ResourcesResult<XmlDocument> {
    let (rem, xml) = complete(xml_parser)(input).finish()?;
    no_trailing_bytes(rem, "XML document")?;
    Ok(xml)
}

fn no_trailing_bytes(rem: &[u8], what: &str) -> ResourcesResult<()> {
    if rem.is_empty() {
        Ok(())
    } else {
        log::error!("{} trailing bytes after the {what}", rem.len());
        Err(ResourcesError::Format(format!(
            "{} trailing bytes after the {what}",
            rem.len()
        )))
    }
}

fn expect_type(chunk: &Chunk, typ: ChunkType) -> ChunkResult<()> {
    if chunk.typ() == typ {
        Ok(())
    } else {
        Err(format_failure(format!(
            "expected a {typ} chunk, found {}",
            chunk.typ()
        )))
    }
}

/// Keeps the original bytes of a structure whose canonical encoding differs
/// from them.
fn keep_if_not_canonical(
    raw: &[u8],
    canonical: ResourcesResult<Vec<u8>>,
    what: &str,
) -> Option<Vec<u8>> {
    match canonical {
        Ok(bytes) if bytes == raw => None,
        Ok(bytes) => {
            log::warn!(
                "{what} is not in canonical layout ({} bytes, {} once re-encoded), keeping its bytes",
                raw.len(),
                bytes.len()
            );
            Some(raw.to_vec())
        }
        Err(err) => {
            log::warn!("{what} cannot be re-encoded ({err}), keeping its bytes");
            Some(raw.to_vec())
        }
    }
}

fn sub_slice<'a>(raw: &'a [u8], start: usize, end: usize, what: &str) -> ChunkResult<&'a [u8]> {
    if start <= end && end <= raw.len() {
        Ok(&raw[start..end])
    } else {
        Err(format_failure(format!(
            "{what} [{start:#x}..{end:#x}] is out of the {:#x} bytes chunk",
            raw.len()
        )))
    }
}

/*
 * String pool
 */

fn string_pool_parser(input: &[u8]) -> IResult<&[u8], StringPool, ResourcesError> {
    let (input, chunk) = chunk_parser(input)?;
    let pool = string_pool_chunk(&chunk)?;
    Ok((input, pool))
}

fn string_pool_chunk(chunk: &Chunk) -> ChunkResult<StringPool> {
    log::debug!(">> string_pool_chunk");
    expect_type(chunk, ChunkType::StringPool)?;

    let header = chunk.header_data();
    let (header, string_count) = le_u32(header)?;
    let (header, style_count) = le_u32(header)?;
    let (header, flags) = le_u32(header)?;
    let (header, strings_start) = le_u32(header)?;
    let (_, styles_start) = le_u32(header)?;
    log::debug!("string_pool::string_count = {}", string_count);
    log::debug!("string_pool::style_count = {}", style_count);
    log::debug!("string_pool::flags = {:#x}", flags);
    log::debug!("string_pool::strings_start = {:#x}", strings_start);
    log::debug!("string_pool::styles_start = {:#x}", styles_start);

    let raw = chunk.raw;
    let (indices, string_offsets) = count(le_u32, string_count as usize)(chunk.body())?;
    let (_, style_offsets) = count(le_u32, style_count as usize)(indices)?;

    let utf8 = flags & UTF8_FLAG != 0;
    let strings_start = strings_start as usize;
    let styles_start = styles_start as usize;
    let strings_end = if style_count > 0 && styles_start != 0 {
        styles_start
    } else {
        raw.len()
    };

    let mut strings = Vec::with_capacity(string_offsets.len());
    if !string_offsets.is_empty() {
        let data = sub_slice(raw, strings_start, strings_end, "string data")?;
        for offset in string_offsets {
            let offset = offset as usize;
            if offset >= data.len() {
                return Err(format_failure(format!(
                    "string offset {offset:#x} is out of the {:#x} bytes of string data",
                    data.len()
                )));
            }
            let (_, string) = if utf8 {
                utf8_string_parser(&data[offset..])?
            } else {
                utf16_string_parser(&data[offset..])?
            };
            strings.push(string);
        }
    }

    let mut styles = Vec::with_capacity(style_offsets.len());
    if !style_offsets.is_empty() {
        let data = sub_slice(raw, styles_start, raw.len(), "style data")?;
        for offset in style_offsets {
            let offset = offset as usize;
            if offset >= data.len() {
                return Err(format_failure(format!(
                    "style offset {offset:#x} is out of the {:#x} bytes of style data",
                    data.len()
                )));
            }
            let (_, style) = style_parser(&data[offset..])?;
            styles.push(style);
        }
    }

    let mut pool = StringPool {
        sorted: flags & SORTED_FLAG != 0,
        utf8,
        strings,
        styles,
        preserved: None,
    };
    let canonical = writers::encode_with(|w| writers::write_string_pool(w, &pool));
    pool.preserved = keep_if_not_canonical(raw, canonical, "string pool");

    log::debug!("<< string_pool_chunk");
    Ok(pool)
}

fn utf8_length_parser(input: &[u8]) -> IResult<&[u8], usize, ResourcesError> {
    let (input, first) = le_u8(input)?;
    if first & 0x80 == 0 {
        return Ok((input, usize::from(first)));
    }
    let (input, second) = le_u8(input)?;
    Ok((input, (usize::from(first & 0x7f) << 8) | usize::from(second)))
}

fn utf16_length_parser(input: &[u8]) -> IResult<&[u8], usize, ResourcesError> {
    let (input, first) = le_u16(input)?;
    if first & 0x8000 == 0 {
        return Ok((input, usize::from(first)));
    }
    let (input, second) = le_u16(input)?;
    Ok((input, (usize::from(first & 0x7fff) << 16) | usize::from(second)))
}

fn utf8_string_parser(input: &[u8]) -> IResult<&[u8], UtfString, ResourcesError> {
    let (input, size) = utf8_length_parser(input)?;
    let (input, len) = utf8_length_parser(input)?;
    let (input, raw) = take(len)(input)?;
    let input = match input.split_first() {
        Some((0, rem)) => rem,
        _ => {
            log::warn!("UTF-8 string of {len} bytes is not NUL terminated");
            input
        }
    };
    Ok((
        input,
        UtfString::Utf8 {
            raw: raw.to_vec(),
            size,
        },
    ))
}

fn utf16_string_parser(input: &[u8]) -> IResult<&[u8], UtfString, ResourcesError> {
    let (input, len) = utf16_length_parser(input)?;
    let (input, raw) = count(le_u16, len)(input)?;
    let input = match input {
        [0, 0, rem @ ..] => rem,
        _ => {
            log::warn!("UTF-16 string of {len} units is not NUL terminated");
            input
        }
    };
    Ok((input, UtfString::Utf16 { raw }))
}

fn style_parser(input: &[u8]) -> IResult<&[u8], Style, ResourcesError> {
    let mut spans = Vec::new();
    let mut input_mut = input;
    loop {
        let (input, name) = le_u32(input_mut)?;
        if name == SPAN_END {
            return Ok((input, Style { spans }));
        }
        let (input, first_char) = le_u32(input)?;
        let (input, last_char) = le_u32(input)?;
        spans.push(Span {
            name,
            first_char,
            last_char,
        });
        input_mut = input;
    }
}

/*
 * Values
 */

fn value_parser(input: &[u8]) -> IResult<&[u8], Value, ResourcesError> {
    let (input, size) = le_u16(input)?;
    let (input, _res0) = le_u8(input)?;
    let (input, data_type) = le_u8(input)?;
    let (input, data) = le_u32(input)?;
    // larger values are followed by bytes this format revision ignores
    let (input, _) = take(usize::from(size).saturating_sub(8))(input)?;
    let value = Value::from_raw(data_type, data).map_err(Error)?;
    Ok((input, value))
}

/*
 * Resource table
 */

fn table_parser(input: &[u8]) -> IResult<&[u8], ResourceTable, ResourcesError> {
    log::debug!(">> table_parser");
    let (input, chunk) = chunk_parser(input)?;
    expect_type(&chunk, ChunkType::Table)?;
    let (_, package_count) = le_u32(chunk.header_data())?;
    log::debug!("table::package_count = {}", package_count);

    let mut string_pool = None;
    let mut packages: Vec<Package> = Vec::with_capacity(package_count.min(0xff) as usize);
    let mut opaque = Vec::new();
    for (position, child) in chunks_parser(chunk.body())?.iter().enumerate() {
        match child.typ() {
            ChunkType::StringPool if string_pool.is_none() => {
                string_pool = Some(string_pool_chunk(child)?);
            }
            ChunkType::TablePackage => {
                let package = package_chunk(child)?;
                if packages.iter().any(|p| p.id == package.id) {
                    return Err(format_failure(format!(
                        "package {:#04x} is defined twice",
                        package.id
                    )));
                }
                packages.push(package);
            }
            _ => opaque.push(OpaqueChunk::new(child, position)),
        }
    }

    let string_pool = string_pool
        .ok_or_else(|| format_failure("resource table has no value string pool".to_string()))?;
    if packages.len() != package_count as usize {
        log::warn!(
            "resource table declares {} packages but contains {}",
            package_count,
            packages.len()
        );
    }

    log::debug!("<< table_parser");
    Ok((
        input,
        ResourceTable {
            string_pool,
            packages,
            opaque,
        },
    ))
}

fn package_chunk(chunk: &Chunk) -> ChunkResult<Package> {
    log::debug!(">> package_chunk");
    let header = chunk.header_data();
    let (header, id) = le_u32(header)?;
    let (header, name) = count(le_u16, PACKAGE_NAME_SIZE)(header)?;
    let (header, type_strings_offset) = le_u32(header)?;
    let (header, last_public_type) = le_u32(header)?;
    let (header, key_strings_offset) = le_u32(header)?;
    let (header, last_public_key) = le_u32(header)?;
    let type_id_offset = if chunk.header.header_size >= PACKAGE_HEADER_WITH_TYPE_ID_OFFSET {
        Some(le_u32(header)?.1)
    } else {
        None
    };
    log::debug!("package::id = {:#x}", id);
    log::debug!("package::type_strings = {:#x}", type_strings_offset);
    log::debug!("package::key_strings = {:#x}", key_strings_offset);

    let id = u8::try_from(id)
        .map_err(|_| format_failure(format!("package id {id:#x} does not fit a byte")))?;

    let type_strings_offset = type_strings_offset as usize;
    let key_strings_offset = key_strings_offset as usize;
    let mut offset = chunk.header.header_size;
    if type_strings_offset > offset {
        if starts_string_pool(chunk.raw, type_strings_offset) {
            log::warn!(
                "skipping {} bytes between the package header and its type strings",
                type_strings_offset - offset
            );
            offset = type_strings_offset;
        } else {
            log::warn!(
                "package {id:#04x} type strings offset {type_strings_offset:#x} is bogus, ignoring it"
            );
        }
    }

    let mut type_strings = None;
    let mut key_strings = None;
    let mut types: BTreeMap<u8, ResType> = BTreeMap::new();
    let mut libraries = Vec::new();
    let mut overlayables = Vec::new();
    let mut staged_aliases = Vec::new();
    let mut opaque = Vec::new();
    let mut layout = Vec::new();
    let mut position = 0;
    while offset < chunk.raw.len() {
        let (_, child) = chunk_parser(&chunk.raw[offset..])?;
        match child.typ() {
            // The first two pools are the type and key strings, whatever
            // the header offsets say.
            ChunkType::StringPool if type_strings.is_none() => {
                if offset != type_strings_offset {
                    log::warn!(
                        "package {id:#04x} type strings found at {offset:#x}, header says {type_strings_offset:#x}"
                    );
                }
                type_strings = Some(string_pool_chunk(&child)?);
            }
            ChunkType::StringPool if key_strings.is_none() => {
                if offset != key_strings_offset {
                    log::warn!(
                        "package {id:#04x} key strings found at {offset:#x}, header says {key_strings_offset:#x}"
                    );
                }
                key_strings = Some(string_pool_chunk(&child)?);
            }
            ChunkType::TableTypeSpec => {
                let (type_id, spec) = type_spec_chunk(&child)?;
                let res_type = types.entry(type_id).or_insert_with(|| ResType {
                    id: type_id,
                    spec: None,
                    configs: Vec::new(),
                });
                if res_type.spec.replace(spec).is_some() {
                    return Err(format_failure(format!(
                        "type {type_id:#04x} has two type spec chunks"
                    )));
                }
                layout.push(PackageChunk::TypeSpec(type_id));
            }
            ChunkType::TableType => {
                let (type_id, configuration) = type_chunk(&child)?;
                let res_type = types.entry(type_id).or_insert_with(|| ResType {
                    id: type_id,
                    spec: None,
                    configs: Vec::new(),
                });
                res_type.configs.push(configuration);
                layout.push(PackageChunk::Type(type_id, res_type.configs.len() - 1));
            }
            ChunkType::TableLibrary => {
                libraries.push(library_chunk(&child)?);
                layout.push(PackageChunk::Library(libraries.len() - 1));
            }
            ChunkType::TableOverlayable => {
                overlayables.push(overlayable_chunk(&child)?);
                layout.push(PackageChunk::Overlayable(overlayables.len() - 1));
            }
            ChunkType::TableStagedAlias => {
                staged_aliases.push(staged_alias_chunk(&child)?);
                layout.push(PackageChunk::StagedAlias(staged_aliases.len() - 1));
            }
            _ => {
                opaque.push(OpaqueChunk::new(&child, position));
                layout.push(PackageChunk::Opaque(opaque.len() - 1));
            }
        }
        offset += child.raw.len();
        position += 1;
    }

    let type_strings = type_strings
        .ok_or_else(|| format_failure(format!("package {id:#04x} has no type strings")))?;
    let key_strings = key_strings
        .ok_or_else(|| format_failure(format!("package {id:#04x} has no key strings")))?;

    let mut package = Package {
        id,
        name,
        last_public_type,
        last_public_key,
        type_id_offset,
        type_strings,
        key_strings,
        types,
        libraries,
        overlayables,
        staged_aliases,
        opaque,
        layout,
        preserved: None,
    };
    let canonical = writers::encode_with(|w| writers::write_package(w, &package));
    package.preserved = keep_if_not_canonical(chunk.raw, canonical, "package");

    log::debug!("<< package_chunk");
    Ok(package)
}

fn starts_string_pool(raw: &[u8], offset: usize) -> bool {
    raw.get(offset..).map_or(false, |rest| {
        matches!(chunk_parser(rest), Ok((_, child)) if child.typ() == ChunkType::StringPool)
    })
}

fn type_spec_chunk(chunk: &Chunk) -> ChunkResult<(u8, TypeSpec)> {
    log::debug!(">> type_spec_chunk");
    let header = chunk.header_data();
    let (header, id) = le_u8(header)?;
    let (header, res0) = le_u8(header)?;
    let (header, types_count) = le_u16(header)?;
    let (_, entry_count) = le_u32(header)?;
    log::debug!("type_spec::id = {:#x}", id);
    log::debug!("type_spec::entry_count = {}", entry_count);

    if id == 0 {
        return Err(format_failure("type spec with type id 0".to_string()));
    }
    let (_, flags) = count(le_u32, entry_count as usize)(chunk.body())?;

    Ok((
        id,
        TypeSpec {
            res0,
            types_count,
            flags,
        },
    ))
}

fn config_parser(input: &[u8]) -> IResult<&[u8], Config, ResourcesError> {
    let (input, size) = le_u32(input)?;
    log::debug!("config::size = {}", size);
    if size < 8 {
        return Err(format_failure(format!(
            "configuration size {size} is too small"
        )));
    }
    let (input, fields) = take(size as usize - 4)(input)?;

    let mut known = [0u8; KNOWN_CONFIG_SIZE - 4];
    let len = fields.len().min(known.len());
    known[..len].copy_from_slice(&fields[..len]);
    let extra = fields[len..].to_vec();

    let (i, mcc) = le_u16(&known[..])?;
    let (i, mnc) = le_u16(i)?;
    let (i, language) = take(2usize)(i)?;
    let (i, region) = take(2usize)(i)?;
    let (i, orientation) = le_u8(i)?;
    let (i, touchscreen) = le_u8(i)?;
    let (i, density) = le_u16(i)?;
    let (i, keyboard) = le_u8(i)?;
    let (i, navigation) = le_u8(i)?;
    let (i, input_flags) = le_u8(i)?;
    let (i, grammatical_inflection) = le_u8(i)?;
    let (i, screen_width) = le_u16(i)?;
    let (i, screen_height) = le_u16(i)?;
    let (i, sdk_version) = le_u16(i)?;
    let (i, minor_version) = le_u16(i)?;
    let (i, screen_layout) = le_u8(i)?;
    let (i, ui_mode) = le_u8(i)?;
    let (i, smallest_screen_width_dp) = le_u16(i)?;
    let (i, screen_width_dp) = le_u16(i)?;
    let (i, screen_height_dp) = le_u16(i)?;
    let (i, locale_script) = take(4usize)(i)?;
    let (i, locale_variant) = take(8usize)(i)?;
    let (i, screen_layout2) = le_u8(i)?;
    let (i, color_mode) = le_u8(i)?;
    let (_, screen_config_pad2) = le_u16(i)?;

    let mut config = Config {
        size,
        mcc,
        mnc,
        orientation,
        touchscreen,
        density,
        keyboard,
        navigation,
        input_flags,
        grammatical_inflection,
        screen_width,
        screen_height,
        sdk_version,
        minor_version,
        screen_layout,
        ui_mode,
        smallest_screen_width_dp,
        screen_width_dp,
        screen_height_dp,
        screen_layout2,
        color_mode,
        screen_config_pad2,
        extra,
        ..Config::default()
    };
    config.language.copy_from_slice(language);
    config.region.copy_from_slice(region);
    config.locale_script.copy_from_slice(locale_script);
    config.locale_variant.copy_from_slice(locale_variant);
    log::debug!("config = {}", config);

    Ok((input, config))
}

fn type_chunk(chunk: &Chunk) -> ChunkResult<(u8, Configuration)> {
    log::debug!(">> type_chunk");
    let header = chunk.header_data();
    let (header, id) = le_u8(header)?;
    let (header, flags) = le_u8(header)?;
    let (header, reserved) = le_u16(header)?;
    let (header, entry_count) = le_u32(header)?;
    let (header, entries_start) = le_u32(header)?;
    let (_, config) = config_parser(header)?;
    log::debug!("type::id = {:#x}", id);
    log::debug!("type::flags = {:#x}", flags);
    log::debug!("type::entry_count = {}", entry_count);
    log::debug!("type::entries_start = {:#x}", entries_start);

    if id == 0 {
        return Err(format_failure("type chunk with type id 0".to_string()));
    }

    let body = chunk.body();
    let n = entry_count as usize;
    let mut offsets: Vec<(usize, usize)> = Vec::new();
    if flags & TYPE_FLAG_SPARSE != 0 {
        let (_, pairs) = count(tuple((le_u16, le_u16)), n)(body)?;
        offsets.extend(
            pairs
                .into_iter()
                .map(|(idx, offset)| (usize::from(idx), usize::from(offset) * 4)),
        );
    } else if flags & TYPE_FLAG_OFFSET16 != 0 {
        let (_, slots) = count(le_u16, n)(body)?;
        offsets.extend(
            slots
                .into_iter()
                .enumerate()
                .filter(|(_, offset)| *offset != NO_ENTRY16)
                .map(|(idx, offset)| (idx, usize::from(offset) * 4)),
        );
    } else {
        let (_, slots) = count(le_u32, n)(body)?;
        offsets.extend(
            slots
                .into_iter()
                .enumerate()
                .filter(|(_, offset)| *offset != NO_ENTRY)
                .map(|(idx, offset)| (idx, offset as usize)),
        );
    }

    let data = sub_slice(chunk.raw, entries_start as usize, chunk.raw.len(), "entries")?;
    let mut entries = BTreeMap::new();
    for (idx, offset) in offsets {
        let entry_id = u16::try_from(idx)
            .map_err(|_| format_failure(format!("entry index {idx} does not fit 16 bits")))?;
        if offset >= data.len() {
            return Err(format_failure(format!(
                "entry {entry_id} offset {offset:#x} is out of the {:#x} bytes of entries",
                data.len()
            )));
        }
        let (_, entry) = entry_parser(&data[offset..])?;
        if entries.insert(entry_id, entry).is_some() {
            return Err(format_failure(format!("entry {entry_id} is defined twice")));
        }
    }

    let mut configuration = Configuration {
        flags,
        reserved,
        config,
        entry_count,
        entries,
        preserved: None,
    };
    let canonical = writers::encode_with(|w| writers::write_type(w, id, &configuration));
    configuration.preserved = keep_if_not_canonical(chunk.raw, canonical, "type chunk");

    log::debug!("<< type_chunk");
    Ok((id, configuration))
}

fn entry_parser(input: &[u8]) -> IResult<&[u8], Entry, ResourcesError> {
    let (input, size) = le_u16(input)?;
    let (input, flags) = le_u16(input)?;
    let (input, key) = le_u32(input)?;

    if flags & ENTRY_FLAG_COMPACT != 0 {
        // key index in the size field, value type in the high byte of the
        // flags and value data in the key field
        let value = Value::from_raw((flags >> 8) as u8, key).map_err(Error)?;
        return Ok((
            input,
            Entry {
                flags,
                key: StringPoolIndex::new(usize::from(size)),
                content: EntryContent::Value(value),
            },
        ));
    }

    let key = StringPoolIndex::new(key as usize);
    if flags & ENTRY_FLAG_COMPLEX != 0 {
        let (input, parent) = le_u32(input)?;
        let (input, item_count) = le_u32(input)?;
        let (input, _) = take(usize::from(size).saturating_sub(16))(input)?;
        let (input, items) = count(map_item_parser, item_count as usize)(input)?;
        Ok((
            input,
            Entry {
                flags,
                key,
                content: EntryContent::Map(MapEntry { parent, items }),
            },
        ))
    } else {
        let (input, _) = take(usize::from(size).saturating_sub(8))(input)?;
        let (input, value) = value_parser(input)?;
        Ok((
            input,
            Entry {
                flags,
                key,
                content: EntryContent::Value(value),
            },
        ))
    }
}

fn map_item_parser(input: &[u8]) -> IResult<&[u8], MapItem, ResourcesError> {
    let (input, name) = le_u32(input)?;
    let (input, value) = value_parser(input)?;
    Ok((input, MapItem { name, value }))
}

fn library_chunk(chunk: &Chunk) -> ChunkResult<Library> {
    log::debug!(">> library_chunk");
    let (_, entry_count) = le_u32(chunk.header_data())?;
    log::debug!("library::entry_count = {}", entry_count);
    let (_, entries) = count(library_entry_parser, entry_count as usize)(chunk.body())?;
    Ok(Library { entries })
}

fn library_entry_parser(input: &[u8]) -> IResult<&[u8], LibraryEntry, ResourcesError> {
    let (input, id) = le_u32(input)?;
    let (input, name) = count(le_u16, PACKAGE_NAME_SIZE)(input)?;
    Ok((input, LibraryEntry { id, name }))
}

fn overlayable_chunk(chunk: &Chunk) -> ChunkResult<Overlayable> {
    log::debug!(">> overlayable_chunk");
    let header = chunk.header_data();
    let (header, name) = count(le_u16, OVERLAYABLE_NAME_SIZE)(header)?;
    let (_, actor) = count(le_u16, OVERLAYABLE_NAME_SIZE)(header)?;

    let mut policies = Vec::new();
    let mut opaque = Vec::new();
    for (position, child) in chunks_parser(chunk.body())?.iter().enumerate() {
        if child.typ() == ChunkType::TableOverlayablePolicy {
            let header = child.header_data();
            let (header, flags) = le_u32(header)?;
            let (_, entry_count) = le_u32(header)?;
            let (_, entries) = count(le_u32, entry_count as usize)(child.body())?;
            policies.push(OverlayablePolicy { flags, entries });
        } else {
            opaque.push(OpaqueChunk::new(child, position));
        }
    }

    Ok(Overlayable {
        name,
        actor,
        policies,
        opaque,
    })
}

fn staged_alias_chunk(chunk: &Chunk) -> ChunkResult<StagedAlias> {
    log::debug!(">> staged_alias_chunk");
    let (_, entry_count) = le_u32(chunk.header_data())?;
    let (_, pairs) = count(tuple((le_u32, le_u32)), entry_count as usize)(chunk.body())?;
    let entries = pairs
        .into_iter()
        .map(|(stage_id, finalized_id)| StagedAliasEntry {
            stage_id,
            finalized_id,
        })
        .collect();
    Ok(StagedAlias { entries })
}

/*
 * Binary XML
 */

fn xml_parser(input: &[u8]) -> IResult<&[u8], XmlDocument, ResourcesError> {
    log::debug!(">> xml_parser");
    let (input, chunk) = chunk_parser(input)?;
    expect_type(&chunk, ChunkType::Xml)?;

    let mut string_pool = None;
    let mut resource_map = None;
    let mut body = Vec::new();
    for (position, child) in chunks_parser(chunk.body())?.iter().enumerate() {
        match child.typ() {
            ChunkType::StringPool if string_pool.is_none() && body.is_empty() => {
                string_pool = Some(string_pool_chunk(child)?);
            }
            ChunkType::XmlResourceMap if resource_map.is_none() && body.is_empty() => {
                let (_, ids) = count(le_u32, child.body().len() / 4)(child.body())?;
                log::debug!("xml::resource_map = {} ids", ids.len());
                resource_map = Some(ids);
            }
            ChunkType::XmlStartNamespace
            | ChunkType::XmlEndNamespace
            | ChunkType::XmlStartElement
            | ChunkType::XmlEndElement
            | ChunkType::XmlCdata => body.push(xml_node_chunk(child)?),
            _ => body.push(XmlEvent::Opaque(OpaqueChunk::new(child, position))),
        }
    }

    let string_pool = string_pool
        .ok_or_else(|| format_failure("XML document has no string pool".to_string()))?;
    let mut document = XmlDocument::new(string_pool, resource_map, body).map_err(Error)?;
    let canonical = writers::encode_with(|w| writers::write_xml(w, &document));
    document.preserved = keep_if_not_canonical(chunk.raw, canonical, "XML document");

    log::debug!("<< xml_parser");
    Ok((input, document))
}

fn xml_node_chunk(chunk: &Chunk) -> ChunkResult<XmlEvent> {
    let header = chunk.header_data();
    let (header, line) = le_u32(header)?;
    let (_, comment) = le_u32(header)?;
    let node = XmlNode {
        line,
        comment: StringPoolIndex::from_raw(comment),
    };
    log::debug!("xml::{} line {}", chunk.typ(), line);

    let body = chunk.body();
    let event = match chunk.typ() {
        ChunkType::XmlStartNamespace | ChunkType::XmlEndNamespace => {
            let (body, prefix) = le_u32(body)?;
            let (_, uri) = le_u32(body)?;
            let ns = XmlNamespace {
                node,
                prefix: StringPoolIndex::from_raw(prefix),
                uri: StringPoolIndex::from_raw(uri),
            };
            if chunk.typ() == ChunkType::XmlStartNamespace {
                XmlEvent::StartNamespace(ns)
            } else {
                XmlEvent::EndNamespace(ns)
            }
        }
        ChunkType::XmlStartElement => XmlEvent::StartElement(start_element(node, body)?),
        ChunkType::XmlEndElement => {
            let (body, ns) = le_u32(body)?;
            let (_, name) = le_u32(body)?;
            XmlEvent::EndElement(XmlEndElement {
                node,
                ns: StringPoolIndex::from_raw(ns),
                name: StringPoolIndex::new(name as usize),
            })
        }
        ChunkType::XmlCdata => {
            let (body, data) = le_u32(body)?;
            let (_, value) = value_parser(body)?;
            XmlEvent::Cdata(XmlCdata {
                node,
                data: StringPoolIndex::new(data as usize),
                value,
            })
        }
        typ => return Err(format_failure(format!("{typ} is not an XML node"))),
    };
    Ok(event)
}

fn start_element(node: XmlNode, body: &[u8]) -> ChunkResult<XmlStartElement> {
    let (i, ns) = le_u32(body)?;
    let (i, name) = le_u32(i)?;
    let (i, attribute_start) = le_u16(i)?;
    let (i, attribute_size) = le_u16(i)?;
    let (i, attribute_count) = le_u16(i)?;
    let (i, id_index) = le_u16(i)?;
    let (i, class_index) = le_u16(i)?;
    let (_, style_index) = le_u16(i)?;
    log::debug!("xml::start_element::attribute_count = {}", attribute_count);

    let mut attributes = Vec::with_capacity(usize::from(attribute_count));
    for n in 0..usize::from(attribute_count) {
        let at = usize::from(attribute_start) + n * usize::from(attribute_size);
        let record = sub_slice(body, at, body.len(), "attribute")?;
        let (record, ns) = le_u32(record)?;
        let (record, name) = le_u32(record)?;
        let (record, raw_value) = le_u32(record)?;
        let (_, value) = value_parser(record)?;
        attributes.push(XmlAttribute {
            ns: StringPoolIndex::from_raw(ns),
            name: StringPoolIndex::new(name as usize),
            raw_value: StringPoolIndex::from_raw(raw_value),
            value,
        });
    }

    Ok(XmlStartElement {
        node,
        ns: StringPoolIndex::from_raw(ns),
        name: StringPoolIndex::new(name as usize),
        attribute_start,
        attribute_size,
        id_index,
        class_index,
        style_index,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkWriter;
    use crate::values::TYPE_INT_DEC;

    fn utf8_pool(strings: &[&str]) -> StringPool {
        let mut pool = StringPool::new(true);
        for s in strings {
            pool.push(s);
        }
        pool
    }

    #[test]
    fn string_pool_utf8_and_utf16() {
        for utf8 in [true, false] {
            let mut pool = StringPool::new(utf8);
            pool.push("hello");
            pool.push("");
            pool.push("h\u{e9}llo \u{1f600}");
            let bytes = writers::encode_with(|w| writers::write_string_pool(w, &pool)).unwrap();
            let decoded = parse_string_pool(&bytes).unwrap();
            assert!(!decoded.is_preserved());
            assert_eq!(decoded.len(), 3);
            assert_eq!(decoded.string(StringPoolIndex::new(0)).unwrap(), "hello");
            assert_eq!(decoded.string(StringPoolIndex::new(1)).unwrap(), "");
            assert_eq!(
                decoded.string(StringPoolIndex::new(2)).unwrap(),
                "h\u{e9}llo \u{1f600}"
            );
        }
    }

    #[test]
    fn string_pool_long_utf8_string() {
        let long = "x".repeat(300);
        let pool = utf8_pool(&[&long]);
        let bytes = writers::encode_with(|w| writers::write_string_pool(w, &pool)).unwrap();
        // two bytes for each length
        assert_eq!(&bytes[0x20..0x24], [0x81, 0x2c, 0x81, 0x2c]);
        let decoded = parse_string_pool(&bytes).unwrap();
        assert_eq!(decoded.string(StringPoolIndex::new(0)).unwrap(), long);
    }

    #[test]
    fn string_pool_offset_out_of_bounds() {
        let pool = utf8_pool(&["a", "b"]);
        let mut bytes = writers::encode_with(|w| writers::write_string_pool(w, &pool)).unwrap();
        // second string offset
        bytes[0x20..0x24].copy_from_slice(&0x40u32.to_le_bytes());
        assert!(parse_string_pool(&bytes).unwrap_err().is_format_error());
    }

    #[test]
    fn string_pool_length_overrun() {
        let pool = utf8_pool(&["abc"]);
        let mut bytes = writers::encode_with(|w| writers::write_string_pool(w, &pool)).unwrap();
        bytes[0x21] = 0x7f;
        assert!(parse_string_pool(&bytes).unwrap_err().is_format_error());
    }

    #[test]
    fn string_pool_with_styles() {
        let mut pool = utf8_pool(&["bold text", "b"]);
        pool.set_style(
            StringPoolIndex::new(0),
            Style {
                spans: vec![Span {
                    name: 1,
                    first_char: 0,
                    last_char: 3,
                }],
            },
        )
        .unwrap();
        let bytes = writers::encode_with(|w| writers::write_string_pool(w, &pool)).unwrap();
        let decoded = parse_string_pool(&bytes).unwrap();
        assert!(!decoded.is_preserved());
        assert_eq!(decoded.styles(), pool.styles());
        assert_eq!(writers::encode_with(|w| writers::write_string_pool(w, &decoded)).unwrap(), bytes);
    }

    #[test]
    fn non_canonical_pool_is_preserved() {
        let pool = utf8_pool(&["abc"]);
        let mut bytes = writers::encode_with(|w| writers::write_string_pool(w, &pool)).unwrap();
        // flag bit unknown to the canonical writer
        bytes[0x10] |= 0x02;
        let decoded = parse_string_pool(&bytes).unwrap();
        assert!(decoded.is_preserved());
        assert_eq!(writers::encode_with(|w| writers::write_string_pool(w, &decoded)).unwrap(), bytes);
    }

    #[test]
    fn config_sizes() {
        let mut known = vec![0u8; 60];
        known[..4].copy_from_slice(&28u32.to_le_bytes());
        // mcc
        known[4..6].copy_from_slice(&310u16.to_le_bytes());
        let (rem, config) = config_parser(&known).unwrap();
        assert_eq!(rem.len(), 32);
        assert_eq!(config.size, 28);
        assert_eq!(config.mcc, 310);
        assert!(config.extra.is_empty());

        let mut large = vec![0u8; 60];
        large[..4].copy_from_slice(&60u32.to_le_bytes());
        large[56] = 0x42;
        let (rem, config) = config_parser(&large).unwrap();
        assert!(rem.is_empty());
        assert_eq!(config.extra, [0, 0, 0, 0, 0x42, 0, 0, 0]);

        let mut small = vec![0u8; 8];
        small[0] = 4;
        assert!(config_parser(&small).is_err());
    }

    #[test]
    fn compact_entry() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7u16.to_le_bytes());
        bytes.extend_from_slice(&(ENTRY_FLAG_COMPACT | (u16::from(TYPE_INT_DEC) << 8)).to_le_bytes());
        bytes.extend_from_slice(&42u32.to_le_bytes());
        let (_, entry) = entry_parser(&bytes).unwrap();
        assert!(entry.is_compact());
        assert_eq!(entry.key(), StringPoolIndex::new(7));
        assert_eq!(entry.content, EntryContent::Value(Value::IntDec(42)));
    }

    #[test]
    fn unknown_value_type() {
        let bytes = [0x08, 0x00, 0x00, 0x42, 0x00, 0x00, 0x00, 0x00];
        assert!(value_parser(&bytes).is_err());
    }

    #[test]
    fn xml_requires_string_pool() {
        let mut writer = ChunkWriter::new();
        let mut handle = writer.begin_chunk(ChunkType::Xml).unwrap();
        writer.end_header(&mut handle).unwrap();
        writer.end_chunk(handle).unwrap();
        assert!(parse_xml(&writer.into_inner()).unwrap_err().is_format_error());
    }

    #[test]
    fn trailing_bytes() {
        let pool = utf8_pool(&["a"]);
        let mut bytes = writers::encode_with(|w| writers::write_string_pool(w, &pool)).unwrap();
        bytes.extend_from_slice(&[0; 4]);
        assert!(parse_string_pool(&bytes).unwrap_err().is_format_error());
    }
}
