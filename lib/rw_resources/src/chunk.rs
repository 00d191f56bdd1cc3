//! Generic chunk framing shared by every structure of the binary format.
//!
//! A chunk starts with an 8-byte header (`type:u16`, `header_size:u16`,
//! `size:u32`), followed by the rest of its type-specific header and its
//! body. All integers are little-endian and every chunk is 4-bytes aligned.

use crate::errors::{ResourcesError, ResourcesResult};
use nom::bytes::complete::take;
use nom::number::complete::{le_u16, le_u32};
use nom::{Finish, IResult};
use rw_utils::writers;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Cursor, Seek, SeekFrom, Write};

pub const CHUNK_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub enum ChunkType {
    Null,
    StringPool,
    Table,
    Xml,
    XmlStartNamespace,
    XmlEndNamespace,
    XmlStartElement,
    XmlEndElement,
    XmlCdata,
    XmlResourceMap,
    TablePackage,
    TableType,
    TableTypeSpec,
    TableLibrary,
    TableOverlayable,
    TableOverlayablePolicy,
    TableStagedAlias,
    Unknown(u16),
}

impl ChunkType {
    /// Smallest header size a well-formed chunk of this type can declare.
    #[must_use]
    pub const fn min_header_size(self) -> usize {
        match self {
            Self::Null | Self::Xml | Self::XmlResourceMap | Self::Unknown(_) => 0x08,
            Self::Table | Self::TableLibrary | Self::TableStagedAlias => 0x0c,
            Self::XmlStartNamespace
            | Self::XmlEndNamespace
            | Self::XmlStartElement
            | Self::XmlEndElement
            | Self::XmlCdata
            | Self::TableTypeSpec
            | Self::TableOverlayablePolicy => 0x10,
            Self::StringPool => 0x1c,
            // 20 bytes of type header followed by at least the config size
            // field and the imsi fields
            Self::TableType => 0x1c,
            Self::TablePackage => 0x11c,
            Self::TableOverlayable => 0x408,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "RES_NULL_TYPE"),
            Self::StringPool => write!(f, "RES_STRING_POOL_TYPE"),
            Self::Table => write!(f, "RES_TABLE_TYPE"),
            Self::Xml => write!(f, "RES_XML_TYPE"),
            Self::XmlStartNamespace => write!(f, "RES_XML_START_NAMESPACE_TYPE"),
            Self::XmlEndNamespace => write!(f, "RES_XML_END_NAMESPACE_TYPE"),
            Self::XmlStartElement => write!(f, "RES_XML_START_ELEMENT_TYPE"),
            Self::XmlEndElement => write!(f, "RES_XML_END_ELEMENT_TYPE"),
            Self::XmlCdata => write!(f, "RES_XML_CDATA_TYPE"),
            Self::XmlResourceMap => write!(f, "RES_XML_RESOURCE_MAP_TYPE"),
            Self::TablePackage => write!(f, "RES_TABLE_PACKAGE_TYPE"),
            Self::TableType => write!(f, "RES_TABLE_TYPE_TYPE"),
            Self::TableTypeSpec => write!(f, "RES_TABLE_TYPE_SPEC_TYPE"),
            Self::TableLibrary => write!(f, "RES_TABLE_LIBRARY_TYPE"),
            Self::TableOverlayable => write!(f, "RES_TABLE_OVERLAYABLE"),
            Self::TableOverlayablePolicy => write!(f, "RES_TABLE_OVERLAYABLE_POLICY"),
            Self::TableStagedAlias => write!(f, "RES_TABLE_STAGED_ALIAS"),
            Self::Unknown(v) => write!(f, "UNKNOWN({v:#06x})"),
        }
    }
}

impl From<u16> for ChunkType {
    fn from(v: u16) -> Self {
        match v {
            0x0000 => Self::Null,
            0x0001 => Self::StringPool,
            0x0002 => Self::Table,
            0x0003 => Self::Xml,
            0x0100 => Self::XmlStartNamespace,
            0x0101 => Self::XmlEndNamespace,
            0x0102 => Self::XmlStartElement,
            0x0103 => Self::XmlEndElement,
            0x0104 => Self::XmlCdata,
            0x0180 => Self::XmlResourceMap,
            0x0200 => Self::TablePackage,
            0x0201 => Self::TableType,
            0x0202 => Self::TableTypeSpec,
            0x0203 => Self::TableLibrary,
            0x0204 => Self::TableOverlayable,
            0x0205 => Self::TableOverlayablePolicy,
            0x0206 => Self::TableStagedAlias,
            v => Self::Unknown(v),
        }
    }
}

impl From<ChunkType> for u16 {
    fn from(chunk_type: ChunkType) -> Self {
        match chunk_type {
            ChunkType::Null => 0x0000,
            ChunkType::StringPool => 0x0001,
            ChunkType::Table => 0x0002,
            ChunkType::Xml => 0x0003,
            ChunkType::XmlStartNamespace => 0x0100,
            ChunkType::XmlEndNamespace => 0x0101,
            ChunkType::XmlStartElement => 0x0102,
            ChunkType::XmlEndElement => 0x0103,
            ChunkType::XmlCdata => 0x0104,
            ChunkType::XmlResourceMap => 0x0180,
            ChunkType::TablePackage => 0x0200,
            ChunkType::TableType => 0x0201,
            ChunkType::TableTypeSpec => 0x0202,
            ChunkType::TableLibrary => 0x0203,
            ChunkType::TableOverlayable => 0x0204,
            ChunkType::TableOverlayablePolicy => 0x0205,
            ChunkType::TableStagedAlias => 0x0206,
            ChunkType::Unknown(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub typ: ChunkType,
    pub header_size: usize,
    pub chunk_size: usize,
}

/// A framed chunk borrowed from the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub header: ChunkHeader,
    /// Whole chunk, common header included.
    pub raw: &'a [u8],
}

impl<'a> Chunk<'a> {
    #[must_use]
    pub const fn typ(&self) -> ChunkType {
        self.header.typ
    }

    /// Type-specific header bytes, located after the 8-byte common header.
    #[must_use]
    pub fn header_data(&self) -> &'a [u8] {
        &self.raw[CHUNK_HEADER_SIZE..self.header.header_size]
    }

    /// Chunk content, after the complete header.
    #[must_use]
    pub fn body(&self) -> &'a [u8] {
        &self.raw[self.header.header_size..]
    }
}

/// A chunk the codec does not interpret, kept verbatim so that it can be
/// re-emitted unchanged. `position` is the index of the chunk among the
/// children of its parent, which is where the writers put it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueChunk {
    pub typ: u16,
    pub position: usize,
    pub raw: Vec<u8>,
}

impl OpaqueChunk {
    pub(crate) fn new(chunk: &Chunk, position: usize) -> Self {
        log::warn!(
            "keeping unsupported chunk {} ({} bytes) verbatim",
            chunk.typ(),
            chunk.raw.len()
        );
        Self {
            typ: chunk.typ().into(),
            position,
            raw: chunk.raw.to_vec(),
        }
    }
}

pub(crate) fn chunk_header_parser(input: &[u8]) -> IResult<&[u8], ChunkHeader, ResourcesError> {
    let (input, typ_tag) = le_u16(input)?;
    let (input, header_size) = le_u16(input)?;
    let (input, chunk_size) = le_u32(input)?;

    let typ = ChunkType::from(typ_tag);
    log::debug!("chunk::type_tag = {:#06x} = {}", typ_tag, typ);
    log::debug!("chunk::header_size = {}", header_size);
    log::debug!("chunk::chunk_size = {}", chunk_size);

    Ok((
        input,
        ChunkHeader {
            typ,
            header_size: header_size as usize,
            chunk_size: chunk_size as usize,
        },
    ))
}

/// Frames the chunk starting at the beginning of `input`, checking that its
/// declared sizes are consistent and fit in the buffer.
pub(crate) fn chunk_parser(input: &[u8]) -> IResult<&[u8], Chunk, ResourcesError> {
    let (_, header) = chunk_header_parser(input)?;

    if header.header_size < header.typ.min_header_size() {
        return Err(format_failure(format!(
            "{} header size {:#x} is smaller than {:#x}",
            header.typ,
            header.header_size,
            header.typ.min_header_size()
        )));
    }
    if header.chunk_size < header.header_size {
        return Err(format_failure(format!(
            "{} chunk size {:#x} is smaller than its header size {:#x}",
            header.typ, header.chunk_size, header.header_size
        )));
    }
    if header.chunk_size > input.len() {
        return Err(format_failure(format!(
            "{} chunk size {:#x} overruns the {:#x} available bytes",
            header.typ,
            header.chunk_size,
            input.len()
        )));
    }

    let (input, raw) = take(header.chunk_size)(input)?;
    Ok((input, Chunk { header, raw }))
}

/// Frames the chunk located at `offset` in `bytes`.
pub fn read_chunk(bytes: &[u8], offset: usize) -> ResourcesResult<Chunk> {
    if offset > bytes.len() {
        return Err(ResourcesError::Format(format!(
            "chunk offset {offset:#x} is out of the {:#x} bytes buffer",
            bytes.len()
        )));
    }
    let (_, chunk) = chunk_parser(&bytes[offset..]).finish()?;
    Ok(chunk)
}

/// Splits a buffer into the sequence of chunks it contains.
pub(crate) fn chunks_parser(mut input: &[u8]) -> Result<Vec<Chunk>, nom::Err<ResourcesError>> {
    let mut chunks = Vec::new();
    while !input.is_empty() {
        let (rem, chunk) = chunk_parser(input)?;
        chunks.push(chunk);
        input = rem;
    }
    Ok(chunks)
}

pub(crate) fn format_failure(msg: String) -> nom::Err<ResourcesError> {
    log::error!("{msg}");
    nom::Err::Error(ResourcesError::Format(msg))
}

/// Reserved position of a chunk being written, returned by
/// [`ChunkWriter::begin_chunk`].
#[derive(Debug)]
pub struct ChunkHandle {
    typ: ChunkType,
    start: u64,
    header_size: Option<u16>,
}

impl ChunkHandle {
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }
}

/// Sequential writer that reserves chunk headers and back-patches their
/// sizes once the content length is known.
#[derive(Debug, Default)]
pub struct ChunkWriter {
    cursor: Cursor<Vec<u8>>,
}

impl ChunkWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Number of bytes written since the beginning of the given chunk.
    #[must_use]
    pub fn offset_in(&self, handle: &ChunkHandle) -> usize {
        (self.cursor.position() - handle.start) as usize
    }

    pub fn begin_chunk(&mut self, typ: ChunkType) -> io::Result<ChunkHandle> {
        let start = self.cursor.position();
        writers::le_u16(self, typ.into())?;
        writers::le_u16(self, 0)?;
        writers::le_u32(self, 0)?;
        Ok(ChunkHandle {
            typ,
            start,
            header_size: None,
        })
    }

    /// Marks the end of the chunk header at the current position.
    pub fn end_header(&mut self, handle: &mut ChunkHandle) -> io::Result<()> {
        let size = u16::try_from(self.offset_in(handle)).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "chunk header is too large")
        })?;
        self.patch_u16(handle.start + 2, size)?;
        handle.header_size = Some(size);
        Ok(())
    }

    /// Pads the chunk to a 4-bytes boundary and patches its total size.
    /// Returns the chunk size.
    pub fn end_chunk(&mut self, handle: ChunkHandle) -> io::Result<usize> {
        if handle.header_size.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} chunk closed before its header", handle.typ),
            ));
        }
        let pad = writers::padding4(self.offset_in(&handle));
        writers::zeros(self, pad)?;
        let size = self.offset_in(&handle);
        let size32 = u32::try_from(size)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk is too large"))?;
        self.patch_u32(handle.start + 4, size32)?;
        Ok(size)
    }

    pub fn patch_u16(&mut self, at: u64, v: u16) -> io::Result<()> {
        self.patch(at, &v.to_le_bytes())
    }

    pub fn patch_u32(&mut self, at: u64, v: u32) -> io::Result<()> {
        self.patch(at, &v.to_le_bytes())
    }

    fn patch(&mut self, at: u64, data: &[u8]) -> io::Result<()> {
        let current = self.cursor.position();
        self.cursor.seek(SeekFrom::Start(at))?;
        self.cursor.write_all(data)?;
        self.cursor.seek(SeekFrom::Start(current))?;
        Ok(())
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.cursor.flush()
    }
}

impl Seek for ChunkWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_valid_chunk() {
        let bytes = [
            0x80, 0x01, 0x08, 0x00, 0x10, 0x00, 0x00, 0x00, //
            0x01, 0x00, 0x01, 0x01, 0x02, 0x00, 0x01, 0x01,
        ];
        let chunk = read_chunk(&bytes, 0).unwrap();
        assert_eq!(chunk.typ(), ChunkType::XmlResourceMap);
        assert_eq!(chunk.header.header_size, 8);
        assert_eq!(chunk.header.chunk_size, 16);
        assert!(chunk.header_data().is_empty());
        assert_eq!(chunk.body(), &bytes[8..]);
    }

    #[test]
    fn read_chunk_at_offset() {
        let mut bytes = vec![0xaa; 4];
        bytes.extend_from_slice(&[0x34, 0x12, 0x08, 0x00, 0x08, 0x00, 0x00, 0x00]);
        let chunk = read_chunk(&bytes, 4).unwrap();
        assert_eq!(chunk.typ(), ChunkType::Unknown(0x1234));
        assert!(chunk.body().is_empty());
    }

    #[test]
    fn reject_small_header() {
        // string pool chunk declaring an 8 bytes header
        let bytes = [0x01, 0x00, 0x08, 0x00, 0x08, 0x00, 0x00, 0x00];
        let err = read_chunk(&bytes, 0).unwrap_err();
        assert!(matches!(err, ResourcesError::Format(_)));
    }

    #[test]
    fn reject_size_smaller_than_header() {
        let bytes = [0x03, 0x00, 0x08, 0x00, 0x04, 0x00, 0x00, 0x00];
        assert!(read_chunk(&bytes, 0).unwrap_err().is_format_error());
    }

    #[test]
    fn reject_overrun() {
        let bytes = [0x03, 0x00, 0x08, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00];
        assert!(read_chunk(&bytes, 0).unwrap_err().is_format_error());
        assert!(read_chunk(&bytes, 42).unwrap_err().is_format_error());
    }

    #[test]
    fn reject_truncated_header() {
        let bytes = [0x03, 0x00, 0x08];
        assert!(read_chunk(&bytes, 0).unwrap_err().is_format_error());
    }

    #[test]
    fn writer_back_patches_sizes() {
        let mut writer = ChunkWriter::new();
        let mut outer = writer.begin_chunk(ChunkType::Xml).unwrap();
        writer.end_header(&mut outer).unwrap();
        let mut inner = writer.begin_chunk(ChunkType::XmlResourceMap).unwrap();
        writer.end_header(&mut inner).unwrap();
        writers::le_u32(&mut writer, 0x0101_0000).unwrap();
        writers::le_u8(&mut writer, 0xff).unwrap();
        assert_eq!(writer.end_chunk(inner).unwrap(), 16);
        assert_eq!(writer.end_chunk(outer).unwrap(), 24);

        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 24);
        let outer = read_chunk(&bytes, 0).unwrap();
        assert_eq!(outer.typ(), ChunkType::Xml);
        assert_eq!(outer.header.chunk_size, 24);
        let inner = read_chunk(outer.body(), 0).unwrap();
        assert_eq!(inner.header.header_size, 8);
        assert_eq!(inner.body(), &[0x00, 0x00, 0x01, 0x01, 0xff, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn writer_requires_header_end() {
        let mut writer = ChunkWriter::new();
        let handle = writer.begin_chunk(ChunkType::Null).unwrap();
        assert!(writer.end_chunk(handle).is_err());
    }
}
