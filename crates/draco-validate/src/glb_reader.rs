//! GLB binary container reader.
//!
//! A GLB file is a 12-byte header followed by a table of chunks:
//!
//! ```text
//! magic "glTF" | version u32 | total length u32
//! chunk length u32 | chunk type [u8; 4] | data ... | padding to 4 bytes
//! ...
//! ```
//!
//! The reader has no knowledge of meshes. It only splits the envelope into
//! the JSON metadata chunk and the optional binary payload chunk.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::error::{ContainerError, Result};

// ============================================================================
// GLB Binary Format Constants
// ============================================================================

pub const GLB_MAGIC: [u8; 4] = *b"glTF";
pub const GLB_VERSION: u32 = 2;
pub const GLB_HEADER_LEN: usize = 12;
pub const CHUNK_HEADER_LEN: usize = 8;
pub const CHUNK_JSON: [u8; 4] = *b"JSON";
pub const CHUNK_BIN: [u8; 4] = *b"BIN\0";

/// A single entry of the chunk table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    offset: usize,
    length: u32,
    chunk_type: [u8; 4],
    data: Vec<u8>,
}

impl Chunk {
    /// Position of the chunk header within the input.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Declared data length, excluding the header and padding.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn chunk_type(&self) -> [u8; 4] {
        self.chunk_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Position of the first data byte within the input.
    pub fn data_offset(&self) -> usize {
        self.offset + CHUNK_HEADER_LEN
    }

    /// Position just past the data and its alignment padding.
    pub fn padded_end(&self) -> usize {
        align4(self.data_offset() + self.length as usize)
    }

    /// The 8-byte chunk header as it appears in the file.
    pub fn header_bytes(&self) -> [u8; CHUNK_HEADER_LEN] {
        let mut header = [0u8; CHUNK_HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], self.length);
        header[4..8].copy_from_slice(&self.chunk_type);
        header
    }
}

/// Declared total length that disagrees with the input length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub declared: u32,
    pub actual: usize,
}

/// A parsed GLB envelope.
///
/// The first chunk is always the metadata chunk; the second, if any, is the
/// binary payload.
#[derive(Debug, Clone)]
pub struct GlbContainer {
    magic: [u8; 4],
    version: u32,
    total_length: u32,
    chunks: Vec<Chunk>,
    length_mismatch: Option<LengthMismatch>,
}

impl GlbContainer {
    /// Parse a GLB envelope from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < GLB_HEADER_LEN || data[0..4] != GLB_MAGIC {
            return Err(ContainerError::BadMagic.into());
        }

        let version = LittleEndian::read_u32(&data[4..8]);
        let total_length = LittleEndian::read_u32(&data[8..12]);

        if version != GLB_VERSION {
            warn!(version, "unexpected GLB version, continuing");
        }

        let declared = total_length as usize;
        let length_mismatch = if declared != data.len() {
            warn!(
                declared = total_length,
                actual = data.len(),
                "GLB header length disagrees with input length"
            );
            Some(LengthMismatch {
                declared: total_length,
                actual: data.len(),
            })
        } else {
            None
        };

        // Bytes past a shorter declared length are padding, not chunks.
        let table_end = if (GLB_HEADER_LEN..data.len()).contains(&declared) {
            declared
        } else {
            data.len()
        };

        let mut chunks = Vec::new();
        let mut offset = GLB_HEADER_LEN;

        while table_end.saturating_sub(offset) >= CHUNK_HEADER_LEN {
            let length = LittleEndian::read_u32(&data[offset..offset + 4]);
            let mut chunk_type = [0u8; 4];
            chunk_type.copy_from_slice(&data[offset + 4..offset + 8]);

            let data_start = offset + CHUNK_HEADER_LEN;
            let available = data.len() - data_start;
            if length as usize > available {
                return Err(ContainerError::TruncatedChunk {
                    index: chunks.len(),
                    offset,
                    declared: length,
                    available,
                }
                .into());
            }

            let data_end = data_start + length as usize;
            debug!(
                index = chunks.len(),
                offset,
                length,
                chunk_type = %String::from_utf8_lossy(&chunk_type),
                "read GLB chunk"
            );

            chunks.push(Chunk {
                offset,
                length,
                chunk_type,
                data: data[data_start..data_end].to_vec(),
            });

            offset = align4(data_end).min(data.len());
        }

        match chunks.first() {
            Some(first) if first.chunk_type == CHUNK_JSON => {}
            _ => return Err(ContainerError::MissingMetadataChunk.into()),
        }

        if let Some(payload) = chunks.get(1) {
            if payload.chunk_type != CHUNK_BIN {
                debug!(
                    chunk_type = %String::from_utf8_lossy(&payload.chunk_type),
                    "second chunk is not tagged BIN, using it as payload anyway"
                );
            }
        }

        Ok(Self {
            magic: GLB_MAGIC,
            version,
            total_length,
            chunks,
            length_mismatch,
        })
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Total length as declared in the header.
    pub fn total_length(&self) -> u32 {
        self.total_length
    }

    pub fn length_mismatch(&self) -> Option<LengthMismatch> {
        self.length_mismatch
    }

    /// All chunks in file order, including any past the payload.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Data of the metadata (JSON) chunk.
    pub fn metadata(&self) -> &[u8] {
        // parse() guarantees at least the metadata chunk.
        self.chunks.first().map(Chunk::data).unwrap_or_default()
    }

    /// Data of the binary payload chunk, if the container has one.
    pub fn payload(&self) -> Option<&[u8]> {
        self.chunks.get(1).map(Chunk::data)
    }
}

fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

// ============================================================================
// Tests
// ============================================================================
