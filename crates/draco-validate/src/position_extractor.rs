//! Per-mesh vertex position extraction.
//!
//! Walks every primitive of every mesh and either reads its `POSITION`
//! accessor as little-endian float triplets, or, for compressed primitives,
//! reads nothing and defers to an optional [`PositionDecoder`].
//!
//! Extraction never fails. Primitives that cannot be read are skipped and
//! described by a [`Diagnostic`]. A mesh whose every position-bearing
//! primitive was skipped this way is listed as unreadable rather than as an
//! empty mesh.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::DecodeUnavailable;
use crate::scene::{CompressionDescriptor, MeshDef, ResolveIssue, SceneDescription};
use crate::traits::PositionDecoder;
use crate::Vec3;

/// Vertex positions keyed by mesh name.
///
/// Meshes whose positions live in an undecoded compressed payload, and
/// meshes none of whose positions could be read, are listed separately and
/// have no position sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshPositions {
    positions: BTreeMap<String, Vec<Vec3>>,
    undecodable: BTreeSet<String>,
    unreadable: BTreeSet<String>,
}

impl MeshPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the positions of a mesh, clearing any undecodable mark.
    pub fn insert(&mut self, name: impl Into<String>, positions: Vec<Vec3>) {
        let name = name.into();
        self.undecodable.remove(&name);
        self.unreadable.remove(&name);
        self.positions.insert(name, positions);
    }

    /// Mark a mesh as undecodable, dropping any positions it had.
    pub fn mark_undecodable(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.positions.remove(&name);
        self.unreadable.remove(&name);
        self.undecodable.insert(name);
    }

    /// Mark a mesh whose plain positions could not be read at all.
    pub fn mark_unreadable(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.positions.remove(&name);
        self.undecodable.remove(&name);
        self.unreadable.insert(name);
    }

    pub fn get(&self, name: &str) -> Option<&[Vec3]> {
        self.positions.get(name).map(Vec::as_slice)
    }

    pub fn is_undecodable(&self, name: &str) -> bool {
        self.undecodable.contains(name)
    }

    pub fn is_unreadable(&self, name: &str) -> bool {
        self.unreadable.contains(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
            || self.undecodable.contains(name)
            || self.unreadable.contains(name)
    }

    /// Every mesh name, readable or not, in sorted order.
    pub fn mesh_names(&self) -> BTreeSet<&str> {
        self.positions
            .keys()
            .chain(self.undecodable.iter())
            .chain(self.unreadable.iter())
            .map(String::as_str)
            .collect()
    }

    /// Decoded meshes and their positions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec3])> {
        self.positions
            .iter()
            .map(|(name, positions)| (name.as_str(), positions.as_slice()))
    }

    pub fn undecodable(&self) -> impl Iterator<Item = &str> {
        self.undecodable.iter().map(String::as_str)
    }

    pub fn unreadable(&self) -> impl Iterator<Item = &str> {
        self.unreadable.iter().map(String::as_str)
    }

    /// Number of meshes, readable or not.
    pub fn len(&self) -> usize {
        self.positions.len() + self.undecodable.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<Vec3>)> for MeshPositions {
    fn from_iter<I: IntoIterator<Item = (S, Vec<Vec3>)>>(iter: I) -> Self {
        let mut positions = MeshPositions::new();
        for (name, mesh) in iter {
            positions.insert(name, mesh);
        }
        positions
    }
}

/// What went wrong with a single primitive or mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    #[error(transparent)]
    Unresolved(#[from] ResolveIssue),

    #[error("no payload chunk to read {needed} bytes from")]
    MissingPayload { needed: u64 },

    #[error("positions end at byte {end}, past payload length {payload_len}")]
    OutOfRange { end: u64, payload_len: usize },

    #[error("{extension} is used by a primitive but not declared in extensionsUsed")]
    UndeclaredExtension { extension: String },

    #[error(transparent)]
    DecodeFailed(#[from] DecodeUnavailable),

    #[error("duplicate mesh name, first used by mesh {first_index}")]
    DuplicateMeshName { first_index: usize },
}

/// A recoverable problem recorded during extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub mesh_index: usize,
    pub mesh_name: String,
    pub primitive_index: Option<usize>,
    #[serde(serialize_with = "serialize_display")]
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh '{}' (#{})", self.mesh_name, self.mesh_index)?;
        if let Some(primitive) = self.primitive_index {
            write!(f, " primitive {}", primitive)?;
        }
        write!(f, ": {}", self.kind)
    }
}

/// A primitive whose positions live in a compressed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressedPrimitive {
    pub mesh_index: usize,
    pub mesh_name: String,
    pub primitive_index: usize,
    pub descriptor: CompressionDescriptor,
    /// Whether a decoder supplied positions for it.
    pub decoded: bool,
}

/// Result of extracting positions from one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub positions: MeshPositions,
    pub compressed: Vec<CompressedPrimitive>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    fn record(&mut self, mesh_index: usize, mesh_name: &str, primitive_index: Option<usize>, kind: DiagnosticKind) {
        let diagnostic = Diagnostic {
            mesh_index,
            mesh_name: mesh_name.to_string(),
            primitive_index,
            kind,
        };
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Name used as the comparison key for a mesh.
pub fn mesh_name(mesh: &MeshDef, index: usize) -> String {
    match mesh.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("mesh_{}", index),
    }
}

/// Extract positions without a decoder; compressed meshes are undecodable.
pub fn extract(scene: &SceneDescription, payload: Option<&[u8]>) -> Extraction {
    extract_with_decoder(scene, payload, None)
}

/// Extract positions, decoding compressed primitives with `decoder` if given.
pub fn extract_with_decoder(
    scene: &SceneDescription,
    payload: Option<&[u8]>,
    decoder: Option<&dyn PositionDecoder>,
) -> Extraction {
    let mut extraction = Extraction::default();
    let mut claimed: BTreeMap<String, usize> = BTreeMap::new();

    for (mesh_index, mesh) in scene.meshes().iter().enumerate() {
        let name = mesh_name(mesh, mesh_index);

        if let Some(&first_index) = claimed.get(&name) {
            extraction.record(mesh_index, &name, None, DiagnosticKind::DuplicateMeshName { first_index });
            continue;
        }
        claimed.insert(name.clone(), mesh_index);

        let mut positions = Vec::new();
        let mut undecodable = false;
        let mut unread = 0usize;

        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            if let Some(descriptor) = &primitive.compression {
                debug!(mesh = %name, primitive_index, extension = %descriptor.extension, "compressed primitive");

                if !scene.extensions_used().contains(&descriptor.extension) {
                    extraction.record(
                        mesh_index,
                        &name,
                        Some(primitive_index),
                        DiagnosticKind::UndeclaredExtension {
                            extension: descriptor.extension.clone(),
                        },
                    );
                }

                let decoded = match decoder {
                    Some(decoder) => match decoder.decode_positions(descriptor, payload.unwrap_or_default()) {
                        Ok(decoded) => {
                            positions.extend(decoded);
                            true
                        }
                        Err(e) => {
                            extraction.record(mesh_index, &name, Some(primitive_index), e.into());
                            false
                        }
                    },
                    None => false,
                };
                undecodable |= !decoded;

                extraction.compressed.push(CompressedPrimitive {
                    mesh_index,
                    mesh_name: name.clone(),
                    primitive_index,
                    descriptor: descriptor.clone(),
                    decoded,
                });
                continue;
            }

            let Some(accessor_index) = primitive.position_accessor else {
                continue;
            };

            match read_positions(scene, payload, accessor_index) {
                Ok(read) => {
                    debug!(mesh = %name, primitive_index, count = read.len(), "read positions");
                    positions.extend(read);
                }
                Err(kind) => {
                    extraction.record(mesh_index, &name, Some(primitive_index), kind);
                    unread += 1;
                }
            }
        }

        if undecodable {
            extraction.positions.mark_undecodable(name);
        } else if unread > 0 && positions.is_empty() {
            debug!(mesh = %name, primitives = unread, "no readable positions");
            extraction.positions.mark_unreadable(name);
        } else {
            extraction.positions.insert(name, positions);
        }
    }

    extraction
}

/// Read a VEC3 float accessor from the payload chunk.
fn read_positions(
    scene: &SceneDescription,
    payload: Option<&[u8]>,
    accessor_index: usize,
) -> Result<Vec<Vec3>, DiagnosticKind> {
    let range = scene.resolve_position_range(accessor_index)?;
    let end = range
        .end()
        .ok_or(ResolveIssue::Overflow { accessor: accessor_index })?;

    if range.count == 0 {
        return Ok(Vec::new());
    }

    let payload = payload.ok_or(DiagnosticKind::MissingPayload { needed: end })?;
    if end > payload.len() as u64 {
        return Err(DiagnosticKind::OutOfRange {
            end,
            payload_len: payload.len(),
        });
    }

    // Every offset below is bounded by `end`, which fits in the payload.
    let mut result = Vec::with_capacity(range.count as usize);
    for i in 0..range.count {
        let offset = (range.offset + i * range.stride) as usize;
        let bytes = &payload[offset..offset + 12];
        result.push([
            LittleEndian::read_f32(&bytes[0..4]),
            LittleEndian::read_f32(&bytes[4..8]),
            LittleEndian::read_f32(&bytes[8..12]),
        ]);
    }

    Ok(result)
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

// ============================================================================
// Tests
// ============================================================================
