//! glTF scene description resolver.
//!
//! Interprets the metadata chunk of a GLB container as the subset of glTF
//! needed to locate vertex positions: meshes, primitives, accessors, buffer
//! views and the declared extension list.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::Result;
use crate::glb_reader::GlbContainer;

/// glTF component type for 32-bit floats.
pub const COMPONENT_TYPE_FLOAT: u32 = 5126;

/// Size of one position element (three little-endian `f32`s).
pub const VEC3_SIZE: u64 = 12;

/// Primitive extensions that move geometry into a compressed payload.
pub const COMPRESSION_EXTENSIONS: &[&str] = &["KHR_draco_mesh_compression"];

// ============================================================================
// glTF JSON Schema (subset)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GltfRoot {
    #[serde(default)]
    accessors: Vec<AccessorDef>,
    #[serde(default)]
    buffer_views: Vec<BufferViewDef>,
    #[serde(default)]
    meshes: Vec<GltfMesh>,
    #[serde(default)]
    extensions_used: Vec<String>,
    #[serde(default)]
    extensions_required: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GltfMesh {
    name: Option<String>,
    #[serde(default)]
    primitives: Vec<GltfPrimitive>,
}

#[derive(Debug, Deserialize)]
struct GltfPrimitive {
    #[serde(default)]
    attributes: BTreeMap<String, usize>,
    #[serde(default)]
    extensions: Map<String, Value>,
}

/// Fields of `KHR_draco_mesh_compression` that are useful to a decoder.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompressionFields {
    buffer_view: Option<usize>,
    #[serde(default)]
    attributes: BTreeMap<String, usize>,
}

// ============================================================================
// Resolved scene types
// ============================================================================

/// A typed view into a buffer view.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorDef {
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: u32,
    pub count: u32,
    pub component_type: Option<u32>,
    #[serde(rename = "type")]
    pub accessor_type: Option<String>,
}

/// A byte range within a buffer; buffer 0 is the GLB payload chunk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferViewDef {
    #[serde(default)]
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: u32,
    pub byte_length: Option<u32>,
    pub byte_stride: Option<u32>,
}

/// Opaque compression descriptor attached to a primitive.
///
/// Self-contained: the location of the compressed stream is resolved from
/// the file's buffer views when the scene is read, so the descriptor can be
/// used with its payload chunk alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionDescriptor {
    /// Extension name, e.g. `KHR_draco_mesh_compression`.
    pub extension: String,
    /// Buffer view holding the compressed stream, when declared.
    pub buffer_view: Option<usize>,
    /// Byte range of the compressed stream within the payload chunk.
    ///
    /// `None` when the buffer view is missing, dangling, has no
    /// `byteLength`, or lives in an external buffer.
    pub byte_range: Option<Range<usize>>,
    /// Attribute semantic to compressed attribute id.
    pub attributes: BTreeMap<String, usize>,
    /// The extension object exactly as it appeared in the metadata.
    pub raw: Value,
}

impl CompressionDescriptor {
    fn from_extension(extension: &str, raw: &Value, buffer_views: &[BufferViewDef]) -> Self {
        let fields: CompressionFields = serde_json::from_value(raw.clone()).unwrap_or_default();
        let byte_range = fields
            .buffer_view
            .and_then(|index| buffer_views.get(index))
            .and_then(stream_range);
        Self {
            extension: extension.to_string(),
            buffer_view: fields.buffer_view,
            byte_range,
            attributes: fields.attributes,
            raw: raw.clone(),
        }
    }

    /// The compressed bytes referenced by this descriptor, if they lie
    /// entirely within the payload.
    pub fn payload_slice<'a>(&self, payload: &'a [u8]) -> Option<&'a [u8]> {
        payload.get(self.byte_range.clone()?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveDef {
    /// Accessor index of the `POSITION` attribute.
    pub position_accessor: Option<usize>,
    pub compression: Option<CompressionDescriptor>,
}

impl PrimitiveDef {
    pub fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshDef {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveDef>,
}

/// Why an accessor could not be resolved to a byte range.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveIssue {
    #[error("accessor {index} does not exist")]
    DanglingAccessor { index: usize },

    #[error("accessor {accessor} has no bufferView")]
    AccessorWithoutBufferView { accessor: usize },

    #[error("accessor {accessor} references missing bufferView {index}")]
    DanglingBufferView { accessor: usize, index: usize },

    #[error("accessor {accessor} is {accessor_type:?}/{component_type:?}, expected VEC3/FLOAT")]
    UnsupportedLayout {
        accessor: usize,
        component_type: Option<u32>,
        accessor_type: Option<String>,
    },

    #[error("bufferView {buffer_view} references external buffer {buffer}")]
    ExternalBuffer { buffer_view: usize, buffer: usize },

    #[error("bufferView {buffer_view} has byteStride {stride}, smaller than a VEC3")]
    InvalidStride { buffer_view: usize, stride: u32 },

    #[error("accessor {accessor} byte range overflows")]
    Overflow { accessor: usize },

    #[error("accessor {accessor} ends at byte {end}, past bufferView {buffer_view} length {byte_length}")]
    ExceedsBufferView {
        accessor: usize,
        buffer_view: usize,
        end: u64,
        byte_length: u32,
    },
}

/// Absolute location of a position stream inside the payload chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRange {
    pub offset: u64,
    pub stride: u64,
    pub count: u64,
}

impl PositionRange {
    /// One past the last byte read, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        if self.count == 0 {
            return Some(self.offset);
        }
        (self.count - 1)
            .checked_mul(self.stride)?
            .checked_add(self.offset)?
            .checked_add(VEC3_SIZE)
    }
}

/// The parsed scene metadata of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescription {
    meshes: Vec<MeshDef>,
    accessors: Vec<AccessorDef>,
    buffer_views: Vec<BufferViewDef>,
    extensions_used: BTreeSet<String>,
    extensions_required: BTreeSet<String>,
}

impl SceneDescription {
    /// Deserialize the metadata chunk.
    ///
    /// Missing `meshes`, `accessors` and `bufferViews` arrays are treated as
    /// empty. Anything that is present but has the wrong shape is an error.
    pub fn resolve(metadata: &[u8]) -> Result<Self> {
        let root: GltfRoot = serde_json::from_slice(metadata)?;

        let meshes = root
            .meshes
            .into_iter()
            .map(|mesh| MeshDef {
                name: mesh.name,
                primitives: mesh
                    .primitives
                    .into_iter()
                    .map(|primitive| resolve_primitive(primitive, &root.buffer_views))
                    .collect(),
            })
            .collect();

        Ok(Self {
            meshes,
            accessors: root.accessors,
            buffer_views: root.buffer_views,
            extensions_used: root.extensions_used.into_iter().collect(),
            extensions_required: root.extensions_required.into_iter().collect(),
        })
    }

    /// Resolve the metadata chunk of a parsed container.
    pub fn from_container(container: &GlbContainer) -> Result<Self> {
        Self::resolve(container.metadata())
    }

    pub fn meshes(&self) -> &[MeshDef] {
        &self.meshes
    }

    pub fn accessors(&self) -> &[AccessorDef] {
        &self.accessors
    }

    pub fn buffer_views(&self) -> &[BufferViewDef] {
        &self.buffer_views
    }

    pub fn extensions_used(&self) -> &BTreeSet<String> {
        &self.extensions_used
    }

    pub fn extensions_required(&self) -> &BTreeSet<String> {
        &self.extensions_required
    }

    /// Whether any compression extension is declared in `extensionsUsed`.
    ///
    /// This is only a hint: individual primitives decide.
    pub fn uses_compression(&self) -> bool {
        COMPRESSION_EXTENSIONS
            .iter()
            .any(|ext| self.extensions_used.contains(*ext))
    }

    /// Follow accessor -> bufferView to the absolute byte range of a VEC3
    /// float stream in the payload chunk.
    pub fn resolve_position_range(&self, accessor_index: usize) -> std::result::Result<PositionRange, ResolveIssue> {
        let accessor = self
            .accessors
            .get(accessor_index)
            .ok_or(ResolveIssue::DanglingAccessor { index: accessor_index })?;

        let layout_ok = accessor.component_type.map_or(true, |t| t == COMPONENT_TYPE_FLOAT)
            && accessor.accessor_type.as_deref().map_or(true, |t| t == "VEC3");
        if !layout_ok {
            return Err(ResolveIssue::UnsupportedLayout {
                accessor: accessor_index,
                component_type: accessor.component_type,
                accessor_type: accessor.accessor_type.clone(),
            });
        }

        let view_index = accessor
            .buffer_view
            .ok_or(ResolveIssue::AccessorWithoutBufferView { accessor: accessor_index })?;

        let view = self
            .buffer_views
            .get(view_index)
            .ok_or(ResolveIssue::DanglingBufferView {
                accessor: accessor_index,
                index: view_index,
            })?;

        if view.buffer != 0 {
            return Err(ResolveIssue::ExternalBuffer {
                buffer_view: view_index,
                buffer: view.buffer,
            });
        }

        let stride = match view.byte_stride {
            Some(stride) if u64::from(stride) < VEC3_SIZE => {
                return Err(ResolveIssue::InvalidStride {
                    buffer_view: view_index,
                    stride,
                })
            }
            Some(stride) => u64::from(stride),
            None => VEC3_SIZE,
        };

        let range = PositionRange {
            offset: u64::from(view.byte_offset) + u64::from(accessor.byte_offset),
            stride,
            count: u64::from(accessor.count),
        };

        let end = range
            .end()
            .ok_or(ResolveIssue::Overflow { accessor: accessor_index })?;

        if let Some(byte_length) = view.byte_length {
            if end > u64::from(view.byte_offset) + u64::from(byte_length) {
                return Err(ResolveIssue::ExceedsBufferView {
                    accessor: accessor_index,
                    buffer_view: view_index,
                    end,
                    byte_length,
                });
            }
        }

        Ok(range)
    }
}

fn resolve_primitive(primitive: GltfPrimitive, buffer_views: &[BufferViewDef]) -> PrimitiveDef {
    let compression = COMPRESSION_EXTENSIONS.iter().find_map(|ext| {
        primitive
            .extensions
            .get(*ext)
            .map(|raw| CompressionDescriptor::from_extension(ext, raw, buffer_views))
    });

    PrimitiveDef {
        position_accessor: primitive.attributes.get("POSITION").copied(),
        compression,
    }
}

/// Payload-relative bytes of a buffer view in the GLB binary chunk.
fn stream_range(view: &BufferViewDef) -> Option<Range<usize>> {
    if view.buffer != 0 {
        return None;
    }
    let start = view.byte_offset as usize;
    let end = start.checked_add(view.byte_length? as usize)?;
    Some(start..end)
}

// ============================================================================
// Tests
// ============================================================================
