//! GLB fixtures built in memory.

#![allow(dead_code)]

use serde_json::{json, Value};

pub const DRACO: &str = "KHR_draco_mesh_compression";

/// Assemble a GLB from a metadata chunk and an optional payload chunk.
///
/// JSON is padded with spaces and the payload with zeros, both to 4 bytes.
pub fn build_glb(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let json_padding = (4 - json.len() % 4) % 4;
    let padded_json_len = json.len() + json_padding;

    let bin_padding = bin.map_or(0, |b| (4 - b.len() % 4) % 4);
    let padded_bin_len = bin.map_or(0, |b| b.len() + bin_padding);

    let mut total_len = 12 + 8 + padded_json_len;
    if bin.is_some() {
        total_len += 8 + padded_bin_len;
    }

    let mut output = Vec::with_capacity(total_len);
    output.extend_from_slice(b"glTF");
    output.extend_from_slice(&2u32.to_le_bytes());
    output.extend_from_slice(&(total_len as u32).to_le_bytes());

    output.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    output.extend_from_slice(b"JSON");
    output.extend_from_slice(json);
    output.resize(output.len() + json_padding, b' ');

    if let Some(bin) = bin {
        output.extend_from_slice(&(padded_bin_len as u32).to_le_bytes());
        output.extend_from_slice(b"BIN\0");
        output.extend_from_slice(bin);
        output.resize(output.len() + bin_padding, 0);
    }

    output
}

/// Incrementally builds a glTF scene with its binary payload.
#[derive(Debug, Default)]
pub struct GlbBuilder {
    meshes: Vec<Value>,
    accessors: Vec<Value>,
    buffer_views: Vec<Value>,
    extensions_used: Vec<String>,
    binary: Vec<u8>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, bytes: &[u8]) -> usize {
        while self.binary.len() % 4 != 0 {
            self.binary.push(0);
        }
        let index = self.buffer_views.len();
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": self.binary.len(),
            "byteLength": bytes.len(),
        }));
        self.binary.extend_from_slice(bytes);
        index
    }

    /// Store tightly packed positions and return the accessor index.
    pub fn add_positions(&mut self, positions: &[[f32; 3]]) -> usize {
        let bytes: Vec<u8> = positions
            .iter()
            .flatten()
            .flat_map(|c| c.to_le_bytes())
            .collect();
        let view = self.push_view(&bytes);
        let index = self.accessors.len();
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": 5126,
            "count": positions.len(),
            "type": "VEC3",
        }));
        index
    }

    /// Add a mesh with one primitive per position list.
    pub fn mesh<P: AsRef<[[f32; 3]]>>(mut self, name: Option<&str>, primitives: &[P]) -> Self {
        let primitives: Vec<Value> = primitives
            .iter()
            .map(|positions| {
                let accessor = self.add_positions(positions.as_ref());
                json!({ "attributes": { "POSITION": accessor } })
            })
            .collect();
        self.push_mesh(name, primitives);
        self
    }

    /// Add a mesh whose single primitive is Draco compressed.
    ///
    /// The POSITION accessor has no buffer view, as written by exporters.
    pub fn draco_mesh(mut self, name: Option<&str>, vertex_count: usize, stream: &[u8]) -> Self {
        let view = self.push_view(stream);
        let accessor = self.accessors.len();
        self.accessors.push(json!({
            "componentType": 5126,
            "count": vertex_count,
            "type": "VEC3",
        }));
        if !self.extensions_used.iter().any(|e| e == DRACO) {
            self.extensions_used.push(DRACO.to_string());
        }
        self.push_mesh(
            name,
            vec![json!({
                "attributes": { "POSITION": accessor },
                "extensions": {
                    "KHR_draco_mesh_compression": { "bufferView": view, "attributes": { "POSITION": 0 } }
                }
            })],
        );
        self
    }

    fn push_mesh(&mut self, name: Option<&str>, primitives: Vec<Value>) {
        let mut mesh = json!({ "primitives": primitives });
        if let Some(name) = name {
            mesh["name"] = json!(name);
        }
        self.meshes.push(mesh);
    }

    pub fn to_json(&self) -> Value {
        let mut root = json!({
            "asset": { "version": "2.0" },
            "meshes": self.meshes,
            "accessors": self.accessors,
            "bufferViews": self.buffer_views,
            "buffers": [{ "byteLength": self.binary.len() }],
        });
        if !self.extensions_used.is_empty() {
            root["extensionsUsed"] = json!(self.extensions_used);
        }
        root
    }

    pub fn to_glb(&self) -> Vec<u8> {
        let json = serde_json::to_vec(&self.to_json()).unwrap();
        build_glb(&json, Some(self.binary.as_slice()))
    }
}

/// The eight corners of an axis-aligned cube with the given half size.
pub fn cube(half: f32) -> Vec<[f32; 3]> {
    let mut corners = Vec::with_capacity(8);
    for &x in &[-half, half] {
        for &y in &[-half, half] {
            for &z in &[-half, half] {
                corners.push([x, y, z]);
            }
        }
    }
    corners
}

/// Offset every coordinate by `delta`.
pub fn shifted(positions: &[[f32; 3]], delta: f32) -> Vec<[f32; 3]> {
    positions
        .iter()
        .map(|p| [p[0] + delta, p[1] + delta, p[2] + delta])
        .collect()
}
