//! Round-trip validation of Draco-compressed GLB assets.
//!
//! This crate checks that a mesh survives export, compression and
//! decompression within a tolerance derived from its own bounding box and
//! the quantization bit depth. It works directly on GLB bytes:
//!
//! 1. [`GlbContainer::parse`] splits the binary envelope into the JSON
//!    metadata chunk and the binary payload chunk.
//! 2. [`SceneDescription::resolve`] reads meshes, primitives, accessors and
//!    buffer views from the metadata.
//! 3. [`extract`] recovers per-mesh vertex positions from plain primitives.
//!    Primitives using `KHR_draco_mesh_compression` are never read as raw
//!    floats; they are reported as undecodable unless a
//!    [`PositionDecoder`] is supplied.
//! 4. [`compare`] joins two files mesh by mesh and produces a
//!    [`ComparisonVerdict`].
//!
//! # Example
//!
//! ```ignore
//! use draco_validate::{load_file, validate, ComparisonOptions};
//!
//! let original = load_file("cube.glb")?;
//! let candidate = load_file("cube_draco_roundtrip.glb")?;
//!
//! let run = validate(&original, &candidate, &ComparisonOptions::default(), None)?;
//! for (name, verdict) in &run.verdict.per_mesh {
//!     println!("{}: {} - {}", name, verdict.status, verdict.detail);
//! }
//! std::process::exit(run.verdict.exit_code());
//! ```
//!
//! Structural problems (bad magic, truncated chunks, unparsable metadata)
//! are returned as [`ValidateError`]. Everything else degrades into
//! [`Diagnostic`]s and per-mesh verdicts, so "could not parse" and "geometry
//! diverges" are never conflated.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

pub mod comparator;
pub mod error;
pub mod glb_reader;
pub mod position_extractor;
pub mod report;
pub mod scene;
pub mod traits;

pub use comparator::{
    compare, compare_with, ComparisonOptions, ComparisonVerdict, MeshStatus, MeshVerdict,
};
pub use error::{ContainerError, DecodeUnavailable, Result, Side, ValidateError};
pub use glb_reader::{Chunk, GlbContainer};
pub use position_extractor::{
    extract, extract_with_decoder, CompressedPrimitive, Diagnostic, DiagnosticKind, Extraction,
    MeshPositions,
};
pub use scene::{CompressionDescriptor, SceneDescription};
pub use traits::{NoDecoder, PositionDecoder};

/// A vertex position: x, y, z.
pub type Vec3 = [f32; 3];

/// Read a whole file into memory.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    debug!(path = %path.display(), bytes = data.len(), "loaded file");
    Ok(data)
}

/// A structurally valid GLB file: container plus resolved scene.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    container: GlbContainer,
    scene: SceneDescription,
}

impl ParsedFile {
    /// Parse the container and resolve its scene description.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let container = GlbContainer::parse(data)?;
        let scene = SceneDescription::from_container(&container)?;
        Ok(Self { container, scene })
    }

    /// Load and parse a GLB file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&load_file(path)?)
    }

    pub fn container(&self) -> &GlbContainer {
        &self.container
    }

    pub fn scene(&self) -> &SceneDescription {
        &self.scene
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.container.payload()
    }

    /// Extract positions, decoding compressed primitives with `decoder` if given.
    pub fn extract(&self, decoder: Option<&dyn PositionDecoder>) -> Extraction {
        extract_with_decoder(&self.scene, self.payload(), decoder)
    }
}

/// Everything produced by validating one original/candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRun {
    pub options: ComparisonOptions,
    pub original: Extraction,
    pub candidate: Extraction,
    pub verdict: ComparisonVerdict,
}

impl ValidationRun {
    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }
}

/// Parse both files, extract their positions and compare them.
///
/// Structural errors are labelled with the [`Side`] they came from.
pub fn validate(
    original: &[u8],
    candidate: &[u8],
    options: &ComparisonOptions,
    decoder: Option<&dyn PositionDecoder>,
) -> Result<ValidationRun> {
    let original_file =
        ParsedFile::from_bytes(original).map_err(|e| e.for_side(Side::Original))?;
    let candidate_file =
        ParsedFile::from_bytes(candidate).map_err(|e| e.for_side(Side::Candidate))?;

    let original = original_file.extract(decoder);
    let candidate = candidate_file.extract(decoder);
    let verdict = compare_with(&original.positions, &candidate.positions, options);

    debug!(
        meshes = verdict.per_mesh.len(),
        overall_pass = verdict.overall_pass,
        "comparison finished"
    );

    Ok(ValidationRun {
        options: *options,
        original,
        candidate,
        verdict,
    })
}
