//! Position equivalence between an original and a round-tripped file.
//!
//! Meshes are joined by name and compared with the max-norm: the largest
//! absolute difference of any single coordinate of any vertex. The allowed
//! deviation is derived from the original mesh's bounding extent and the
//! quantization bit depth used by the encoder:
//!
//! ```text
//! extent  = max(all coordinates) - min(all coordinates)
//! step    = extent / 2^quantization_bits
//! allowed = step * tolerance_multiplier
//! ```
//!
//! A degenerate extent allows no deviation at all: every coordinate must be
//! bit-identical, so `0.0` and `-0.0` differ.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::position_extractor::MeshPositions;
use crate::Vec3;

/// Default position quantization used by Draco encoders.
pub const DEFAULT_QUANTIZATION_BITS: u8 = 14;

/// Slack over one quantization step for rounding and transform accumulation.
pub const DEFAULT_TOLERANCE_MULTIPLIER: f64 = 10.0;

/// Tunables of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonOptions {
    pub quantization_bits: u8,
    pub tolerance_multiplier: f64,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            quantization_bits: DEFAULT_QUANTIZATION_BITS,
            tolerance_multiplier: DEFAULT_TOLERANCE_MULTIPLIER,
        }
    }
}

impl ComparisonOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quantization_bits(mut self, bits: u8) -> Self {
        self.quantization_bits = bits;
        self
    }

    pub fn with_tolerance_multiplier(mut self, multiplier: f64) -> Self {
        self.tolerance_multiplier = multiplier;
        self
    }

    /// Allowed deviation for a mesh with the given extent.
    pub fn allowed_deviation(&self, extent: f64) -> f64 {
        allowed_deviation(extent, self.quantization_bits, self.tolerance_multiplier)
    }
}

/// Outcome of comparing one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshStatus {
    Match,
    VertexCountMismatch,
    PositionMismatch,
    MissingInCandidate,
    /// Plain positions could not be read on at least one side.
    Unreadable,
    /// Compressed positions could not be decoded on at least one side.
    Undecodable,
}

impl MeshStatus {
    pub const fn name(self) -> &'static str {
        match self {
            MeshStatus::Match => "MATCH",
            MeshStatus::VertexCountMismatch => "VERTEX_COUNT_MISMATCH",
            MeshStatus::PositionMismatch => "POSITION_MISMATCH",
            MeshStatus::MissingInCandidate => "MISSING_IN_CANDIDATE",
            MeshStatus::Unreadable => "UNREADABLE",
            MeshStatus::Undecodable => "UNDECODABLE",
        }
    }

    /// Whether the mesh counts against the overall verdict.
    ///
    /// Only undecodable meshes are neither a match nor a failure.
    pub fn is_failure(self) -> bool {
        !matches!(self, MeshStatus::Match | MeshStatus::Undecodable)
    }
}

impl fmt::Display for MeshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshVerdict {
    pub status: MeshStatus,
    pub max_abs_deviation: Option<f64>,
    pub worst_vertex_index: Option<usize>,
    pub allowed_deviation: Option<f64>,
    pub detail: String,
}

impl MeshVerdict {
    fn without_positions(status: MeshStatus, detail: String) -> Self {
        Self {
            status,
            max_abs_deviation: None,
            worst_vertex_index: None,
            allowed_deviation: None,
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonVerdict {
    pub per_mesh: BTreeMap<String, MeshVerdict>,
    /// True iff every verifiable mesh of the original matched.
    pub overall_pass: bool,
}

impl ComparisonVerdict {
    /// Names of meshes that could not be verified.
    pub fn undecodable_meshes(&self) -> Vec<&str> {
        self.meshes_with(MeshStatus::Undecodable)
    }

    pub fn has_undecodable(&self) -> bool {
        self.per_mesh
            .values()
            .any(|v| v.status == MeshStatus::Undecodable)
    }

    /// Meshes that were verified and diverge.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &MeshVerdict)> {
        self.per_mesh
            .iter()
            .filter(|(_, v)| v.status.is_failure())
            .map(|(name, v)| (name.as_str(), v))
    }

    pub fn meshes_with(&self, status: MeshStatus) -> Vec<&str> {
        self.per_mesh
            .iter()
            .filter(|(_, v)| v.status == status)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Process exit status for command-line callers.
    pub fn exit_code(&self) -> i32 {
        if self.overall_pass {
            0
        } else {
            1
        }
    }
}

/// Pooled bounding extent over all three axes.
pub fn bounding_extent(positions: &[Vec3]) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &c in positions.iter().flatten() {
        let c = f64::from(c);
        min = min.min(c);
        max = max.max(c);
    }
    if min > max {
        0.0
    } else {
        max - min
    }
}

/// `extent / 2^bits * multiplier`, or zero for a degenerate extent.
pub fn allowed_deviation(extent: f64, quantization_bits: u8, tolerance_multiplier: f64) -> f64 {
    if extent == 0.0 {
        return 0.0;
    }
    let step = extent / 2f64.powi(i32::from(quantization_bits));
    step * tolerance_multiplier
}

/// Largest per-coordinate absolute difference and the vertex holding it.
///
/// The index is `None` when no coordinate differs by a nonzero amount.
/// Sequences are compared up to the shorter length.
pub fn max_deviation(original: &[Vec3], candidate: &[Vec3]) -> (f64, Option<usize>) {
    let mut max_diff = 0.0;
    let mut worst = None;

    for (i, (a, b)) in original.iter().zip(candidate).enumerate() {
        for axis in 0..3 {
            if a[axis].to_bits() == b[axis].to_bits() {
                continue;
            }
            let diff = (f64::from(a[axis]) - f64::from(b[axis])).abs();
            let diff = if diff.is_nan() { f64::INFINITY } else { diff };
            if diff > max_diff {
                max_diff = diff;
                worst = Some(i);
            }
        }
    }

    (max_diff, worst)
}

/// First vertex with a coordinate whose bits differ, including `0.0`
/// against `-0.0` and differing NaN payloads.
pub fn first_bit_difference(original: &[Vec3], candidate: &[Vec3]) -> Option<usize> {
    original
        .iter()
        .zip(candidate)
        .position(|(a, b)| a.iter().zip(b).any(|(x, y)| x.to_bits() != y.to_bits()))
}

fn side_label(original: bool, candidate: bool) -> &'static str {
    match (original, candidate) {
        (true, true) => "original and candidate",
        (true, false) => "original",
        _ => "candidate",
    }
}

/// Compare every mesh of `original` against the mesh of the same name in
/// `candidate`.
pub fn compare(
    original: &MeshPositions,
    candidate: &MeshPositions,
    quantization_bits: u8,
    tolerance_multiplier: f64,
) -> ComparisonVerdict {
    let mut per_mesh = BTreeMap::new();

    for name in original.mesh_names() {
        let verdict = if original.is_unreadable(name) || candidate.is_unreadable(name) {
            let sides = side_label(original.is_unreadable(name), candidate.is_unreadable(name));
            MeshVerdict::without_positions(
                MeshStatus::Unreadable,
                format!("positions in {} could not be read", sides),
            )
        } else if original.is_undecodable(name) || candidate.is_undecodable(name) {
            let sides = side_label(original.is_undecodable(name), candidate.is_undecodable(name));
            MeshVerdict::without_positions(
                MeshStatus::Undecodable,
                format!("compressed positions in {} could not be decoded", sides),
            )
        } else {
            match (original.get(name), candidate.get(name)) {
                (Some(orig), Some(cand)) => {
                    compare_mesh(orig, cand, quantization_bits, tolerance_multiplier)
                }
                _ => MeshVerdict::without_positions(
                    MeshStatus::MissingInCandidate,
                    "mesh missing in candidate".to_string(),
                ),
            }
        };
        per_mesh.insert(name.to_string(), verdict);
    }

    let overall_pass = per_mesh
        .values()
        .filter(|v| v.status != MeshStatus::Undecodable)
        .all(|v| v.status == MeshStatus::Match);

    ComparisonVerdict {
        per_mesh,
        overall_pass,
    }
}

/// [`compare`] with options bundled.
pub fn compare_with(
    original: &MeshPositions,
    candidate: &MeshPositions,
    options: &ComparisonOptions,
) -> ComparisonVerdict {
    compare(
        original,
        candidate,
        options.quantization_bits,
        options.tolerance_multiplier,
    )
}

fn compare_mesh(
    original: &[Vec3],
    candidate: &[Vec3],
    quantization_bits: u8,
    tolerance_multiplier: f64,
) -> MeshVerdict {
    if original.len() != candidate.len() {
        return MeshVerdict::without_positions(
            MeshStatus::VertexCountMismatch,
            format!(
                "vertex count mismatch: {} vs {}",
                original.len(),
                candidate.len()
            ),
        );
    }

    let extent = bounding_extent(original);
    let allowed = allowed_deviation(extent, quantization_bits, tolerance_multiplier);
    let (max_diff, mut worst) = max_deviation(original, candidate);

    // With nothing allowed, a difference in bits alone is a mismatch.
    let exact_miss = if allowed == 0.0 && worst.is_none() {
        first_bit_difference(original, candidate)
    } else {
        None
    };

    let (status, detail) = match (worst, exact_miss) {
        (Some(i), _) if max_diff > allowed => (
            MeshStatus::PositionMismatch,
            format!(
                "position {} differs by {:.6} (allowed {:.6}): original={:?}, candidate={:?}",
                i, max_diff, allowed, original[i], candidate[i]
            ),
        ),
        (_, Some(i)) => {
            worst = Some(i);
            (
                MeshStatus::PositionMismatch,
                format!(
                    "position {} is not bit-identical (degenerate extent allows no deviation): original={:?}, candidate={:?}",
                    i, original[i], candidate[i]
                ),
            )
        }
        _ => (
            MeshStatus::Match,
            format!(
                "all positions match within tolerance (max_diff={:.6}, allowed={:.6}, extent={:.4})",
                max_diff, allowed, extent
            ),
        ),
    };

    MeshVerdict {
        status,
        max_abs_deviation: Some(max_diff),
        worst_vertex_index: worst,
        allowed_deviation: Some(allowed),
        detail,
    }
}

// ============================================================================
// Tests
// ============================================================================
