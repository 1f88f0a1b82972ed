//! Human- and machine-readable reports.
//!
//! Text reports keep matched meshes apart from failing ones, and list meshes
//! that could not be verified because their positions are compressed
//! separately from both. Unreadable meshes count as failures.

use serde::Serialize;

use crate::comparator::MeshStatus;
use crate::position_extractor::Extraction;
use crate::scene::SceneDescription;
use crate::{ValidationRun, Vec3};

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Render a validation run.
pub fn render_run(run: &ValidationRun, format: ReportFormat) -> serde_json::Result<String> {
    match format {
        ReportFormat::Text => Ok(run_text(run)),
        ReportFormat::Json => serde_json::to_string_pretty(run),
    }
}

/// Render the contents of a single file.
pub fn render_inspection(
    label: &str,
    scene: &SceneDescription,
    extraction: &Extraction,
    format: ReportFormat,
) -> serde_json::Result<String> {
    match format {
        ReportFormat::Text => Ok(inspection_text(label, scene, extraction)),
        ReportFormat::Json => serde_json::to_string_pretty(&Inspection {
            file: label,
            meshes: scene.meshes().len(),
            extensions_used: scene.extensions_used().iter().map(String::as_str).collect(),
            uses_compression: scene.uses_compression(),
            extraction,
        }),
    }
}

#[derive(Serialize)]
struct Inspection<'a> {
    file: &'a str,
    meshes: usize,
    extensions_used: Vec<&'a str>,
    uses_compression: bool,
    extraction: &'a Extraction,
}

/// Text report of a validation run.
pub fn run_text(run: &ValidationRun) -> String {
    let mut out = String::new();
    out.push_str("=== Draco Round-Trip Validation ===\n");
    out.push_str(&format!(
        "Quantization: {} bits, tolerance multiplier {}\n",
        run.options.quantization_bits, run.options.tolerance_multiplier
    ));

    out.push_str("\nOriginal:\n");
    push_meshes(&mut out, &run.original);
    out.push_str("\nCandidate:\n");
    push_meshes(&mut out, &run.candidate);

    let diagnostics = run
        .original
        .diagnostics
        .iter()
        .map(|d| ("original", d))
        .chain(run.candidate.diagnostics.iter().map(|d| ("candidate", d)))
        .collect::<Vec<_>>();
    if !diagnostics.is_empty() {
        out.push_str(&format!("\nDiagnostics ({}):\n", diagnostics.len()));
        for (side, diagnostic) in diagnostics {
            out.push_str(&format!("  [{}] {}\n", side, diagnostic));
        }
    }

    out.push_str("\nComparison:\n");
    if run.verdict.per_mesh.is_empty() {
        out.push_str("  (no meshes in original)\n");
    }
    for (name, verdict) in &run.verdict.per_mesh {
        out.push_str(&format!("  [{}] {}: {}\n", verdict.status, name, verdict.detail));
    }

    let total = run.verdict.per_mesh.len();
    let matched = run.verdict.meshes_with(MeshStatus::Match).len();
    let failed = run.verdict.failures().count();
    let undecodable = run.verdict.undecodable_meshes();

    out.push_str("\n--- Summary ---\n");
    if run.verdict.overall_pass {
        out.push_str(&format!(
            "PASSED: {} meshes, {} matched, {} undecodable\n",
            total,
            matched,
            undecodable.len()
        ));
    } else {
        out.push_str(&format!("FAILED: {} of {} meshes diverge\n", failed, total));
        for (name, verdict) in run.verdict.failures() {
            out.push_str(&format!("  - {}: {}\n", name, verdict.status));
        }
    }
    if !undecodable.is_empty() {
        out.push_str(&format!(
            "NOT VERIFIED: {} compressed mesh(es) could not be decoded: {}\n",
            undecodable.len(),
            undecodable.join(", ")
        ));
    }

    out
}

/// Text report of a single file's meshes.
pub fn inspection_text(label: &str, scene: &SceneDescription, extraction: &Extraction) -> String {
    let mut out = String::new();
    out.push_str(&format!("File: {}\n", label));
    out.push_str(&format!("Meshes: {}\n", scene.meshes().len()));
    if !scene.extensions_used().is_empty() {
        let extensions: Vec<&str> = scene.extensions_used().iter().map(String::as_str).collect();
        out.push_str(&format!("Extensions used: {}\n", extensions.join(", ")));
    }
    if scene.uses_compression() {
        out.push_str("Compression: declared\n");
    }
    out.push('\n');
    push_meshes(&mut out, extraction);

    if !extraction.diagnostics.is_empty() {
        out.push_str(&format!("\nDiagnostics ({}):\n", extraction.diagnostics.len()));
        for diagnostic in &extraction.diagnostics {
            out.push_str(&format!("  {}\n", diagnostic));
        }
    }
    out
}

fn push_meshes(out: &mut String, extraction: &Extraction) {
    if extraction.positions.is_empty() {
        out.push_str("  (no meshes)\n");
        return;
    }
    for (name, positions) in extraction.positions.iter() {
        out.push_str(&format!("  {}: {} vertices\n", name, positions.len()));
        if let (Some(first), Some(last)) = (positions.first(), positions.last()) {
            out.push_str(&format!("    First vertex: {}\n", format_vec3(first)));
            out.push_str(&format!("    Last vertex:  {}\n", format_vec3(last)));
        }
    }
    for name in extraction.positions.undecodable() {
        let extensions: Vec<&str> = extraction
            .compressed
            .iter()
            .filter(|p| p.mesh_name == name)
            .map(|p| p.descriptor.extension.as_str())
            .collect();
        out.push_str(&format!(
            "  {}: compressed ({}), cannot decode locally\n",
            name,
            extensions.first().copied().unwrap_or("unknown extension")
        ));
    }
    for name in extraction.positions.unreadable() {
        out.push_str(&format!("  {}: positions could not be read\n", name));
    }
}

fn format_vec3(v: &Vec3) -> String {
    format!("({:.6}, {:.6}, {:.6})", v[0], v[1], v[2])
}

// ============================================================================
// Tests
// ============================================================================
