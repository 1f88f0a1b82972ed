//! End-to-end validation of GLB pairs.

mod common;

use common::{build_glb, cube, shifted, GlbBuilder};
use draco_validate::{
    load_file, validate, CompressionDescriptor, ComparisonOptions, ContainerError,
    DecodeUnavailable, DiagnosticKind, MeshStatus, ParsedFile, PositionDecoder, Side,
    ValidateError, Vec3,
};
use byteorder::{ByteOrder, LittleEndian};
use std::fs;

fn run(original: &[u8], candidate: &[u8]) -> draco_validate::ValidationRun {
    validate(original, candidate, &ComparisonOptions::default(), None).unwrap()
}

fn mesh_of(name: &str, positions: &[Vec3]) -> Vec<u8> {
    GlbBuilder::new().mesh(Some(name), &[positions]).to_glb()
}

#[test]
fn test_identical_files_match() {
    let glb = mesh_of("Cube", &cube(1.0));
    let run = run(&glb, &glb);

    let verdict = &run.verdict.per_mesh["Cube"];
    assert_eq!(verdict.status, MeshStatus::Match);
    assert_eq!(verdict.max_abs_deviation, Some(0.0));
    assert!(run.verdict.overall_pass);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(run.original.positions.get("Cube").unwrap().len(), 8);
}

#[test]
fn test_vertex_count_mismatch() {
    let positions: Vec<Vec3> = (0..12).map(|i| [i as f32, 0.0, 0.0]).collect();
    let original = mesh_of("Strip", &positions);
    let candidate = mesh_of("Strip", &positions[..11]);
    let run = run(&original, &candidate);

    let verdict = &run.verdict.per_mesh["Strip"];
    assert_eq!(verdict.status, MeshStatus::VertexCountMismatch);
    assert_eq!(verdict.detail, "vertex count mismatch: 12 vs 11");
    assert!(!run.verdict.overall_pass);
    assert_eq!(run.exit_code(), 1);
}

#[test]
fn test_quantization_noise_is_tolerated() {
    // Extent 2.0 at 14 bits and x10 allows about 0.00122.
    let original = mesh_of("Cube", &cube(1.0));
    let candidate = mesh_of("Cube", &shifted(&cube(1.0), 0.001));
    let run = run(&original, &candidate);

    let verdict = &run.verdict.per_mesh["Cube"];
    assert_eq!(verdict.status, MeshStatus::Match);
    let deviation = verdict.max_abs_deviation.unwrap();
    assert!(deviation > 0.0009 && deviation < 0.0011);
    assert!((verdict.allowed_deviation.unwrap() - 2.0 / 16384.0 * 10.0).abs() < 1e-12);
}

#[test]
fn test_position_drift_fails() {
    let original = mesh_of("Cube", &cube(1.0));
    let candidate = mesh_of("Cube", &shifted(&cube(1.0), 0.01));
    let run = run(&original, &candidate);

    let verdict = &run.verdict.per_mesh["Cube"];
    assert_eq!(verdict.status, MeshStatus::PositionMismatch);
    assert!(verdict.worst_vertex_index.is_some());
    assert!(!run.verdict.overall_pass);
}

#[test]
fn test_tighter_options_reject_small_noise() {
    let original = mesh_of("Cube", &cube(1.0));
    let candidate = mesh_of("Cube", &shifted(&cube(1.0), 0.001));
    let options = ComparisonOptions::new().with_tolerance_multiplier(1.0);
    let run = validate(&original, &candidate, &options, None).unwrap();

    assert_eq!(run.verdict.per_mesh["Cube"].status, MeshStatus::PositionMismatch);
}

#[test]
fn test_missing_mesh_in_candidate() {
    let tri: Vec<Vec3> = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let original = GlbBuilder::new()
        .mesh(Some("Cube"), &[cube(1.0)])
        .mesh(Some("Tri"), &[tri])
        .to_glb();
    let candidate = mesh_of("Cube", &cube(1.0));
    let run = run(&original, &candidate);

    assert_eq!(run.verdict.per_mesh["Cube"].status, MeshStatus::Match);
    assert_eq!(run.verdict.per_mesh["Tri"].status, MeshStatus::MissingInCandidate);
    assert!(!run.verdict.overall_pass);
}

#[test]
fn test_extra_candidate_meshes_are_ignored() {
    let original = mesh_of("Cube", &cube(1.0));
    let candidate = GlbBuilder::new()
        .mesh(Some("Cube"), &[cube(1.0)])
        .mesh(Some("Extra"), &[cube(3.0)])
        .to_glb();
    let run = run(&original, &candidate);

    assert_eq!(run.verdict.per_mesh.len(), 1);
    assert!(run.verdict.overall_pass);
}

#[test]
fn test_compressed_candidate_is_undecodable() {
    let original = mesh_of("Cube", &cube(1.0));
    let candidate = GlbBuilder::new()
        .draco_mesh(Some("Cube"), 8, b"DRACO\x02\x02\x01\x01")
        .to_glb();
    let run = run(&original, &candidate);

    let verdict = &run.verdict.per_mesh["Cube"];
    assert_eq!(verdict.status, MeshStatus::Undecodable);
    assert_eq!(verdict.max_abs_deviation, None);
    assert!(run.verdict.overall_pass);
    assert!(run.verdict.has_undecodable());

    assert!(run.candidate.positions.is_undecodable("Cube"));
    assert_eq!(run.candidate.compressed.len(), 1);
    assert!(!run.candidate.compressed[0].decoded);
    assert!(run.candidate.diagnostics.is_empty());
}

struct CubeDecoder;

impl PositionDecoder for CubeDecoder {
    fn decode_positions(
        &self,
        descriptor: &CompressionDescriptor,
        payload: &[u8],
    ) -> Result<Vec<Vec3>, DecodeUnavailable> {
        if descriptor.attributes.get("POSITION") != Some(&0) || payload.is_empty() {
            return Err(DecodeUnavailable::new("unexpected descriptor"));
        }
        Ok(shifted(&cube(1.0), 0.0005))
    }
}

#[test]
fn test_supplied_decoder_verifies_compressed_meshes() {
    let original = mesh_of("Cube", &cube(1.0));
    let candidate = GlbBuilder::new()
        .draco_mesh(Some("Cube"), 8, b"DRACO")
        .to_glb();
    let run = validate(
        &original,
        &candidate,
        &ComparisonOptions::default(),
        Some(&CubeDecoder),
    )
    .unwrap();

    assert_eq!(run.verdict.per_mesh["Cube"].status, MeshStatus::Match);
    assert!(run.candidate.compressed[0].decoded);
    assert!(!run.verdict.has_undecodable());
}

#[test]
fn test_primitives_are_concatenated_in_order() {
    let first: &[Vec3] = &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
    let second: &[Vec3] = &[[5.0, 5.0, 5.0]];
    let glb = GlbBuilder::new().mesh(Some("Split"), &[first, second]).to_glb();

    let file = ParsedFile::from_bytes(&glb).unwrap();
    let extraction = file.extract(None);
    let expected: Vec<Vec3> = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [5.0, 5.0, 5.0]];
    assert_eq!(extraction.positions.get("Split").unwrap(), expected.as_slice());
}

#[test]
fn test_unnamed_meshes_use_index_names() {
    let glb = GlbBuilder::new()
        .mesh(None, &[cube(1.0)])
        .mesh(None, &[cube(2.0)])
        .to_glb();
    let run = run(&glb, &glb);

    let names: Vec<&str> = run.verdict.per_mesh.keys().map(String::as_str).collect();
    assert_eq!(names, ["mesh_0", "mesh_1"]);
    assert!(run.verdict.overall_pass);
}

#[test]
fn test_duplicate_mesh_names_keep_first() {
    let glb = GlbBuilder::new()
        .mesh(Some("Dup"), &[cube(1.0)])
        .mesh(Some("Dup"), &[cube(5.0)])
        .to_glb();
    let file = ParsedFile::from_bytes(&glb).unwrap();
    let extraction = file.extract(None);

    assert_eq!(extraction.positions.len(), 1);
    assert_eq!(extraction.positions.get("Dup").unwrap()[7], [1.0, 1.0, 1.0]);
    assert!(matches!(
        extraction.diagnostics[0].kind,
        DiagnosticKind::DuplicateMeshName { first_index: 0 }
    ));
}

#[test]
fn test_mesh_without_payload_is_diagnosed() {
    let json = br#"{"meshes":[{"name":"Cube","primitives":[{"attributes":{"POSITION":0}}]}],
"accessors":[{"bufferView":0,"count":8,"componentType":5126,"type":"VEC3"}],
"bufferViews":[{"buffer":0,"byteLength":96}]}"#;
    let glb = build_glb(json, None);
    let file = ParsedFile::from_bytes(&glb).unwrap();
    let extraction = file.extract(None);

    assert!(file.payload().is_none());
    assert!(extraction.positions.get("Cube").is_none());
    assert!(extraction.positions.is_unreadable("Cube"));
    assert!(matches!(
        extraction.diagnostics[0].kind,
        DiagnosticKind::MissingPayload { needed: 96 }
    ));
}

#[test]
fn test_identically_unreadable_files_do_not_pass() {
    // POSITION needs 96 bytes; the payload chunk holds 4.
    let json = br#"{"meshes":[{"name":"Cube","primitives":[{"attributes":{"POSITION":0}}]}],
"accessors":[{"bufferView":0,"count":8,"componentType":5126,"type":"VEC3"}],
"bufferViews":[{"buffer":0,"byteLength":96}]}"#;
    let glb = build_glb(json, Some(&[0u8; 4][..]));
    let run = run(&glb, &glb);

    let verdict = &run.verdict.per_mesh["Cube"];
    assert_eq!(verdict.status, MeshStatus::Unreadable);
    assert_eq!(verdict.max_abs_deviation, None);
    assert!(!run.verdict.overall_pass);
    assert_eq!(run.exit_code(), 1);
    assert!(matches!(
        run.original.diagnostics[0].kind,
        DiagnosticKind::OutOfRange { end: 96, payload_len: 4 }
    ));
}

#[test]
fn test_unreadable_candidate_fails() {
    let original = mesh_of("Cube", &cube(1.0));
    let json = br#"{"meshes":[{"name":"Cube","primitives":[{"attributes":{"POSITION":3}}]}]}"#;
    let candidate = build_glb(json, None);
    let run = run(&original, &candidate);

    let verdict = &run.verdict.per_mesh["Cube"];
    assert_eq!(verdict.status, MeshStatus::Unreadable);
    assert_eq!(verdict.detail, "positions in candidate could not be read");
    assert!(!run.verdict.overall_pass);
}

const PACKED_TAG: &[u8; 4] = b"PKD1";

/// A stand-in codec stream: a tag followed by raw little-endian floats.
fn packed_stream(positions: &[Vec3]) -> Vec<u8> {
    let mut stream = PACKED_TAG.to_vec();
    for p in positions {
        for &c in p {
            stream.extend_from_slice(&c.to_le_bytes());
        }
    }
    stream
}

/// Decodes only what its descriptor points at.
struct PackedDecoder;

impl PositionDecoder for PackedDecoder {
    fn decode_positions(
        &self,
        descriptor: &CompressionDescriptor,
        payload: &[u8],
    ) -> Result<Vec<Vec3>, DecodeUnavailable> {
        let bytes = descriptor
            .payload_slice(payload)
            .ok_or_else(|| DecodeUnavailable::new("stream outside payload"))?;
        let body = bytes
            .strip_prefix(&PACKED_TAG[..])
            .ok_or_else(|| DecodeUnavailable::new("not a packed stream"))?;
        if body.len() % 12 != 0 {
            return Err(DecodeUnavailable::new("ragged stream"));
        }
        Ok(body
            .chunks_exact(12)
            .map(|v| {
                [
                    LittleEndian::read_f32(&v[0..4]),
                    LittleEndian::read_f32(&v[4..8]),
                    LittleEndian::read_f32(&v[8..12]),
                ]
            })
            .collect())
    }
}

#[test]
fn test_one_decoder_reads_streams_at_different_offsets() {
    let original_stream = packed_stream(&cube(1.0));
    let candidate_stream = packed_stream(&shifted(&cube(1.0), 0.0005));

    // The original's stream follows 96 bytes of plain positions; the
    // candidate's starts the payload.
    let original = GlbBuilder::new()
        .mesh(Some("Plain"), &[cube(2.0)])
        .draco_mesh(Some("Cube"), 8, &original_stream)
        .to_glb();
    let candidate = GlbBuilder::new()
        .draco_mesh(Some("Cube"), 8, &candidate_stream)
        .mesh(Some("Plain"), &[cube(2.0)])
        .to_glb();

    let run = validate(
        &original,
        &candidate,
        &ComparisonOptions::default(),
        Some(&PackedDecoder),
    )
    .unwrap();

    assert_eq!(run.original.compressed[0].descriptor.byte_range, Some(96..96 + original_stream.len()));
    assert_eq!(run.candidate.compressed[0].descriptor.byte_range, Some(0..candidate_stream.len()));
    assert!(run.original.diagnostics.is_empty());
    assert!(run.candidate.diagnostics.is_empty());

    let cube_verdict = &run.verdict.per_mesh["Cube"];
    assert_eq!(cube_verdict.status, MeshStatus::Match);
    let deviation = cube_verdict.max_abs_deviation.unwrap();
    assert!(deviation > 0.0004 && deviation < 0.0006);
    assert_eq!(run.verdict.per_mesh["Plain"].status, MeshStatus::Match);
    assert!(run.verdict.overall_pass);
    assert!(!run.verdict.has_undecodable());
}

#[test]
fn test_malformed_candidate_is_labelled() {
    let original = mesh_of("Cube", &cube(1.0));
    let err = validate(&original, b"PK\x03\x04 not a glb", &ComparisonOptions::default(), None)
        .unwrap_err();

    match &err {
        ValidateError::Input { side, .. } => assert_eq!(*side, Side::Candidate),
        other => panic!("expected labelled error, got {:?}", other),
    }
    assert!(matches!(
        err.root(),
        ValidateError::MalformedContainer(ContainerError::BadMagic)
    ));
}

#[test]
fn test_truncated_original_is_labelled() {
    let mut original = mesh_of("Cube", &cube(1.0));
    original.truncate(original.len() - 16);
    let candidate = mesh_of("Cube", &cube(1.0));
    let err = validate(&original, &candidate, &ComparisonOptions::default(), None).unwrap_err();

    assert!(err.to_string().starts_with("original file: malformed container: truncated chunk"));
    assert!(matches!(
        err.root(),
        ValidateError::MalformedContainer(ContainerError::TruncatedChunk { index: 1, .. })
    ));
}

#[test]
fn test_invalid_metadata_is_error() {
    let glb = build_glb(br#"{"meshes": 7}"#, None);
    let err = ParsedFile::from_bytes(&glb).unwrap_err();
    assert!(matches!(err, ValidateError::InvalidSceneDescription(_)));
}

#[test]
fn test_open_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.glb");
    let glb = mesh_of("Cube", &cube(0.5));
    fs::write(&path, &glb).unwrap();

    assert_eq!(load_file(&path).unwrap(), glb);
    let file = ParsedFile::open(&path).unwrap();
    assert_eq!(file.scene().meshes().len(), 1);
    assert_eq!(file.container().chunks().len(), 2);

    let missing = load_file(dir.path().join("missing.glb")).unwrap_err();
    assert!(matches!(missing, ValidateError::Io(_)));
}
