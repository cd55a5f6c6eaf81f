//! Result export to `.seg`, `.txt` and `.json`.
//!
//! Every export is rendered fully in memory and then written atomically, so
//! a failed export never leaves a truncated file behind.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::binder::FaceRecord;
use crate::catalog::{Category, LabelCatalog, Rgb};
use crate::error::{EngineError, EngineResult};
use crate::stats::CategoryStats;

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Full structure, enough to rebuild the view.
    Json,
    /// One category id per line.
    PlainSeg,
    /// Human-readable report.
    Text,
}

impl ExportFormat {
    /// Format implied by a file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::PlainSeg => "seg",
            ExportFormat::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "seg" => Ok(ExportFormat::PlainSeg),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(EngineError::Config(format!("unknown export format: {other}"))),
        }
    }
}

/// File names recorded in report headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMeta {
    /// Model file base name.
    pub model_file: Option<String>,
    /// Geometry file base name.
    pub geometry_file: Option<String>,
}

impl ExportMeta {
    /// Metadata from optional model and geometry paths, keeping base names.
    pub fn from_paths(model: Option<&Path>, geometry: Option<&Path>) -> Self {
        let base = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());
        Self {
            model_file: model.and_then(base),
            geometry_file: geometry.and_then(base),
        }
    }
}

const UNKNOWN: &str = "unknown";

/// The JSON export document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationDocument {
    /// Model file base name.
    pub model: String,
    /// Geometry file base name.
    pub step_file: String,
    /// Number of faces.
    pub total_faces: usize,
    /// Category name to face count, for every category.
    pub label_distribution: serde_json::Map<String, serde_json::Value>,
    /// Category id per face, in face order.
    pub face_labels: Vec<usize>,
    /// Category colors in id order.
    pub label_colors: Vec<Rgb>,
    /// Category names in id order.
    pub label_names: Vec<String>,
}

impl SegmentationDocument {
    /// Build the document for `records`.
    pub fn new(records: &[FaceRecord], catalog: &LabelCatalog, meta: &ExportMeta) -> Self {
        let stats = CategoryStats::compute(records, catalog);
        let label_distribution = catalog
            .categories()
            .iter()
            .zip(&stats.counts)
            .map(|(c, &count)| (c.name.clone(), serde_json::Value::from(count)))
            .collect();

        Self {
            model: meta.model_file.clone().unwrap_or_else(|| UNKNOWN.into()),
            step_file: meta.geometry_file.clone().unwrap_or_else(|| UNKNOWN.into()),
            total_faces: records.len(),
            label_distribution,
            face_labels: records.iter().map(|r| r.category_id).collect(),
            label_colors: catalog.categories().iter().map(|c| c.color).collect(),
            label_names: catalog.categories().iter().map(|c| c.name.clone()).collect(),
        }
    }

    /// Parse a document previously written by [`export`].
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rebuild the catalog stored in the document.
    pub fn catalog(&self) -> LabelCatalog {
        LabelCatalog::new(
            self.label_names
                .iter()
                .zip(&self.label_colors)
                .map(|(name, &color)| Category {
                    name: name.clone(),
                    color,
                })
                .collect(),
        )
    }
}

/// Render `records` in `format` without touching the filesystem.
pub fn render(
    records: &[FaceRecord],
    catalog: &LabelCatalog,
    format: ExportFormat,
    meta: &ExportMeta,
) -> EngineResult<String> {
    match format {
        ExportFormat::PlainSeg => Ok(render_seg(records.iter().map(|r| r.category_id))),
        ExportFormat::Text => Ok(render_text(records, catalog, meta)),
        ExportFormat::Json => {
            let doc = SegmentationDocument::new(records, catalog, meta);
            Ok(serde_json::to_string_pretty(&doc)?)
        }
    }
}

/// Render `records` and write them atomically to `path`.
pub fn export(
    records: &[FaceRecord],
    catalog: &LabelCatalog,
    format: ExportFormat,
    path: &Path,
    meta: &ExportMeta,
) -> EngineResult<()> {
    let contents = render(records, catalog, format, meta)?;
    write_atomic(path, contents.as_bytes())?;
    info!(path = %path.display(), ?format, faces = records.len(), "exported results");
    Ok(())
}

/// One id per line, each line newline-terminated.
pub fn render_seg(ids: impl IntoIterator<Item = usize>) -> String {
    let mut out = String::new();
    for id in ids {
        let _ = writeln!(out, "{id}");
    }
    out
}

fn render_text(records: &[FaceRecord], catalog: &LabelCatalog, meta: &ExportMeta) -> String {
    let stats = CategoryStats::compute(records, catalog);
    let mut out = String::new();
    let _ = writeln!(out, "3D CAD Segmentation Report");
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(out, "Model file: {}", meta.model_file.as_deref().unwrap_or(UNKNOWN));
    let _ = writeln!(out, "STEP file: {}", meta.geometry_file.as_deref().unwrap_or(UNKNOWN));
    let _ = writeln!(out, "Total faces: {}", stats.total);
    let _ = writeln!(out);
    let _ = writeln!(out, "Category distribution:");
    for row in stats.nonzero(catalog) {
        let _ = writeln!(out, "{}: {} ({:.1}%)", row.name, row.count, row.percentage);
    }
    out
}

/// Write `contents` to `path` through a temporary file in the same directory.
///
/// Either the complete file appears at `path` or nothing changes there.
pub fn write_atomic(path: &Path, contents: &[u8]) -> EngineResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| EngineError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| EngineError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| EngineError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| EngineError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FaceHandle;

    fn records(ids: &[usize]) -> Vec<FaceRecord> {
        ids.iter()
            .enumerate()
            .map(|(i, &category_id)| FaceRecord {
                face_index: i,
                category_id,
                face: FaceHandle {
                    solid_id: 1,
                    entity_id: i as u64,
                    surface_type: "PLANE".into(),
                },
            })
            .collect()
    }

    fn catalog() -> LabelCatalog {
        LabelCatalog::from_names(["hole", "slot", "chamfer"], &[])
    }

    #[test]
    fn test_text_percentages() {
        let recs = records(&[0, 0, 0, 0, 0, 0, 1, 1, 1, 1]);
        let meta = ExportMeta::from_paths(None, Some(Path::new("/data/part.step")));
        let text = render(&recs, &catalog(), ExportFormat::Text, &meta).unwrap();
        assert!(text.contains("Total faces: 10"));
        assert!(text.contains("hole: 6 (60.0%)"));
        assert!(text.contains("slot: 4 (40.0%)"));
        assert!(!text.contains("chamfer"));
        assert!(text.contains("STEP file: part.step"));
        assert!(text.contains("Model file: unknown"));
    }

    #[test]
    fn test_text_rounds_to_one_decimal() {
        let text = render(&records(&[0, 1, 1]), &catalog(), ExportFormat::Text, &ExportMeta::default()).unwrap();
        assert!(text.contains("hole: 1 (33.3%)"));
        assert!(text.contains("slot: 2 (66.7%)"));
    }

    #[test]
    fn test_seg_lines() {
        let seg = render(&records(&[2, 0, 1]), &catalog(), ExportFormat::PlainSeg, &ExportMeta::default()).unwrap();
        assert_eq!(seg, "2\n0\n1\n");
    }

    #[test]
    fn test_json_round_trip() {
        let recs = records(&[1, 0, 2, 2, 1]);
        let json = render(&recs, &catalog(), ExportFormat::Json, &ExportMeta::default()).unwrap();
        let doc = SegmentationDocument::from_json(&json).unwrap();
        let expected: Vec<usize> = recs.iter().map(|r| r.category_id).collect();
        assert_eq!(doc.face_labels, expected);
        assert_eq!(doc.total_faces, 5);
        assert_eq!(doc.catalog(), catalog());
        assert_eq!(doc.label_distribution["chamfer"], serde_json::json!(2));
        assert_eq!(doc.label_distribution["hole"], serde_json::json!(1));
    }

    #[test]
    fn test_malformed_document_is_a_serialization_error() {
        let err = SegmentationDocument::from_json("not json").unwrap_err();
        assert!(matches!(err, EngineError::Serialization(_)));
        let err = SegmentationDocument::from_json(r#"{"model": "m"}"#).unwrap_err();
        assert!(matches!(err, EngineError::Serialization(_)));
    }

    #[test]
    fn test_json_color_layout() {
        let json = render(&records(&[0]), &catalog(), ExportFormat::Json, &ExportMeta::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["label_colors"][0], serde_json::json!([255, 0, 0]));
        assert_eq!(value["model"], "unknown");
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.seg");
        export(&records(&[1, 1]), &catalog(), ExportFormat::PlainSeg, &path, &ExportMeta::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n1\n");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_export_to_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let err = export(&records(&[0]), &catalog(), ExportFormat::Json, &path, &ExportMeta::default()).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("SEG".parse::<ExportFormat>().unwrap(), ExportFormat::PlainSeg);
        assert_eq!(ExportFormat::from_path(Path::new("r.txt")), Some(ExportFormat::Text));
        assert_eq!(ExportFormat::from_path(Path::new("r.bin")), None);
        assert_eq!(ExportFormat::Json.extension(), "json");
    }
}
