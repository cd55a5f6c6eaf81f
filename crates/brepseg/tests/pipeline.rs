//! End-to-end runs through the STEP loader.

use std::path::{Path, PathBuf};

use brepseg::{
    discover_cad_files, BatchRunner, EngineConfig, ExportFormat, FaceEnumerator, Intent, LabelCatalog,
    PaintBuffer, SegmentationDocument, Session, SidecarInference, StepLoader,
};

const THREE_FACE_PART: &str = "ISO-10303-21;
HEADER;
FILE_NAME('part.step', '2024-01-01', (''), (''), '', '', '');
ENDSEC;
DATA;
#10 = PLANE('', #1);
#11 = CYLINDRICAL_SURFACE('', #1, 2.5);
#12 = PLANE('', #2);
#20 = ADVANCED_FACE('', (#30), #11, .T.);
#21 = ADVANCED_FACE('', (#31), #10, .F.);
#22 = ADVANCED_FACE('', (#32), #12, .T.);
#40 = CLOSED_SHELL('', (#21, #20, #22));
#50 = MANIFOLD_SOLID_BREP('block', #40);
ENDSEC;
END-ISO-10303-21;
";

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn enumeration_is_stable_across_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "part.step", THREE_FACE_PART);

    let first = FaceEnumerator::load(&StepLoader, &path).unwrap();
    let second = FaceEnumerator::load(&StepLoader, &path).unwrap();
    let a: Vec<u64> = first.faces().map(|f| f.entity_id).collect();
    let b: Vec<u64> = second.faces().map(|f| f.entity_id).collect();
    assert_eq!(a, vec![21, 20, 22]);
    assert_eq!(a, b);
    assert_eq!(first.faces().count(), first.faces().count());
}

#[test]
fn batch_isolates_bad_file() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    write(input.path(), "good.step", THREE_FACE_PART);
    write(input.path(), "bad.step", "this is not a STEP file");
    write(input.path(), "good2.step", THREE_FACE_PART);
    for stem in ["good", "bad", "good2"] {
        write(input.path(), &format!("{stem}.seg"), "0 1 1");
    }

    let inputs: Vec<PathBuf> = ["good.step", "bad.step", "good2.step"]
        .iter()
        .map(|n| input.path().join(n))
        .collect();
    let catalog = LabelCatalog::from_names(["hole", "slot"], &[]);
    let runner = BatchRunner::new(&StepLoader, &catalog, work.path());
    let report = runner
        .run_with(&inputs, output.path(), &SidecarInference::new())
        .unwrap();

    assert_eq!(report.done(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.cancelled(), 0);

    let written = discover_cad_files(output.path(), &["seg".to_string()]).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(
        std::fs::read_to_string(output.path().join("good2.seg")).unwrap(),
        "0\n1\n1\n"
    );
}

#[test]
fn session_display_and_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let step = write(dir.path(), "part.step", THREE_FACE_PART);
    let model = write(dir.path(), "seg_model.ckpt", "weights");
    write(dir.path(), "seg_model.json", r#"{"0": "plane", "1": "cylinder", "2": "fillet"}"#);

    let mut session = Session::new(Box::new(StepLoader), PaintBuffer::new(), EngineConfig::default());
    assert!(session.load_model(&model).unwrap());
    assert_eq!(session.load_geometry(&step).unwrap(), 3);
    assert!(session.is_ready());

    let report = session.display(&[0, 1, 9]).unwrap();
    assert_eq!(report.clamped_faces(), vec![2]);

    session.apply(Intent::IsolateCategory(1));
    let isolated = session.registry().paint_state();
    session.apply(Intent::IsolateCategory(1));
    assert_eq!(session.registry().paint_state(), isolated);

    let out = dir.path().join("part.json");
    session.export(ExportFormat::Json, &out).unwrap();
    let doc = SegmentationDocument::from_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc.face_labels, vec![0, 1, 2]);
    assert_eq!(doc.model, "seg_model.ckpt");
    assert_eq!(doc.step_file, "part.step");
    assert_eq!(&doc.catalog(), session.catalog());
}
