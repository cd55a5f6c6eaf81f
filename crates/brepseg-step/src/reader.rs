//! STEP reader: recovers the ordered face list of every solid in a file.
//!
//! Solids are visited in ascending entity id. Within a solid the outer shell
//! comes first, then void shells in the order `BREP_WITH_VOIDS` lists them;
//! within a shell, faces follow the shell's face list. The result is a pure
//! function of the file contents.

use std::path::Path;

use crate::error::StepError;
use crate::parser::{Parser, StepEntity, StepFile};

const SOLID_TYPES: &[&str] = &["MANIFOLD_SOLID_BREP", "BREP_WITH_VOIDS"];
const SHELL_TYPES: &[&str] = &["CLOSED_SHELL", "OPEN_SHELL"];
const FACE_TYPES: &[&str] = &["ADVANCED_FACE", "FACE_SURFACE"];

/// One face of a STEP solid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFace {
    /// Entity id of the face.
    pub id: u64,
    /// Entity id of the underlying surface.
    pub surface_id: u64,
    /// Type name of the underlying surface (e.g. `PLANE`).
    pub surface_type: String,
    /// Whether the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Number of boundary loops (outer plus holes).
    pub bound_count: usize,
}

/// A B-rep solid and its faces in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSolid {
    /// Entity id of the solid.
    pub id: u64,
    /// Solid label from the file (may be empty).
    pub name: String,
    /// Faces in traversal order.
    pub faces: Vec<StepFace>,
}

/// Read all solids and their faces from a STEP file on disk.
pub fn read_step_faces(path: impl AsRef<Path>) -> Result<Vec<StepSolid>, StepError> {
    let data = std::fs::read(path)?;
    read_step_faces_from_buffer(&data)
}

/// Read all solids and their faces from raw STEP file contents.
pub fn read_step_faces_from_buffer(data: &[u8]) -> Result<Vec<StepSolid>, StepError> {
    let file = Parser::parse(data)?;
    let solids = file
        .entities
        .values()
        .filter(|e| SOLID_TYPES.contains(&e.type_name.as_str()))
        .map(|e| read_solid(&file, e))
        .collect::<Result<Vec<_>, _>>()?;

    if solids.is_empty() {
        return Err(StepError::NoSolids);
    }
    Ok(solids)
}

fn read_solid(file: &StepFile, solid: &StepEntity) -> Result<StepSolid, StepError> {
    let mut shell_ids = vec![solid.ref_arg(1)?];
    if solid.type_name == "BREP_WITH_VOIDS" {
        for oriented_id in solid.ref_list_arg(2)? {
            let oriented = require_type(file, oriented_id, &["ORIENTED_CLOSED_SHELL"])?;
            shell_ids.push(oriented.ref_arg(2)?);
        }
    }

    let mut faces = Vec::new();
    for shell_id in shell_ids {
        let shell = require_type(file, shell_id, SHELL_TYPES)?;
        for face_id in shell.ref_list_arg(1)? {
            faces.push(read_face(file, face_id)?);
        }
    }

    Ok(StepSolid {
        id: solid.id,
        name: solid.label().to_string(),
        faces,
    })
}

fn read_face(file: &StepFile, face_id: u64) -> Result<StepFace, StepError> {
    let face = require_type(file, face_id, FACE_TYPES)?;
    let bound_count = face.ref_list_arg(1)?.len();
    let surface_id = face.ref_arg(2)?;
    let surface_type = file.require(surface_id)?.type_name.clone();

    Ok(StepFace {
        id: face_id,
        surface_id,
        surface_type,
        same_sense: face.bool_arg(3)?,
        bound_count,
    })
}

fn require_type<'a>(file: &'a StepFile, id: u64, expected: &[&str]) -> Result<&'a StepEntity, StepError> {
    let entity = file.require(id)?;
    if expected.contains(&entity.type_name.as_str()) {
        Ok(entity)
    } else {
        Err(StepError::type_mismatch(id, expected.join(" | "), &entity.type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(data: &str) -> String {
        format!("ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n")
    }

    const TWO_FACE_SOLID: &str = r#"
#10 = PLANE('', #1);
#11 = CYLINDRICAL_SURFACE('', #1, 2.);
#20 = ADVANCED_FACE('', (#30), #11, .T.);
#21 = ADVANCED_FACE('', (#31, #32), #10, .F.);
#40 = CLOSED_SHELL('', (#21, #20));
#50 = MANIFOLD_SOLID_BREP('bracket', #40);
"#;

    #[test]
    fn test_faces_follow_shell_order() {
        let solids = read_step_faces_from_buffer(wrap(TWO_FACE_SOLID).as_bytes()).unwrap();
        assert_eq!(solids.len(), 1);
        let solid = &solids[0];
        assert_eq!(solid.name, "bracket");
        let ids: Vec<u64> = solid.faces.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![21, 20]);
        assert_eq!(solid.faces[0].surface_type, "PLANE");
        assert_eq!(solid.faces[0].bound_count, 2);
        assert!(!solid.faces[0].same_sense);
        assert_eq!(solid.faces[1].surface_type, "CYLINDRICAL_SURFACE");
    }

    #[test]
    fn test_brep_with_voids_appends_void_faces() {
        let data = r#"
#10 = PLANE('', #1);
#20 = ADVANCED_FACE('', (#30), #10, .T.);
#21 = ADVANCED_FACE('', (#30), #10, .T.);
#22 = ADVANCED_FACE('', (#30), #10, .F.);
#40 = CLOSED_SHELL('', (#20, #21));
#41 = CLOSED_SHELL('', (#22));
#42 = ORIENTED_CLOSED_SHELL('', *, #41, .F.);
#50 = BREP_WITH_VOIDS('hollow', #40, (#42));
"#;
        let solids = read_step_faces_from_buffer(wrap(data).as_bytes()).unwrap();
        let ids: Vec<u64> = solids[0].faces.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![20, 21, 22]);
    }

    #[test]
    fn test_multiple_solids_in_id_order() {
        let data = r#"
#10 = PLANE('', #1);
#20 = ADVANCED_FACE('', (#30), #10, .T.);
#21 = ADVANCED_FACE('', (#30), #10, .T.);
#40 = CLOSED_SHELL('', (#20));
#41 = CLOSED_SHELL('', (#21));
#61 = MANIFOLD_SOLID_BREP('b', #41);
#60 = MANIFOLD_SOLID_BREP('a', #40);
"#;
        let solids = read_step_faces_from_buffer(wrap(data).as_bytes()).unwrap();
        let names: Vec<&str> = solids.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_no_solids() {
        let result = read_step_faces_from_buffer(wrap("#1 = PLANE('', #2);").as_bytes());
        assert!(matches!(result, Err(StepError::NoSolids)));
    }

    #[test]
    fn test_wrong_face_type() {
        let data = r#"
#20 = EDGE_LOOP('', ());
#40 = CLOSED_SHELL('', (#20));
#50 = MANIFOLD_SOLID_BREP('', #40);
"#;
        let result = read_step_faces_from_buffer(wrap(data).as_bytes());
        assert!(matches!(result, Err(StepError::TypeMismatch { id: 20, .. })));
    }

    #[test]
    fn test_dangling_surface() {
        let data = r#"
#20 = ADVANCED_FACE('', (#30), #99, .T.);
#40 = CLOSED_SHELL('', (#20));
#50 = MANIFOLD_SOLID_BREP('', #40);
"#;
        let result = read_step_faces_from_buffer(wrap(data).as_bytes());
        assert!(matches!(result, Err(StepError::MissingEntity(99))));
    }

    #[test]
    fn test_read_is_deterministic() {
        let src = wrap(TWO_FACE_SOLID);
        let a = read_step_faces_from_buffer(src.as_bytes()).unwrap();
        let b = read_step_faces_from_buffer(src.as_bytes()).unwrap();
        assert_eq!(a, b);
    }
}
