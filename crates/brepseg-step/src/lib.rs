#![warn(missing_docs)]

//! STEP face traversal for brepseg.
//!
//! Reads ISO 10303-21 (Part 21) files just far enough to recover the faces of
//! every B-rep solid they contain, in the order the file lists them. Surface
//! and edge geometry is not evaluated; each face is reported as its entity id
//! plus the type of its underlying surface.
//!
//! # Example
//!
//! ```no_run
//! use brepseg_step::read_step_faces;
//!
//! let solids = read_step_faces("part.step").unwrap();
//! let face_count: usize = solids.iter().map(|s| s.faces.len()).sum();
//! println!("{face_count} faces");
//! ```

mod error;
mod lexer;
mod parser;
mod reader;

pub use error::StepError;
pub use reader::{read_step_faces, read_step_faces_from_buffer, StepFace, StepSolid};
