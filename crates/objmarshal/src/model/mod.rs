//! Data model for object graphs.
//!
//! - Graphs (arena of nodes addressed by [`ObjectId`])
//! - Values (the closed set of serializable kinds)
//! - Procedure records and their builder

pub mod graph;
pub mod procedure;
pub mod value;

pub use graph::{Graph, GraphMark, InterningTable, ObjectId};
pub use procedure::{PROCEDURE_VALUE_FIELDS, ProcedureBuilder, ProcedureRecord};
pub use value::{Text, Value};
