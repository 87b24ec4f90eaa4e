//! Tableau workbook → LookML translation
//!
//! [`parser`] reads the XML-shaped JSON document into the arena-backed
//! [`Workbook`] source model, [`to_lookml`] maps that model onto a
//! [`t2l_lookml::Project`]. Anything that cannot be translated faithfully is
//! recorded in a [`GapReport`] instead of aborting the run.

pub mod assess;
pub mod classify;
pub mod gap;
pub mod node;
pub mod parser;
pub mod refs;
pub mod to_lookml;
pub mod workbook;

pub use assess::{assess, assess_worksheet, formula_complexity, Complexity, WorksheetAssessment};
pub use classify::{classify, classify_worksheet, visualization, Classification, Shelves};
pub use gap::{Gap, GapKind, GapReport};
pub use parser::{parse_workbook, ParseError};
pub use refs::{parse_path, parse_qualified, parse_shelf, QualifiedRef};
pub use to_lookml::{derivation, map_field_kind, map_join_kind, translate, Derivation, Report, Summary, Translation};
pub use workbook::Workbook;

use serde_json::Value;
use t2l_lookml::ProjectSettings;

/// Parse and translate a workbook document in one call.
pub fn convert(document: &Value, name: &str, settings: ProjectSettings) -> Result<Translation, ParseError> {
    let mut gaps = GapReport::new();
    let workbook = parse_workbook(document, name, &mut gaps)?;
    Ok(translate(&workbook, settings, gaps))
}
