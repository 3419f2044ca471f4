pub mod lines;
pub mod sections;
pub mod shapes;
pub mod value;

use tracing::debug;

pub use sections::{Structured, StructuringWarning};
pub use value::Document;

/// Three-step pipeline: raw text → lines → shapes → structured document.
///
/// Total over any input; odd lines are dropped and reported as warnings.
pub fn structure_text(text: &str) -> Structured {
    let lines = lines::segment(text);
    let structured = sections::fold_lines(&lines);
    for warning in &structured.warnings {
        debug!("{}", warning);
    }
    debug!(
        "Structured {} lines into {} sections ({} warnings)",
        lines.len(),
        structured.document.len(),
        structured.warnings.len()
    );
    structured
}
