use std::fmt;

use super::lines::Line;
use super::shapes::{classify, Shape};
use super::value::{Document, ListItem, SectionValue};

/// Something the fold did silently: a line dropped or structure replaced.
/// Never an error; collected for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuringWarning {
    /// List, sub-item or content line seen before any section was opened.
    NoOpenSection { line: usize, shape: &'static str },
    /// A key/value or header line replaced an existing entry.
    Overwritten {
        line: usize,
        key: String,
        previous: &'static str,
    },
    /// A list item arrived on a non-list section and discarded its value.
    ReplacedByList {
        line: usize,
        section: String,
        previous: &'static str,
    },
    /// Plain content on a scalar or list section has nowhere to go.
    ContentDropped {
        line: usize,
        section: String,
        kind: &'static str,
    },
}

impl fmt::Display for StructuringWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOpenSection { line, shape } => {
                write!(f, "line {}: {} dropped, no section open", line + 1, shape)
            }
            Self::Overwritten {
                line,
                key,
                previous,
            } => write!(f, "line {}: '{}' overwrote a {} value", line + 1, key, previous),
            Self::ReplacedByList {
                line,
                section,
                previous,
            } => write!(
                f,
                "line {}: list item replaced {} value of '{}'",
                line + 1,
                previous,
                section
            ),
            Self::ContentDropped {
                line,
                section,
                kind,
            } => write!(
                f,
                "line {}: content dropped, '{}' holds a {}",
                line + 1,
                section,
                kind
            ),
        }
    }
}

/// Output of one fold: the document plus whatever was dropped along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structured {
    pub document: Document,
    pub warnings: Vec<StructuringWarning>,
}

#[derive(Debug, Default)]
struct Cursor {
    current_section: Option<String>,
}

/// Fold segmented lines into a document.
///
/// Only a header line moves the cursor. List, sub-item and content lines
/// always target the current section and are dropped when none is open.
pub fn fold_lines(lines: &[Line]) -> Structured {
    let mut fold = Fold::default();
    for (i, line) in lines.iter().enumerate() {
        fold.apply(i, classify(line));
    }
    fold.out
}

#[derive(Default)]
struct Fold {
    cursor: Cursor,
    out: Structured,
}

impl Fold {
    fn apply(&mut self, line: usize, shape: Shape) {
        match shape {
            Shape::KeyValue { key, value } => {
                self.insert(line, key, SectionValue::Scalar(value));
            }
            Shape::Header { key } => {
                // An empty key still gets an entry but cannot be a section.
                self.cursor.current_section = (!key.is_empty()).then(|| key.clone());
                self.insert(line, key, SectionValue::empty_composite());
            }
            Shape::Bullet(text) => self.push_item(line, "bullet", ListItem::Bullet(text)),
            Shape::Numbered { number, content } => {
                self.push_item(line, "numbered item", ListItem::Numbered { number, content })
            }
            Shape::SubItem(text) => {
                let Some((_, value)) = self.current(line, "sub-item") else {
                    return;
                };
                value.push_sub_item(text);
            }
            Shape::Content(text) => {
                let Some((section, value)) = self.current(line, "content") else {
                    return;
                };
                match value {
                    SectionValue::Composite(composite) => composite.content.push(text),
                    other => {
                        let kind = other.kind();
                        self.out.warnings.push(StructuringWarning::ContentDropped {
                            line,
                            section,
                            kind,
                        });
                    }
                }
            }
        }
    }

    fn insert(&mut self, line: usize, key: String, value: SectionValue) {
        if let Some(previous) = self.out.document.insert(key.clone(), value) {
            self.out.warnings.push(StructuringWarning::Overwritten {
                line,
                key,
                previous: previous.kind(),
            });
        }
    }

    fn push_item(&mut self, line: usize, shape: &'static str, item: ListItem) {
        let Some((section, value)) = self.current(line, shape) else {
            return;
        };
        let previous = value.kind();
        if value.push_item(item) {
            self.out.warnings.push(StructuringWarning::ReplacedByList {
                line,
                section,
                previous,
            });
        }
    }

    /// The open section and its value, or a warning when none is open.
    fn current(&mut self, line: usize, shape: &'static str) -> Option<(String, &mut SectionValue)> {
        let key = match &self.cursor.current_section {
            Some(key) if self.out.document.contains_key(key) => key.clone(),
            _ => {
                self.out
                    .warnings
                    .push(StructuringWarning::NoOpenSection { line, shape });
                return None;
            }
        };
        let value = self.out.document.get_mut(&key)?;
        Some((key, value))
    }
}

// ── Tests ──
