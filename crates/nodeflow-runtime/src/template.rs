//! Variable resolution for `{{nodeId[path]}}` references in parameters.
//!
//! A reference names an already-executed node and a property path into its
//! executed record, rooted at `data`. References may nest; inner ones are
//! resolved first. `$index` inside a path is replaced by the current loop
//! iteration when the node is loop-expanded.

use nodeflow_core::path::PropertyPath;
use nodeflow_core::{ExecutedRecord, Value};

pub const INDEX_PLACEHOLDER: &str = "$index";

/// Parameters with this name embed strings quoted and structures as JSON,
/// so the result can be spliced into generated code.
pub const CODE_KEY: &str = "code";

const OPEN: &[u8; 2] = b"{{";
const CLOSE: &[u8; 2] = b"}}";

/// One balanced `{{...}}` occurrence in a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence<'t> {
    /// Byte offset of the opening `{{`
    pub start: usize,
    /// Byte offset just past the closing `}}`
    pub end: usize,
    /// Text between the delimiters
    pub inner: &'t str,
}

impl<'t> Occurrence<'t> {
    pub fn text<'s>(&self, template: &'s str) -> &'s str {
        &template[self.start..self.end]
    }
}

/// Find balanced occurrences, innermost first. Unmatched delimiters are
/// ignored.
pub fn scan(template: &str) -> Vec<Occurrence<'_>> {
    let bytes = template.as_bytes();
    let mut stack = Vec::new();
    let mut found = Vec::new();

    for i in 0..bytes.len().saturating_sub(1) {
        let pair = &bytes[i..i + 2];
        if pair == OPEN {
            stack.push(i + 2);
        } else if pair == CLOSE {
            if let Some(inner_start) = stack.pop() {
                found.push(Occurrence {
                    start: inner_start - 2,
                    end: i + 2,
                    inner: &template[inner_start..i],
                });
            }
        }
    }

    found
}

/// Parsed form of the text inside `{{` and `}}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    pub node_id: String,
    /// Property path rooted at `data`, still containing any `$index`
    pub path: String,
}

impl VariableReference {
    /// Split at the first `[`: the node id before it, the path after it.
    pub fn parse(inner: &str) -> Self {
        match inner.split_once('[') {
            Some((node_id, rest)) => Self {
                node_id: node_id.trim().to_string(),
                path: format!("data[{}", rest),
            },
            None => Self {
                node_id: inner.trim().to_string(),
                path: "data".to_string(),
            },
        }
    }

    pub fn has_index(&self) -> bool {
        self.path.contains(INDEX_PLACEHOLDER)
    }

    /// The path with `$index` substituted, if a loop index is given
    pub fn path_for(&self, loop_index: Option<usize>) -> String {
        match loop_index {
            Some(index) => self.path.replace(INDEX_PLACEHOLDER, &index.to_string()),
            None => self.path.clone(),
        }
    }

    /// The path up to the first `[$index]`, naming the looped-over array
    pub fn array_path(&self) -> Option<&str> {
        let marker = format!("[{}]", INDEX_PLACEHOLDER);
        self.path.find(&marker).map(|at| &self.path[..at])
    }
}

/// Resolves references against the records executed so far
pub struct VariableResolver<'a> {
    executed: &'a [ExecutedRecord],
}

impl<'a> VariableResolver<'a> {
    pub fn new(executed: &'a [ExecutedRecord]) -> Self {
        Self { executed }
    }

    /// Most recent record for a node id
    pub fn find(&self, node_id: &str) -> Option<&'a ExecutedRecord> {
        self.executed.iter().rev().find(|r| r.node_id == node_id)
    }

    /// Look up a reference. `None` when the node has not executed;
    /// `Some(None)` when it has but the path does not resolve.
    pub fn lookup(
        &self,
        reference: &VariableReference,
        key: &str,
        loop_index: Option<usize>,
    ) -> Option<Option<Value>> {
        let record = self.find(&reference.node_id)?;
        let path = self.resolve(&reference.path_for(loop_index), key, loop_index);
        Some(PropertyPath::parse(&path).lookup_record(record))
    }

    /// Resolve every occurrence in `template` into text.
    ///
    /// References to nodes that have not run are left verbatim; references
    /// whose path does not resolve become the empty string.
    pub fn resolve(&self, template: &str, key: &str, loop_index: Option<usize>) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }

        let mut substitutions: Vec<(&str, String)> = Vec::new();
        for occurrence in scan(template) {
            let text = occurrence.text(template);
            if substitutions.iter().any(|(seen, _)| *seen == text) {
                continue;
            }
            let reference = VariableReference::parse(occurrence.inner);
            if let Some(value) = self.lookup(&reference, key, loop_index) {
                substitutions.push((text, embed(value.as_ref(), key)));
            }
        }

        // Longer occurrences may contain shorter ones, so they go first.
        substitutions.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut resolved = template.to_string();
        for (text, replacement) in substitutions {
            resolved = resolved.replace(text, &replacement);
        }
        resolved
    }

    /// Resolve a parameter string into a value. A string that is exactly one
    /// reference to an executed node yields the referent itself, keeping
    /// arrays, objects and numbers native; anything else resolves to text.
    pub fn resolve_value(&self, template: &str, key: &str, loop_index: Option<usize>) -> Value {
        if key != CODE_KEY {
            let whole = scan(template)
                .into_iter()
                .find(|o| o.start == 0 && o.end == template.len());
            if let Some(occurrence) = whole {
                let reference = VariableReference::parse(occurrence.inner);
                if let Some(value) = self.lookup(&reference, key, loop_index) {
                    return value.unwrap_or_else(|| Value::String(String::new()));
                }
            }
        }
        Value::String(self.resolve(template, key, loop_index))
    }
}

fn embed(value: Option<&Value>, key: &str) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) if key == CODE_KEY => format!("\"{}\"", s),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
