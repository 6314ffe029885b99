//! Property-access paths into executed records.
//!
//! Paths mix dot and bracket access the way template authors write them:
//! `data[0].data.value`, `data["key"]`, `data[data][0].value`. A key applied
//! to an array addresses the array's first element, so a node that produced
//! a single result record can be addressed without an explicit `[0]`.

use crate::ExecutedRecord;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyPath {
    segments: Vec<Segment>,
}

impl PropertyPath {
    /// Parse a path. Never fails: stray `]` are dropped and an unclosed
    /// bracket runs to the end of the input.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = path.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' | ']' => flush(&mut current, &mut segments),
                '[' => {
                    flush(&mut current, &mut segments);
                    let inner: String = chars.by_ref().take_while(|c| *c != ']').collect();
                    if let Some(segment) = bracket_segment(&inner) {
                        segments.push(segment);
                    }
                }
                _ => current.push(c),
            }
        }
        flush(&mut current, &mut segments);

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolve the path against a JSON value
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        walk(root, &self.segments)
    }

    /// Resolve the path against an executed record. The first segment names
    /// a record field: `data`, `nodeId` or `nodeLabel`.
    pub fn lookup_record(&self, record: &ExecutedRecord) -> Option<Value> {
        let (first, rest) = self.segments.split_first()?;
        let field = match first {
            Segment::Key(key) => key.as_str(),
            Segment::Index(_) => return None,
        };

        match field {
            "data" => match rest.split_first() {
                None => Some(Value::Array(record.data.clone())),
                Some((next, rest)) => {
                    let start = step_items(&record.data, next)?;
                    walk(start, rest).cloned()
                }
            },
            "nodeId" if rest.is_empty() => Some(Value::String(record.node_id.clone())),
            "nodeLabel" if rest.is_empty() => Some(Value::String(record.node_label.clone())),
            _ => None,
        }
    }
}

fn flush(current: &mut String, segments: &mut Vec<Segment>) {
    if current.is_empty() {
        return;
    }
    let token = std::mem::take(current);
    segments.push(classify(token.trim()));
}

fn bracket_segment(inner: &str) -> Option<Segment> {
    let inner = inner.trim();
    if inner.is_empty() {
        return None;
    }
    for quote in ['"', '\''] {
        if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
            return Some(Segment::Key(inner[1..inner.len() - 1].to_string()));
        }
    }
    Some(classify(inner))
}

fn classify(token: &str) -> Segment {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(index) = token.parse() {
            return Segment::Index(index);
        }
    }
    Segment::Key(token.to_string())
}

fn walk<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, step)
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Array(items), _) => step_items(items, segment),
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        _ => None,
    }
}

fn step_items<'a>(items: &'a [Value], segment: &Segment) -> Option<&'a Value> {
    match segment {
        Segment::Index(index) => items.get(*index),
        Segment::Key(key) => match key.parse::<usize>() {
            Ok(index) => items.get(index),
            Err(_) => items.first().and_then(|first| step(first, segment)),
        },
    }
}
