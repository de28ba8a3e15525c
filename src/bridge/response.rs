//! Response grammars of the computation services.
//!
//! The bridge returns raw text; the caller chooses how to read it:
//!
//! | Grammar | Services | Reader |
//! |---------|----------|--------|
//! | CSV with header row | `sort_id`, `sort_score`, `locations`, `edges` | [`CsvTable`] |
//! | pipe-joined path and distance | `path` | [`PathOutcome::parse`] |
//! | recursive `name`/`children` JSON | `print_tree` | [`OutlineTree`] |
//! | free text | `search`, `fuzzy`, anything else | [`SearchResult`], [`BridgeResponse::Text`] |
//!
//! Typed readers are wrapped in [`ServiceOutput::read`] so prose answers from
//! CSV or JSON services survive as raw text.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Edge, Location, StudentRecord};

/// Error type for typed response parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// Response had no content.
    #[error("Empty response")]
    Empty,
    /// A required CSV column is missing from the header.
    #[error("Missing column: {0}")]
    MissingColumn(String),
    /// A CSV value could not be converted.
    #[error("Bad value in column {column} at row {row}: {value:?}")]
    BadValue {
        /// Column name.
        column: String,
        /// 1-based data row.
        row: usize,
        /// Raw value.
        value: String,
    },
    /// Tree response is not JSON.
    #[error("Invalid tree JSON: {0}")]
    Json(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// CSV
// ─────────────────────────────────────────────────────────────────────────────

/// A CSV response: header row plus data rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvTable {
    /// Column names, in order.
    pub header: Vec<String>,
    /// Data rows whose arity matches the header.
    pub rows: Vec<Vec<String>>,
    /// Data rows dropped for wrong arity.
    pub dropped: usize,
}

/// Split one CSV line. Double-quoted fields may contain commas and `""`.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

impl CsvTable {
    /// Parse a CSV response. The first non-blank line is the header.
    pub fn parse(text: &str) -> Result<Self, ResponseError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = split_csv_line(lines.next().ok_or(ResponseError::Empty)?);

        let mut rows = Vec::new();
        let mut dropped = 0;
        for line in lines {
            let fields = split_csv_line(line);
            if fields.len() == header.len() {
                rows.push(fields);
            } else {
                tracing::warn!(line, expected = header.len(), found = fields.len(), "Dropping CSV row");
                dropped += 1;
            }
        }

        Ok(Self {
            header,
            rows,
            dropped,
        })
    }

    /// Index of a column by exact name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Convert rows into typed records, locating columns by header name.
    pub fn records<T: CsvRecord>(&self) -> Result<Vec<T>, ResponseError> {
        let indices = T::COLUMNS
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| ResponseError::MissingColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                let fields: Vec<&str> = indices.iter().map(|&i| row[i].as_str()).collect();
                T::from_fields(&fields).map_err(|column| {
                    let pos = T::COLUMNS.iter().position(|c| *c == column).unwrap_or(0);
                    ResponseError::BadValue {
                        column: column.to_string(),
                        row: row_idx + 1,
                        value: fields[pos].to_string(),
                    }
                })
            })
            .collect()
    }
}

/// A record type with a stable CSV column contract.
pub trait CsvRecord: Sized {
    /// Required columns, in the order passed to [`CsvRecord::from_fields`].
    const COLUMNS: &'static [&'static str];

    /// Build a record from fields in `COLUMNS` order.
    ///
    /// Returns the name of the offending column on failure.
    fn from_fields(fields: &[&str]) -> Result<Self, &'static str>;
}

impl CsvRecord for Location {
    const COLUMNS: &'static [&'static str] = &["id", "name", "popularity", "info"];

    fn from_fields(fields: &[&str]) -> Result<Self, &'static str> {
        let popularity = fields[2].parse().map_err(|_| "popularity")?;
        Ok(Location::new(fields[0], popularity, fields[1], fields[3]))
    }
}

impl CsvRecord for Edge {
    const COLUMNS: &'static [&'static str] = &["u", "v", "weight"];

    fn from_fields(fields: &[&str]) -> Result<Self, &'static str> {
        let weight = fields[2].parse().map_err(|_| "weight")?;
        Ok(Edge::new(fields[0], fields[1], weight))
    }
}

impl CsvRecord for StudentRecord {
    const COLUMNS: &'static [&'static str] = &["id", "name", "score"];

    fn from_fields(fields: &[&str]) -> Result<Self, &'static str> {
        let score = fields[2].parse().map_err(|_| "score")?;
        Ok(StudentRecord::new(fields[0], fields[1], score))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Path composite
// ─────────────────────────────────────────────────────────────────────────────

/// Separator between path and distance segments.
pub const PATH_SEPARATOR: char = '|';

/// Token joining labels in the path segment.
pub const ARROW: &str = "->";

fn path_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*path\s*:\s*").expect("valid path label regex"))
}

fn first_integer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+").expect("valid integer regex"))
}

/// A successful shortest-path response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResponse {
    /// Label chain, e.g. `A->B->C`, without the leading `Path:` label.
    pub path: String,
    /// Distance summary, e.g. `Total Distance: 500`.
    pub distance: String,
}

impl PathResponse {
    /// Labels along the path.
    pub fn hops(&self) -> Vec<&str> {
        self.path
            .split(ARROW)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Numeric total distance, when the summary carries one.
    pub fn total(&self) -> Option<i64> {
        first_integer()
            .find(&self.distance)
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Reading of a `path` service response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathOutcome {
    /// Exactly one separator: a path and its distance.
    Path(PathResponse),
    /// Anything else: an informational message such as "no path".
    Informational(String),
}

impl PathOutcome {
    /// Classify a `path` response.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let mut parts = text.split(PATH_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(left), Some(right), None) => Self::Path(PathResponse {
                path: path_label().replace(left, "").trim().to_string(),
                distance: right.trim().to_string(),
            }),
            _ => Self::Informational(text.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree JSON
// ─────────────────────────────────────────────────────────────────────────────

/// A node of a tree decoded from `name`/`children` JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    /// The node's `name`.
    pub label: String,
    /// Index of the parent node.
    pub parent: Option<usize>,
    /// Depth below the root (root = 0).
    pub depth: usize,
}

/// Tree decoded from recursive `{"name": .., "children": [..]}` JSON.
///
/// Nodes are stored in pre-order. A node without a string or numeric `name`
/// ends its branch silently, so `null` children are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineTree {
    /// Nodes in pre-order.
    pub nodes: Vec<OutlineNode>,
}

fn node_name(value: &Value) -> Option<String> {
    match value.get("name")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl OutlineTree {
    /// Decode tree JSON text.
    pub fn parse(text: &str) -> Result<Self, ResponseError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ResponseError::Json(e.to_string()))?;
        Ok(Self::from_value(&value))
    }

    /// Decode an already parsed JSON value.
    pub fn from_value(root: &Value) -> Self {
        let mut nodes = Vec::new();
        let mut stack: Vec<(&Value, Option<usize>, usize)> = vec![(root, None, 0)];

        while let Some((value, parent, depth)) = stack.pop() {
            let Some(label) = node_name(value) else {
                continue;
            };
            let idx = nodes.len();
            nodes.push(OutlineNode {
                label,
                parent,
                depth,
            });
            if let Some(children) = value.get("children").and_then(Value::as_array) {
                stack.extend(children.iter().rev().map(|c| (c, Some(idx), depth + 1)));
            }
        }

        Self { nodes }
    }

    /// Parent → child label pairs, in pre-order.
    pub fn links(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .filter_map(|n| {
                n.parent
                    .map(|p| (self.nodes[p].label.as_str(), n.label.as_str()))
            })
            .collect()
    }

    /// Root label.
    pub fn root(&self) -> Option<&str> {
        self.nodes.first().map(|n| n.label.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Free text
// ─────────────────────────────────────────────────────────────────────────────

/// Reading of a `search` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchResult {
    /// The word's meaning.
    Found(String),
    /// The service reported the word missing.
    Missing(String),
}

impl SearchResult {
    /// Classify a `search` response.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text.to_lowercase().contains("not found") {
            Self::Missing(text.to_string())
        } else {
            Self::Found(text.to_string())
        }
    }
}

/// Read a `fuzzy` response: one candidate per non-blank line.
///
/// A "not found" message yields no candidates.
pub fn parse_candidates(text: &str) -> Vec<String> {
    if text.to_lowercase().contains("not found") {
        return Vec::new();
    }
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Best-effort classification of an arbitrary response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeResponse {
    /// Tree JSON.
    Tree(OutlineTree),
    /// Path composite.
    Path(PathResponse),
    /// CSV with at least two columns and one well-formed row.
    Table(CsvTable),
    /// Anything else, displayed as-is.
    Text(String),
}

impl BridgeResponse {
    /// Classify text, trying JSON, then path, then CSV, then free text.
    pub fn classify(text: &str) -> Self {
        let trimmed = text.trim();

        if trimmed.starts_with('{') {
            if let Ok(tree) = OutlineTree::parse(trimmed) {
                return Self::Tree(tree);
            }
        }
        if let PathOutcome::Path(path) = PathOutcome::parse(trimmed) {
            return Self::Path(path);
        }
        if let Ok(table) = CsvTable::parse(trimmed) {
            if table.header.len() >= 2 && !table.rows.is_empty() && table.dropped == 0 {
                return Self::Table(table);
            }
        }
        Self::Text(trimmed.to_string())
    }
}

/// A service response read with its expected grammar, or kept as returned.
///
/// Services answer some requests in prose ("No locations available.") even
/// when their normal output is CSV or JSON. Such output is not an error: it
/// is kept verbatim for display, together with its best-effort shape and the
/// reason the expected grammar did not apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutput<T> {
    /// Output matched the expected grammar.
    Typed(T),
    /// Output did not match; the raw text is kept.
    Untyped {
        /// Trimmed output as returned by the service.
        raw: String,
        /// Best-effort classification of `raw`.
        shape: BridgeResponse,
        /// Why the expected grammar did not apply.
        reason: ResponseError,
    },
}

impl<T> ServiceOutput<T> {
    /// Read `raw` with `parse`, falling back to the raw text on mismatch.
    pub fn read(raw: String, parse: impl FnOnce(&str) -> Result<T, ResponseError>) -> Self {
        match parse(&raw) {
            Ok(value) => Self::Typed(value),
            Err(reason) => {
                let shape = BridgeResponse::classify(&raw);
                tracing::debug!(%reason, "Service output kept as raw text");
                Self::Untyped { raw, shape, reason }
            }
        }
    }

    /// The typed value, if the grammar matched.
    pub fn typed(self) -> Option<T> {
        match self {
            Self::Typed(value) => Some(value),
            Self::Untyped { .. } => None,
        }
    }

    /// The raw text, if the grammar did not match.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Typed(_) => None,
            Self::Untyped { raw, .. } => Some(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_locations() {
        let table = CsvTable::parse("id,name,popularity,info\n2,Library,95,\"quiet, bright\"\n1,Gate,80,entrance\n")
            .unwrap();
        let locations: Vec<Location> = table.records().unwrap();

        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0], Location::new("2", 95, "Library", "quiet, bright"));
    }

    #[test]
    fn test_csv_columns_by_name_not_position() {
        let table = CsvTable::parse("weight,v,u\n300,2,1\n").unwrap();
        let edges: Vec<Edge> = table.records().unwrap();
        assert_eq!(edges, vec![Edge::new("1", "2", 300)]);
    }

    #[test]
    fn test_csv_missing_column_and_bad_value() {
        let table = CsvTable::parse("u,v\n1,2\n").unwrap();
        assert_eq!(
            table.records::<Edge>(),
            Err(ResponseError::MissingColumn("weight".to_string()))
        );

        let table = CsvTable::parse("id,name,score\n1001,Bob,high\n").unwrap();
        assert_eq!(
            table.records::<StudentRecord>(),
            Err(ResponseError::BadValue {
                column: "score".to_string(),
                row: 1,
                value: "high".to_string(),
            })
        );
    }

    #[test]
    fn test_csv_drops_wrong_arity() {
        let table = CsvTable::parse("u,v,weight\n1,2,3\n1,2\n").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.dropped, 1);
        assert_eq!(CsvTable::parse("  \n"), Err(ResponseError::Empty));
    }

    #[test]
    fn test_path_composite() {
        let outcome = PathOutcome::parse("Path: A->B->C | Total Distance: 500");
        let PathOutcome::Path(path) = outcome else {
            panic!("expected path");
        };
        assert_eq!(path.path, "A->B->C");
        assert_eq!(path.distance, "Total Distance: 500");
        assert_eq!(path.hops(), vec!["A", "B", "C"]);
        assert_eq!(path.total(), Some(500));
    }

    #[test]
    fn test_path_without_separator_is_informational() {
        let text = "No path exists between 大门 and 行政楼.";
        assert_eq!(PathOutcome::parse(text), PathOutcome::Informational(text.to_string()));
        assert!(matches!(PathOutcome::parse("a | b | c"), PathOutcome::Informational(_)));
    }

    #[test]
    fn test_tree_json_preorder() {
        let tree = OutlineTree::parse(
            r#"{"name":"Banana","children":[{"name":"Apple"},{"name":"Cat","children":[null,{"name":"Dog"}]}]}"#,
        )
        .unwrap();

        let labels: Vec<_> = tree.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Banana", "Apple", "Cat", "Dog"]);
        assert_eq!(tree.links(), vec![("Banana", "Apple"), ("Banana", "Cat"), ("Cat", "Dog")]);
        assert_eq!(tree.nodes[3].depth, 2);
    }

    #[test]
    fn test_tree_nameless_node_ends_branch() {
        let tree = OutlineTree::parse(
            r#"{"name":"Root","children":[{"children":[{"name":"Hidden"}]},{"name":"Seen"}]}"#,
        )
        .unwrap();
        let labels: Vec<_> = tree.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Root", "Seen"]);

        assert!(OutlineTree::parse("{}").unwrap().nodes.is_empty());
        assert!(matches!(OutlineTree::parse("not json"), Err(ResponseError::Json(_))));
    }

    #[test]
    fn test_search_result() {
        assert_eq!(SearchResult::parse("苹果\n"), SearchResult::Found("苹果".to_string()));
        assert!(matches!(
            SearchResult::parse("Word not found in the dictionary."),
            SearchResult::Missing(_)
        ));
    }

    #[test]
    fn test_candidates() {
        assert_eq!(parse_candidates("Apple\n\nApplication\n"), vec!["Apple", "Application"]);
        assert!(parse_candidates("Prefix not found").is_empty());
    }

    #[test]
    fn test_classify() {
        assert!(matches!(BridgeResponse::classify("{\"name\":\"A\"}"), BridgeResponse::Tree(_)));
        assert!(matches!(BridgeResponse::classify("A->B | 3"), BridgeResponse::Path(_)));
        assert!(matches!(BridgeResponse::classify("u,v,weight\n1,2,3"), BridgeResponse::Table(_)));
        assert_eq!(
            BridgeResponse::classify("Hello, world"),
            BridgeResponse::Text("Hello, world".to_string())
        );
    }

    #[test]
    fn test_service_output_keeps_prose() {
        let output = ServiceOutput::read("No students to display.".to_string(), |raw| {
            CsvTable::parse(raw)?.records::<StudentRecord>()
        });
        assert_eq!(output.raw(), Some("No students to display."));
        let ServiceOutput::Untyped { shape, reason, .. } = output else {
            panic!("expected raw text");
        };
        assert_eq!(shape, BridgeResponse::Text("No students to display.".to_string()));
        assert_eq!(reason, ResponseError::MissingColumn("id".to_string()));

        let output = ServiceOutput::read("id,name,score\n1001,Bob,92".to_string(), |raw| {
            CsvTable::parse(raw)?.records::<StudentRecord>()
        });
        assert_eq!(output.typed(), Some(vec![StudentRecord::new("1001", "Bob", 92.0)]));
    }
}
