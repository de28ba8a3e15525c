//! Line grammars for the persisted collections.
//!
//! Every collection is a UTF-8 text document with one record per line:
//!
//! ```text
//! students.txt     <id> <name> <score>
//! dictionary.txt   <word>:<meaning>
//! campus_map.txt   LOCATIONS
//!                  <id> <popularity> <name> <info...>
//!                  EDGES
//!                  <from> <to> <weight>
//! ```
//!
//! Parsing is forgiving: a line that does not satisfy its grammar is dropped
//! and reported in [`ParseReport::skipped`], never raised. Serialization is
//! strict: a record whose fields would not survive a parse is rejected with a
//! [`FieldError`].
//!
//! The map document is parsed in two phases. Lines are first classified by
//! the marker tokens `LOCATIONS` / `EDGES` (anywhere in the line); the
//! remaining lines are then parsed with the grammar of the section that
//! precedes them.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{
    Collection, DictionaryEntry, Edge, Location, LocationId, MapRecord, Record, StudentRecord,
};

/// Marker token opening the location section of the map document.
pub const LOCATIONS_MARKER: &str = "LOCATIONS";

/// Marker token opening the edge section of the map document.
pub const EDGES_MARKER: &str = "EDGES";

/// Separator between word and meaning in the dictionary document.
pub const DICTIONARY_SEPARATOR: char = ':';

/// Field-level rejection raised when serializing a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Field is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: &'static str,
    },
    /// Field contains a line break.
    #[error("{field} must not contain line breaks")]
    LineBreak {
        /// Field name.
        field: &'static str,
    },
    /// Whitespace-delimited field contains whitespace.
    #[error("{field} must be a single token without whitespace")]
    Whitespace {
        /// Field name.
        field: &'static str,
    },
    /// Field contains the collection's separator.
    #[error("{field} must not contain '{separator}'")]
    Separator {
        /// Field name.
        field: &'static str,
        /// Offending separator.
        separator: char,
    },
    /// Free-text field starts or ends with whitespace.
    #[error("{field} must not start or end with whitespace")]
    Padding {
        /// Field name.
        field: &'static str,
    },
    /// Field would be read back as a section marker.
    #[error("{field} must not contain a section marker")]
    Marker {
        /// Field name.
        field: &'static str,
    },
    /// Score is NaN or infinite.
    #[error("{field} must be a finite number")]
    NonFinite {
        /// Field name.
        field: &'static str,
    },
}

/// Why a line was dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Fewer fields than the section grammar requires.
    TooFewFields {
        /// Minimum field count.
        expected: usize,
        /// Fields found.
        found: usize,
    },
    /// A numeric field failed to parse.
    BadNumber {
        /// Field name.
        field: String,
    },
    /// The key field is empty.
    EmptyKey,
    /// A map line appearing before any section marker.
    OutsideSection,
}

/// A line dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    /// 1-based line number in the document.
    pub line_no: usize,
    /// Raw line text.
    pub text: String,
    /// Why it was dropped.
    pub reason: SkipReason,
}

/// Result of parsing a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseReport<T> {
    /// Parsed records, in document order.
    pub records: Vec<T>,
    /// Dropped lines, in document order.
    pub skipped: Vec<SkippedLine>,
}

impl<T> Default for ParseReport<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> ParseReport<T> {
    fn push(&mut self, line_no: usize, text: &str, parsed: Result<T, SkipReason>) {
        match parsed {
            Ok(record) => self.records.push(record),
            Err(reason) => {
                warn!(line_no, text, ?reason, "dropping malformed record line");
                self.skipped.push(SkippedLine {
                    line_no,
                    text: text.to_string(),
                    reason,
                });
            }
        }
    }
}

/// Section of the map document a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    /// Before any marker.
    Preamble,
    /// After a `LOCATIONS` marker.
    Locations,
    /// After an `EDGES` marker.
    Edges,
}

/// Classify a map line as a section marker.
///
/// The marker token may appear anywhere in the line.
pub fn marker_of(line: &str) -> Option<Section> {
    if line.contains(LOCATIONS_MARKER) {
        Some(Section::Locations)
    } else if line.contains(EDGES_MARKER) {
        Some(Section::Edges)
    } else {
        None
    }
}

/// A classified map line: marker, blank, or record line in a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapLine<'a> {
    /// Section marker line.
    Marker(Section),
    /// Empty or whitespace-only line.
    Blank,
    /// Record line and the section it falls in.
    Record(Section, &'a str),
}

/// First phase of map parsing: classify every line by section.
pub fn classify_map_lines(text: &str) -> Vec<MapLine<'_>> {
    let mut section = Section::Preamble;
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                MapLine::Blank
            } else if let Some(next) = marker_of(line) {
                section = next;
                MapLine::Marker(next)
            } else {
                MapLine::Record(section, line)
            }
        })
        .collect()
}

/// Split off `n` whitespace-delimited tokens and return them with the
/// trimmed remainder of the line.
fn split_leading(line: &str, n: usize) -> (Vec<&str>, &str) {
    let mut tokens = Vec::with_capacity(n);
    let mut rest = line.trim_start();
    while tokens.len() < n && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (tokens, rest.trim_end())
}

fn parse_number<T: std::str::FromStr>(token: &str, field: &str) -> Result<T, SkipReason> {
    token.parse().map_err(|_| SkipReason::BadNumber {
        field: field.to_string(),
    })
}

/// Parse one `<id> <name> <score>` line. Tokens past the third are ignored.
pub fn parse_student_line(line: &str) -> Result<StudentRecord, SkipReason> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(SkipReason::TooFewFields {
            expected: 3,
            found: tokens.len(),
        });
    }
    let score: f64 = parse_number(tokens[2], "score")?;
    if !score.is_finite() {
        return Err(SkipReason::BadNumber {
            field: "score".to_string(),
        });
    }
    Ok(StudentRecord::new(tokens[0], tokens[1], score))
}

/// Parse one `<word>:<meaning>` line, splitting on the first colon only.
pub fn parse_entry_line(line: &str) -> Result<DictionaryEntry, SkipReason> {
    let Some((word, meaning)) = line.split_once(DICTIONARY_SEPARATOR) else {
        return Err(SkipReason::TooFewFields {
            expected: 2,
            found: 1,
        });
    };
    let word = word.trim();
    if word.is_empty() {
        return Err(SkipReason::EmptyKey);
    }
    Ok(DictionaryEntry::new(word, meaning.trim()))
}

/// Parse one `<id> <popularity> <name> <info...>` line.
///
/// `info` is the remainder of the line and may be empty.
pub fn parse_location_line(line: &str) -> Result<Location, SkipReason> {
    let (tokens, info) = split_leading(line, 3);
    if tokens.len() < 3 {
        return Err(SkipReason::TooFewFields {
            expected: 3,
            found: tokens.len(),
        });
    }
    let popularity: i64 = parse_number(tokens[1], "popularity")?;
    Ok(Location::new(tokens[0], popularity, tokens[2], info))
}

/// Parse one `<from> <to> <weight>` line.
pub fn parse_edge_line(line: &str) -> Result<Edge, SkipReason> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(SkipReason::TooFewFields {
            expected: 3,
            found: tokens.len(),
        });
    }
    let weight: i64 = parse_number(tokens[2], "weight")?;
    Ok(Edge::new(tokens[0], tokens[1], weight))
}

fn parse_lines<T>(
    text: &str,
    parse: impl Fn(&str) -> Result<T, SkipReason>,
) -> ParseReport<T> {
    let mut report = ParseReport::default();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        report.push(idx + 1, line, parse(line));
    }
    report
}

/// Parse the student document.
pub fn parse_students(text: &str) -> ParseReport<StudentRecord> {
    parse_lines(text, parse_student_line)
}

/// Parse the dictionary document.
pub fn parse_dictionary(text: &str) -> ParseReport<DictionaryEntry> {
    parse_lines(text, parse_entry_line)
}

/// Parse the sectioned map document.
pub fn parse_map(text: &str) -> ParseReport<MapRecord> {
    let mut report = ParseReport::default();
    for (idx, line) in classify_map_lines(text).into_iter().enumerate() {
        let MapLine::Record(section, raw) = line else {
            continue;
        };
        let parsed = match section {
            Section::Preamble => Err(SkipReason::OutsideSection),
            Section::Locations => parse_location_line(raw).map(MapRecord::Location),
            Section::Edges => parse_edge_line(raw).map(MapRecord::Edge),
        };
        report.push(idx + 1, raw, parsed);
    }
    report
}

/// Parse any collection into tagged records.
pub fn parse_records(collection: Collection, text: &str) -> ParseReport<Record> {
    fn lift<T>(report: ParseReport<T>, f: impl Fn(T) -> Record) -> ParseReport<Record> {
        ParseReport {
            records: report.records.into_iter().map(f).collect(),
            skipped: report.skipped,
        }
    }

    match collection {
        Collection::Students => lift(parse_students(text), Record::Student),
        Collection::Dictionary => lift(parse_dictionary(text), Record::Entry),
        Collection::Map => lift(parse_map(text), |r| match r {
            MapRecord::Location(l) => Record::Location(l),
            MapRecord::Edge(e) => Record::Edge(e),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialization
// ─────────────────────────────────────────────────────────────────────────────

fn check_common(field: &'static str, value: &str) -> Result<(), FieldError> {
    if value.is_empty() {
        return Err(FieldError::Empty { field });
    }
    if value.contains(['\n', '\r']) {
        return Err(FieldError::LineBreak { field });
    }
    Ok(())
}

fn check_token(field: &'static str, value: &str) -> Result<(), FieldError> {
    check_common(field, value)?;
    if value.contains(char::is_whitespace) {
        return Err(FieldError::Whitespace { field });
    }
    Ok(())
}

fn check_text(field: &'static str, value: &str) -> Result<(), FieldError> {
    check_common(field, value)?;
    if value.trim() != value {
        return Err(FieldError::Padding { field });
    }
    Ok(())
}

fn check_unmarked(field: &'static str, value: &str) -> Result<(), FieldError> {
    if marker_of(value).is_some() {
        return Err(FieldError::Marker { field });
    }
    Ok(())
}

/// Serialize a student record as one line.
pub fn student_line(record: &StudentRecord) -> Result<String, FieldError> {
    check_token("id", &record.id)?;
    check_token("name", &record.name)?;
    if !record.score.is_finite() {
        return Err(FieldError::NonFinite { field: "score" });
    }
    Ok(format!("{} {} {}", record.id, record.name, record.score))
}

/// Serialize a dictionary entry as one line.
pub fn entry_line(entry: &DictionaryEntry) -> Result<String, FieldError> {
    check_text("word", &entry.word)?;
    if entry.word.contains(DICTIONARY_SEPARATOR) {
        return Err(FieldError::Separator {
            field: "word",
            separator: DICTIONARY_SEPARATOR,
        });
    }
    check_text("meaning", &entry.meaning)?;
    Ok(format!("{}{}{}", entry.word, DICTIONARY_SEPARATOR, entry.meaning))
}

/// Serialize a location as one line.
///
/// An empty `info` is allowed; the line then ends after the name.
pub fn location_line(location: &Location) -> Result<String, FieldError> {
    check_token("id", location.id.as_str())?;
    check_token("name", &location.name)?;
    for (field, value) in [("id", location.id.as_str()), ("name", location.name.as_str())] {
        check_unmarked(field, value)?;
    }
    if location.info.is_empty() {
        return Ok(format!("{} {} {}", location.id, location.popularity, location.name));
    }
    check_text("info", &location.info)?;
    check_unmarked("info", &location.info)?;
    Ok(format!(
        "{} {} {} {}",
        location.id, location.popularity, location.name, location.info
    ))
}

/// Serialize an edge as one line.
pub fn edge_line(edge: &Edge) -> Result<String, FieldError> {
    check_token("from", edge.from.as_str())?;
    check_token("to", edge.to.as_str())?;
    check_unmarked("from", edge.from.as_str())?;
    check_unmarked("to", edge.to.as_str())?;
    Ok(format!("{} {} {}", edge.from, edge.to, edge.weight))
}

/// Serialize any record as one line of its collection's grammar.
pub fn record_line(record: &Record) -> Result<String, FieldError> {
    match record {
        Record::Student(s) => student_line(s),
        Record::Entry(e) => entry_line(e),
        Record::Location(l) => location_line(l),
        Record::Edge(e) => edge_line(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key-level document edits
// ─────────────────────────────────────────────────────────────────────────────

/// The key token of a record line, if the line is keyed in its collection.
///
/// Keys are whole delimiter-bounded tokens: the first whitespace token for
/// students and locations, the text before the first colon for dictionary
/// entries.
pub fn key_token(collection: Collection, line: &str) -> Option<&str> {
    let key = match collection {
        Collection::Students | Collection::Map => line.split_whitespace().next()?,
        Collection::Dictionary => line.split_once(DICTIONARY_SEPARATOR)?.0.trim(),
    };
    (!key.is_empty()).then_some(key)
}

fn join_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Remove every keyed line whose key equals `key` exactly.
///
/// For the map document only `LOCATIONS`-section lines are keyed; markers,
/// edge lines and blank lines are always retained. Returns the rewritten
/// document and the number of removed lines.
pub fn retain_without_key(collection: Collection, text: &str, key: &str) -> (String, usize) {
    let mut removed = 0;
    let kept: Vec<&str> = match collection {
        Collection::Map => text
            .lines()
            .zip(classify_map_lines(text))
            .filter(|(raw, class)| {
                let hit = matches!(class, MapLine::Record(Section::Locations, _))
                    && key_token(collection, raw) == Some(key);
                removed += usize::from(hit);
                !hit
            })
            .map(|(raw, _)| raw)
            .collect(),
        _ => text
            .lines()
            .filter(|raw| {
                let hit = key_token(collection, raw) == Some(key);
                removed += usize::from(hit);
                !hit
            })
            .collect(),
    };
    (join_lines(kept), removed)
}

/// Remove every edge joining `a` and `b` in either direction.
pub fn retain_without_edge(text: &str, a: &LocationId, b: &LocationId) -> (String, usize) {
    let mut removed = 0;
    let kept: Vec<&str> = text
        .lines()
        .zip(classify_map_lines(text))
        .filter(|(_, class)| {
            let hit = match class {
                MapLine::Record(Section::Edges, raw) => {
                    parse_edge_line(raw).is_ok_and(|e| e.connects(a, b))
                }
                _ => false,
            };
            removed += usize::from(hit);
            !hit
        })
        .map(|(raw, _)| raw)
        .collect();
    (join_lines(kept), removed)
}

/// The section an appended line would fall into.
pub fn trailing_section(text: &str) -> Section {
    classify_map_lines(text)
        .into_iter()
        .rev()
        .find_map(|line| match line {
            MapLine::Marker(section) => Some(section),
            _ => None,
        })
        .unwrap_or(Section::Preamble)
}

/// Insert a location line at the end of the last `LOCATIONS` section.
///
/// When the document has no `LOCATIONS` section, a marker and the line are
/// placed at the top.
pub fn insert_location_line(text: &str, line: &str) -> String {
    let raw: Vec<&str> = text.lines().collect();
    let classes = classify_map_lines(text);

    let mut insert_at = None;
    let mut section = Section::Preamble;
    for (idx, class) in classes.iter().enumerate() {
        match class {
            MapLine::Marker(next) => {
                section = *next;
                if section == Section::Locations {
                    insert_at = Some(idx + 1);
                }
            }
            MapLine::Record(..) if section == Section::Locations => insert_at = Some(idx + 1),
            _ => {}
        }
    }

    match insert_at {
        Some(at) => join_lines(
            raw[..at]
                .iter()
                .copied()
                .chain(std::iter::once(line))
                .chain(raw[at..].iter().copied()),
        ),
        None => join_lines(
            [LOCATIONS_MARKER, line]
                .into_iter()
                .chain(raw.iter().copied()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_line_parse() {
        let s = parse_student_line("1003 Alice 85.5").unwrap();
        assert_eq!(s, StudentRecord::new("1003", "Alice", 85.5));

        assert_eq!(
            parse_student_line("1003 Alice"),
            Err(SkipReason::TooFewFields { expected: 3, found: 2 })
        );
        assert!(matches!(
            parse_student_line("1003 Alice high"),
            Err(SkipReason::BadNumber { .. })
        ));
        assert!(parse_student_line("1003 Alice inf").is_err());
    }

    #[test]
    fn test_entry_splits_on_first_colon() {
        let e = parse_entry_line("Ratio:a:b relation").unwrap();
        assert_eq!(e.word, "Ratio");
        assert_eq!(e.meaning, "a:b relation");

        assert!(parse_entry_line("no separator").is_err());
        assert_eq!(parse_entry_line(":orphan"), Err(SkipReason::EmptyKey));
    }

    #[test]
    fn test_location_info_keeps_inner_spaces() {
        let l = parse_location_line("2 95 Library quiet study  hall").unwrap();
        assert_eq!(l.id.as_str(), "2");
        assert_eq!(l.popularity, 95);
        assert_eq!(l.name, "Library");
        assert_eq!(l.info, "quiet study  hall");

        let bare = parse_location_line("9 10 Shed").unwrap();
        assert_eq!(bare.info, "");
    }

    #[test]
    fn test_parse_map_sections() {
        let text = "stray line\nLOCATIONS\n1 80 Gate main entrance\n2 x Bad\n\nEDGES\n1 2 300\n1 2\n";
        let report = parse_map(text);

        assert_eq!(report.records.len(), 2);
        assert!(matches!(report.records[0], MapRecord::Location(_)));
        assert_eq!(report.records[1], MapRecord::Edge(Edge::new("1", "2", 300)));

        let reasons: Vec<_> = report.skipped.iter().map(|s| (s.line_no, s.reason.clone())).collect();
        assert_eq!(reasons.len(), 3);
        assert_eq!(reasons[0], (1, SkipReason::OutsideSection));
        assert_eq!(reasons[1].0, 4);
        assert_eq!(reasons[2], (8, SkipReason::TooFewFields { expected: 3, found: 2 }));
    }

    #[test]
    fn test_marker_anywhere_in_line() {
        let report = parse_map("# --- LOCATIONS ---\n1 80 Gate\n== EDGES ==\n1 2 5\n");
        assert_eq!(report.records.len(), 2);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_serialize_rejects_lossy_fields() {
        assert_eq!(
            student_line(&StudentRecord::new("10 1", "A", 1.0)),
            Err(FieldError::Whitespace { field: "id" })
        );
        assert!(matches!(
            entry_line(&DictionaryEntry::new("a:b", "x")),
            Err(FieldError::Separator { .. })
        ));
        assert_eq!(
            entry_line(&DictionaryEntry::new("Cat", " padded")),
            Err(FieldError::Padding { field: "meaning" })
        );
        assert_eq!(
            location_line(&Location::new("1", 5, "EDGESIDE", "")),
            Err(FieldError::Marker { field: "name" })
        );
        assert_eq!(
            student_line(&StudentRecord::new("1", "A", f64::NAN)),
            Err(FieldError::NonFinite { field: "score" })
        );
    }

    #[test]
    fn test_key_token_is_whole_field() {
        assert_eq!(key_token(Collection::Students, "100 Ann 3"), Some("100"));
        assert_eq!(key_token(Collection::Dictionary, "Apple:x:y"), Some("Apple"));
        assert_eq!(key_token(Collection::Dictionary, "no colon"), None);
        assert_eq!(key_token(Collection::Students, "   "), None);
    }

    #[test]
    fn test_retain_without_key_exact_match() {
        let text = "10 A 1\n100 B 2\n1 C 3\n";
        let (out, removed) = retain_without_key(Collection::Students, text, "10");
        assert_eq!(removed, 1);
        assert_eq!(out, "100 B 2\n1 C 3\n");
    }

    #[test]
    fn test_retain_without_key_map_keeps_edges() {
        let text = "LOCATIONS\n1 80 Gate\n2 90 Library\nEDGES\n1 2 100\n";
        let (out, removed) = retain_without_key(Collection::Map, text, "1");
        assert_eq!(removed, 1);
        assert_eq!(out, "LOCATIONS\n2 90 Library\nEDGES\n1 2 100\n");
    }

    #[test]
    fn test_retain_without_edge_either_direction() {
        let text = "LOCATIONS\n1 80 Gate\nEDGES\n1 2 100\n2 1 150\n2 3 10\n";
        let (out, removed) = retain_without_edge(text, &"2".into(), &"1".into());
        assert_eq!(removed, 2);
        assert_eq!(out, "LOCATIONS\n1 80 Gate\nEDGES\n2 3 10\n");
    }

    #[test]
    fn test_insert_location_line() {
        let text = "LOCATIONS\n1 80 Gate\n\nEDGES\n1 2 100\n";
        let out = insert_location_line(text, "2 90 Library");
        assert_eq!(out, "LOCATIONS\n1 80 Gate\n2 90 Library\n\nEDGES\n1 2 100\n");

        let empty = insert_location_line("", "2 90 Library");
        assert_eq!(empty, "LOCATIONS\n2 90 Library\n");
    }

    #[test]
    fn test_trailing_section() {
        assert_eq!(trailing_section(""), Section::Preamble);
        assert_eq!(trailing_section("LOCATIONS\n1 1 A\n"), Section::Locations);
        assert_eq!(trailing_section("LOCATIONS\nEDGES\n1 2 3\n"), Section::Edges);
    }
}
