//! Property-based tests for record round trips, deletion exactness and tree
//! invariants.

use proptest::prelude::*;

use coursework_kernel::format::{
    entry_line, location_line, parse_dictionary, parse_map, parse_students, retain_without_key,
    student_line, LOCATIONS_MARKER,
};
use coursework_kernel::{Collection, DictionaryEntry, Location, MapRecord, SearchTree, StudentRecord};

/// Numeric ids with many shared prefixes ("1", "10", "100", ...).
fn arb_id() -> impl Strategy<Value = String> {
    "1[0-9]{0,3}"
}

fn arb_students() -> impl Strategy<Value = Vec<StudentRecord>> {
    prop::collection::vec(
        (arb_id(), "[A-Z][a-z]{1,8}", 0u32..1000).prop_map(|(id, name, tenths)| {
            StudentRecord::new(id, name, f64::from(tenths) / 10.0)
        }),
        0..40,
    )
}

fn document(students: &[StudentRecord]) -> String {
    students
        .iter()
        .map(|s| student_line(s).unwrap() + "\n")
        .collect()
}

/// Free text with spaces, colons, CJK and edge whitespace mixed in.
fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9]{1,10}",
        "[ a-zA-Z:,.\u{4e00}-\u{4e20}]{0,16}",
        "\\PC{0,12}",
    ]
}

proptest! {
    #[test]
    fn valid_students_round_trip(id in arb_text(), name in arb_text(), score in any::<f64>()) {
        let record = StudentRecord::new(id, name, score);
        if let Ok(line) = student_line(&record) {
            let report = parse_students(&format!("{line}\n"));
            prop_assert!(report.skipped.is_empty());
            prop_assert_eq!(report.records, vec![record]);
        }
    }

    #[test]
    fn valid_entries_round_trip(word in arb_text(), meaning in arb_text()) {
        let entry = DictionaryEntry::new(word, meaning);
        if let Ok(line) = entry_line(&entry) {
            let report = parse_dictionary(&format!("{line}\n"));
            prop_assert!(report.skipped.is_empty());
            prop_assert_eq!(report.records, vec![entry]);
        }
    }

    #[test]
    fn valid_locations_round_trip(
        id in arb_text(),
        popularity in any::<i64>(),
        name in arb_text(),
        info in arb_text(),
    ) {
        let location = Location::new(id, popularity, name, info);
        if let Ok(line) = location_line(&location) {
            let report = parse_map(&format!("{LOCATIONS_MARKER}\n{line}\n"));
            prop_assert!(report.skipped.is_empty());
            prop_assert_eq!(report.records, vec![MapRecord::Location(location)]);
        }
    }

    #[test]
    fn delete_removes_exactly_matching_keys(students in arb_students(), key in arb_id()) {
        let text = document(&students);
        let (rewritten, removed) = retain_without_key(Collection::Students, &text, &key);

        let expected: Vec<_> = students.iter().filter(|s| s.id != key).cloned().collect();
        prop_assert_eq!(removed, students.len() - expected.len());
        prop_assert_eq!(parse_students(&rewritten).records, expected);
    }

    #[test]
    fn delete_miss_is_identity(students in arb_students()) {
        let text = document(&students);
        let (rewritten, removed) = retain_without_key(Collection::Students, &text, "9999");
        prop_assert_eq!(removed, 0);
        prop_assert_eq!(rewritten, text);
    }

    #[test]
    fn dictionary_delete_ignores_meaning_text(word in "[A-Za-z]{1,6}") {
        // The meaning repeats the key; only the word field may match.
        let text = format!("{word}x:{word}\n{word}:1\nz{word}:{word}\n");
        let (rewritten, removed) = retain_without_key(Collection::Dictionary, &text, &word);

        prop_assert_eq!(removed, 1);
        let words: Vec<_> = parse_dictionary(&rewritten)
            .records
            .into_iter()
            .map(|e| e.word)
            .collect();
        prop_assert_eq!(words, vec![format!("{word}x"), format!("z{word}")]);
    }

    #[test]
    fn tree_in_order_is_sorted_and_distinct(words in prop::collection::vec("[a-z]{1,4}", 0..60)) {
        let tree = SearchTree::from_words(&words);

        let mut expected = words.clone();
        expected.sort();
        expected.dedup();

        prop_assert_eq!(tree.in_order(), expected.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(tree.len() + tree.skipped().len(), words.len());
        prop_assert_eq!(tree.links().len(), tree.len().saturating_sub(1));
    }
}
