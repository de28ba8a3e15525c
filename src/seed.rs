//! Canonical seed documents.
//!
//! A collection whose backing resource is absent is created with this
//! content the first time it is opened.

use crate::types::Collection;

/// Seed for the student collection.
pub const STUDENTS_SEED: &str = "\
1003 Alice 85.5
1001 Bob 92
1005 Charlie 78.5
1002 David 88
1004 Eve 95.5
";

/// Seed for the dictionary collection.
pub const DICTIONARY_SEED: &str = "\
Apple:苹果
Banana:香蕉
Cat:猫
Dog:狗
Elephant:大象
Application:申请
Appetite:食欲
";

/// Seed for the campus map collection.
pub const MAP_SEED: &str = "\
LOCATIONS
1 80 大门 学校正门
2 95 图书馆 学习圣地
3 90 食堂 美味佳肴
4 85 宿舍 生活休息
5 88 教学楼 上课区域
6 75 体育馆 运动健身
7 50 行政楼 办公区域
EDGES
1 5 200
1 6 500
5 2 100
5 3 150
2 4 300
3 4 50
6 3 250
6 7 400
7 2 100
";

/// The seed document for a collection.
pub fn seed_for(collection: Collection) -> &'static str {
    match collection {
        Collection::Students => STUDENTS_SEED,
        Collection::Dictionary => DICTIONARY_SEED,
        Collection::Map => MAP_SEED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{parse_dictionary, parse_map, parse_students};

    #[test]
    fn test_seeds_parse_cleanly() {
        let students = parse_students(STUDENTS_SEED);
        assert_eq!(students.records.len(), 5);
        assert!(students.skipped.is_empty());

        let dictionary = parse_dictionary(DICTIONARY_SEED);
        assert_eq!(dictionary.records.len(), 7);
        assert!(dictionary.skipped.is_empty());

        let map = parse_map(MAP_SEED);
        assert_eq!(map.records.len(), 16);
        assert!(map.skipped.is_empty());
    }
}
