//! Conversions between 0-based (row, column) indexes and `A1`-style references.

use regex::Regex;
use std::sync::OnceLock;

/// Largest column count of an XLSX worksheet (`XFD`).
pub const MAX_COLUMNS: usize = 16_384;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").expect("Hardcode regex pattern"))
}

/// Converts column letters to a 0-based index: `A` → 0, `Z` → 25, `AA` → 26.
pub fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters
        .chars()
        .try_fold(0usize, |index, letter| {
            letter
                .is_ascii_alphabetic()
                .then(|| index * 26 + (letter.to_ascii_uppercase() as usize - 'A' as usize + 1))
        })
        .map(|column| column - 1)
}

/// Converts a 1-based row number string to a 0-based index.
pub fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse::<usize>()
        .ok()
        .filter(|row| *row > 0)
        .map(|row| row - 1)
}

/// Converts a 0-based column index to letters: 0 → `A`, 27 → `AB`.
pub fn index_to_col(col: usize) -> String {
    let mut letters = String::new();
    let mut column = col + 1;
    while column > 0 {
        column -= 1;
        letters.insert(0, (b'A' + (column % 26) as u8) as char);
        column /= 26;
    }
    letters
}

/// Formats a 0-based position as an `A1` reference.
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}

/// Parses an `A1` reference (absolute markers allowed) into a 0-based (row, column).
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let captures = reference_pattern().captures(reference.trim())?;
    let col = col_to_index(captures.get(1)?.as_str())?;
    let row = row_to_index(captures.get(2)?.as_str())?;
    (col < MAX_COLUMNS).then_some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(col_to_index("A"), Some(0));
        assert_eq!(col_to_index("z"), Some(25));
        assert_eq!(col_to_index("AA"), Some(26));
        assert_eq!(col_to_index("XFD"), Some(16_383));
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);

        assert_eq!(index_to_col(0), "A");
        assert_eq!(index_to_col(25), "Z");
        assert_eq!(index_to_col(27), "AB");
        assert_eq!(index_to_col(16_383), "XFD");
    }

    #[test]
    fn references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(46, 2), "C47");
        assert_eq!(reference_to_index("C47"), Some((46, 2)));
        assert_eq!(reference_to_index("$b$3"), Some((2, 1)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("1A"), None);
        assert_eq!(reference_to_index("XFE1"), None);
    }
}
