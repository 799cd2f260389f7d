//! Fuzzy string matching utilities using Levenshtein distance
//!
//! Used for catalog names spoken by voice, where the recognizer often
//! drops a letter or splits a word ("head phones", "laptop" for "laptops").

/// Fuzzy match using Levenshtein distance, allows ~30% errors
pub fn fuzzy_match(expected: &str, actual: &str) -> bool {
    if expected == actual {
        return true;
    }
    let max_dist = (expected.chars().count() / 3).max(1);
    levenshtein(expected, actual) <= max_dist
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Single row, the previous row is folded into `diagonal`
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut diagonal = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let next = (row[j] + 1).min(row[j - 1] + 1).min(diagonal + cost);
            diagonal = row[j];
            row[j] = next;
        }
    }
    row[b.len()]
}

/// Clean text for matching: lowercase and remove non-alphabetic characters
pub fn clean_for_matching(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .collect()
}

/// Whether a spoken name refers to a catalog name.
///
/// Case-insensitive containment in either direction, then a whole-string
/// fuzzy comparison with spaces removed. The contained side needs at least
/// [`MIN_CONTAINED_LEN`] characters, so a stray letter never picks a name.
pub fn names_match(spoken: &str, name: &str) -> bool {
    let spoken = collapse(&clean_for_matching(spoken));
    let name = collapse(&clean_for_matching(name));
    if spoken.is_empty() || name.is_empty() {
        return false;
    }
    if contains_name(&name, &spoken) || contains_name(&spoken, &name) {
        return true;
    }
    fuzzy_match(&name.replace(' ', ""), &spoken.replace(' ', ""))
}

pub const MIN_CONTAINED_LEN: usize = 3;

fn contains_name(haystack: &str, needle: &str) -> bool {
    needle.chars().count() >= MIN_CONTAINED_LEN && haystack.contains(needle)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
