//! Text normalisation shared by matching, learning and storage keys.

/// Lowercase, unify apostrophes, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let unified: String = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '`' => '\'',
            c => c,
        })
        .collect();
    unified
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalised label used as a knowledge key. Strips required-field markers and
/// trailing punctuation ("Age *:" and "age" share a key).
pub fn normalize_label(label: &str) -> String {
    normalize(label)
        .trim_matches(|c: char| c == '*' || c == ':' || c == '?' || c == '.' || c.is_whitespace())
        .to_string()
}

/// Whole-word (or simple plural) occurrence of `term` in already-normalised text.
pub fn contains_term(normalized_text: &str, term: &str) -> bool {
    let term = normalize(term);
    if term.is_empty() {
        return false;
    }
    normalized_text
        .match_indices(term.as_str())
        .any(|(start, found)| {
            let before = normalized_text[..start].chars().next_back();
            let mut rest = normalized_text[start + found.len()..].chars();
            let mut after = rest.next();
            if after == Some('s') {
                let next = rest.next();
                if !next.is_some_and(is_word_char) {
                    after = next;
                }
            }
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Leading words of a question, with punctuation dropped. Used as a learned phrasing.
pub fn question_stem(text: &str, max_words: usize) -> String {
    normalize(text)
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
