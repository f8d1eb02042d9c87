/// Lowercases `query` and splits on whitespace and `, . ; : ! ?`, dropping empty pieces.
///
/// No stemming or stop-word removal; duplicates are kept.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(is_separator)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':' | '!' | '?')
}
