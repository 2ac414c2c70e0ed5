/// Turns free text into an FTS5 expression that prefix-matches every word.
///
/// Words are split on anything that is not alphanumeric, so FTS5 operators
/// and quotes in the input never reach the query parser. Returns `None`
/// when no word is left.
pub fn build_match_expression(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{}\"*", word.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
