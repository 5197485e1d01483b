//! Line name comparison.

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether two line names denote the same line.
///
/// Spacing, punctuation and case are ignored. A purely alphabetic product
/// prefix on one side is tolerated if the other side is the bare number,
/// so "ICE 944" matches "944" but "RE 13" does not match "RE 113".
#[must_use]
pub fn is_same_line_name(lhs: &str, rhs: &str) -> bool {
    let l = normalize(lhs);
    let r = normalize(rhs);
    if l.is_empty() || r.is_empty() {
        return false;
    }
    if l == r {
        return true;
    }

    let (short, long) = if l.len() < r.len() { (&l, &r) } else { (&r, &l) };
    let Some(prefix) = long.strip_suffix(short.as_str()) else {
        return false;
    };
    short.starts_with(|c: char| c.is_ascii_digit()) && prefix.chars().all(char::is_alphabetic)
}
