//! Station name comparison.
//!
//! Names from different data sources differ in case, diacritics, punctuation,
//! abbreviations and decorative qualifiers ("S+U", "Bhf", "RER", a repeated
//! city name). Both names are reduced to a list of significant tokens, which
//! are then compared independent of order.

/// Abbreviations expanded before comparison.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("hbf", "hauptbahnhof"),
    ("hb", "hauptbahnhof"),
    ("bhf", "bahnhof"),
    ("cs", "centraal"),
    ("st", "saint"),
    ("sankt", "saint"),
    ("ste", "sainte"),
    ("str", "strasse"),
];

/// Tokens naming a separate facility next to the station they accompany.
const FACILITIES: &[&str] = &["autobusbahnhof", "busbahnhof", "zob"];

/// Tokens carrying no identifying information.
const QUALIFIERS: &[&str] = &["s", "u", "rer", "bahnhof", "gare", "de", "station", "airport"];

fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' => "s",
        'ß' => "ss",
        'ť' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// Lowercase, fold diacritics and turn punctuation into token boundaries.
fn fold(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if let Some(folded) = fold_char(c) {
            out.push_str(folded);
        } else if c.is_alphanumeric() {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    out
}

/// Collapse the German umlaut transliterations ("oe", "ue", "ae") so that
/// "Koebenhavn" and "København" end up identical.
fn collapse_digraphs(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if matches!(c, 'a' | 'o' | 'u') && chars.peek() == Some(&'e') {
            chars.next();
        }
    }
    out
}

/// Expand whole-token abbreviations and the "-str" street suffix.
fn expand(token: &str) -> String {
    if let Some((_, full)) = ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == token) {
        return (*full).to_string();
    }
    match token.strip_suffix("str") {
        Some(stem) if stem.len() >= 3 => format!("{stem}strasse"),
        _ => token.to_string(),
    }
}

/// Significant tokens of a station name, in order of first occurrence.
pub(crate) fn tokenize(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in fold(name).split_whitespace() {
        let token = collapse_digraphs(&expand(raw));
        if QUALIFIERS.contains(&token.as_str()) || tokens.contains(&token) {
            continue;
        }
        tokens.push(token);
    }
    tokens
}

fn is_subsequence(short: &[String], long: &[String]) -> bool {
    let mut it = long.iter();
    short.iter().all(|s| it.any(|l| l == s))
}

/// Whether two station names denote the same station.
///
/// Matches when both names reduce to the same token set (in any order), or
/// when the shorter token list, of at least two tokens, is an ordered
/// subsequence of the longer one. A facility such as a bus terminal never
/// matches the station it is attached to. Symmetric by construction.
#[must_use]
pub fn is_same_location_name(lhs: &str, rhs: &str) -> bool {
    let l = tokenize(lhs);
    let r = tokenize(rhs);
    if l.is_empty() || r.is_empty() {
        return lhs.trim().to_lowercase() == rhs.trim().to_lowercase();
    }
    let facility = |tokens: &[String]| tokens.iter().any(|t| FACILITIES.contains(&t.as_str()));
    if facility(&l) != facility(&r) {
        return false;
    }

    let mut l_sorted = l.clone();
    let mut r_sorted = r.clone();
    l_sorted.sort();
    r_sorted.sort();
    if l_sorted == r_sorted {
        return true;
    }

    let (short, long) = if l.len() <= r.len() { (&l, &r) } else { (&r, &l) };
    short.len() >= 2 && short.len() < long.len() && is_subsequence(short, long)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAME: &[(&str, &str)] = &[
        ("Berlin Hbf", "Berlin Hbf"),
        ("Berlin Hbf", "Berlin HBF"),
        ("Berlin Hauptbahnhof", "Berlin, Hauptbahnhof"),
        ("Berlin Hauptbahnhof", "Berlin (Hauptbahnhof)"),
        ("Berlin, Hauptbahnhof", "Berlin (Hauptbahnhof)"),
        ("Paris-Gare-de-Lyon", "Paris Gare de Lyon"),
        ("Berlin Hbf", "Berlin Hauptbahnhof"),
        ("Amsterdam Cs", "Amsterdam Centraal"),
        ("S+U Berlin Hbf", "Berlin Hauptbahnhof"),
        ("Berlin Schönefeld Flughafen (S)", "S Berlin Schönefeld Flughafen"),
        ("Paris Gare de Lyon RER", "Paris Gare de Lyon"),
        ("Boissy-St-Léger", "Gare de Boissy-St-Léger"),
        ("Flughafen Wien", "Flughafen Wien Bahnhof"),
        ("Berlin Schönefeld Flughafen Bhf", "Berlin Schönefeld Flughafen"),
        ("Paris Gare de Lyon (Paris)", "Paris Gare de Lyon"),
        ("Boissy-St-Léger (Boissy-Saint-Léger)", "Boissy St Léger"),
        ("Paris Gare de Lyon", "Gare de Lyon (Paris)"),
        ("Berlin Flughafen Schönefeld (Airport)", "Berlin Flughafen Schönefeld Bhf"),
        ("Berlin Flughafen Schonefeld", "Berlin Flughafen Schönefeld"),
        ("Berlin Flughafen Schoenefeld", "Berlin Flughafen Schönefeld"),
        ("København H", "Koebenhavn H"),
        ("Berlin Hbf (tief)", "Berlin Hbf"),
        ("Berlin Friedrichstr.", "Berlin Friedrichstraße"),
        ("St. Gallen", "Sankt Gallen"),
        ("Hamburg ZOB", "Hamburg, ZOB"),
    ];

    const DIFFERENT: &[(&str, &str)] = &[
        ("Berlin Hbf", "Berlin Ostbahnhof"),
        ("Berlin Hbf", "Hamburg Hbf"),
        ("Golm", "Potsdam-Golm"),
        ("Paris Gare de Lyon", "Paris Gare du Nord"),
        ("Wien Hbf", "Wien Westbahnhof"),
        ("Wien Hbf", "Wien Hbf Autobusbahnhof"),
        ("Hamburg Hbf", "Hamburg Hbf ZOB"),
    ];

    #[test]
    fn test_same_names() {
        for (lhs, rhs) in SAME {
            assert!(is_same_location_name(lhs, rhs), "{lhs} vs {rhs}");
            assert!(is_same_location_name(rhs, lhs), "{rhs} vs {lhs}");
        }
    }

    #[test]
    fn test_different_names() {
        for (lhs, rhs) in DIFFERENT {
            assert!(!is_same_location_name(lhs, rhs), "{lhs} vs {rhs}");
            assert!(!is_same_location_name(rhs, lhs), "{rhs} vs {lhs}");
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("S+U Berlin Hbf"), vec!["berlin", "hauptbahnhof"]);
        assert_eq!(tokenize("Gare de Lyon (Paris)"), vec!["lyon", "paris"]);
        assert_eq!(tokenize("Köln Messe/Deutz"), vec!["koln", "messe", "deutz"]);
        assert!(tokenize("Bahnhof").is_empty());
        assert_eq!(tokenize("Karl-Marx-Str."), vec!["karl", "marx", "strasse"]);
        assert_eq!(tokenize("Berlin Friedrichstr"), vec!["berlin", "friedrichstrasse"]);
        assert_eq!(tokenize("Sankt Pölten"), vec!["saint", "polten"]);
    }

    #[test]
    fn test_qualifier_only_names_compare_verbatim() {
        assert!(is_same_location_name("Bahnhof", "bahnhof "));
        assert!(!is_same_location_name("Bahnhof", "Gare"));
    }
}
