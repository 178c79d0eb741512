//! Path validation for the archive's underlying item store.
//!
//! Item names end up in petabox metadata files, which constrains what the
//! archive accepts: POSIX length limits, no XML-hostile characters, and a
//! set of reserved item-name prefix/suffix combinations.

/// PATH_MAX for a remote path.
pub const MAX_PATH_LENGTH: usize = 4096;

/// NAME_MAX for a single path segment.
pub const MAX_NAME_LENGTH: usize = 255;

/// Reserved item-name prefixes. Filenames must not combine one of these
/// with a reserved metadata suffix; extending this list can retroactively
/// invalidate a previously valid filename.
const RESERVED_ITEM_PREFIXES: [&str; 2] = ["DPS-VAULT", "IA-DPS-VAULT"];

const RESERVED_ITEM_SUFFIXES: [&str; 4] =
    ["_files.xml", "_meta.xml", "_meta.sqlite", "_reviews.xml"];

/// Returns true if the path can be stored as (part of) a petabox item.
///
/// Pure and side-effect free; valid UTF-8 is guaranteed by `&str`.
pub fn is_valid_path(remote: &str) -> bool {
    if remote.is_empty() || remote == "/" {
        return false;
    }
    if remote.len() > MAX_PATH_LENGTH {
        return false;
    }
    if remote.contains("//") {
        return false;
    }
    for segment in remote.split('/') {
        if segment == "." || segment == ".." {
            return false;
        }
        if segment.len() > MAX_NAME_LENGTH {
            return false;
        }
    }
    if remote.contains(['\u{0}', '\n', '\r']) {
        return false;
    }
    if !is_valid_xml_chardata(remote) {
        return false;
    }
    let stripped = remote.trim_start_matches('/');
    for prefix in RESERVED_ITEM_PREFIXES {
        if !stripped.starts_with(prefix) {
            continue;
        }
        for suffix in RESERVED_ITEM_SUFFIXES {
            if remote.ends_with(suffix) {
                return false;
            }
        }
    }
    true
}

/// Whether `s` survives as XML 1.0 character data inside `<x>…</x>`.
///
/// Character data may not contain a raw `<`, and `&` must introduce a valid
/// entity or character reference. Characters outside the XML `Char`
/// production are rejected outright.
fn is_valid_xml_chardata(s: &str) -> bool {
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        match c {
            '<' => return false,
            '&' => {
                let Some(len) = entity_reference_len(rest) else {
                    return false;
                };
                rest = &rest[len..];
                continue;
            }
            _ if !is_xml_char(c) => return false,
            _ => {}
        }
        rest = &rest[c.len_utf8()..];
    }
    true
}

/// XML 1.0 `Char` production (tab, LF, CR plus the non-control planes).
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Length in bytes of a valid entity/character reference at the start of
/// `s` (which begins with `&`), or `None`.
fn entity_reference_len(s: &str) -> Option<usize> {
    let body = &s[1..];
    let end = body.find(';')?;
    let name = &body[..end];
    let valid = match name.strip_prefix('#') {
        Some(num) => match num.strip_prefix('x') {
            Some(hexa) => !hexa.is_empty() && hexa.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        },
        None => matches!(name, "amp" | "lt" | "gt" | "apos" | "quot"),
    };
    if valid {
        Some(1 + end + 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_paths() {
        assert!(is_valid_path("/Collection/a/b/c.pdf"));
        assert!(is_valid_path("photos/2023/trip.jpg"));
        assert!(is_valid_path("/x"));
    }

    #[test]
    fn rejects_empty_and_root() {
        assert!(!is_valid_path(""));
        assert!(!is_valid_path("/"));
    }

    #[test]
    fn rejects_double_slash() {
        assert!(!is_valid_path("/a//b"));
    }

    #[test]
    fn rejects_dot_segments() {
        assert!(!is_valid_path("/./x"));
        assert!(!is_valid_path("/a/../b"));
        assert!(!is_valid_path(".."));
    }

    #[test]
    fn rejects_overlong_paths_and_segments() {
        let long_path = format!("/{}", "a".repeat(4096));
        assert_eq!(long_path.len(), 4097);
        assert!(!is_valid_path(&long_path));

        let long_segment = format!("/{}", "b".repeat(256));
        assert!(!is_valid_path(&long_segment));
        let max_segment = format!("/{}", "b".repeat(255));
        assert!(is_valid_path(&max_segment));
    }

    #[test]
    fn rejects_control_characters() {
        assert!(!is_valid_path("/a\u{0}b"));
        assert!(!is_valid_path("/a\nb"));
        assert!(!is_valid_path("/a\rb"));
        assert!(!is_valid_path("/a\u{1}b"));
    }

    #[test]
    fn rejects_xml_hostile_characters() {
        assert!(!is_valid_path("/a<b"));
        assert!(!is_valid_path("/a&b"));
        assert!(!is_valid_path("/a&unknown;b"));
        // Valid references survive.
        assert!(is_valid_path("/a&amp;b"));
        assert!(is_valid_path("/a&#38;b"));
        assert!(is_valid_path("/a&#x26;b"));
        // A bare `>` is fine in character data.
        assert!(is_valid_path("/a>b"));
    }

    #[test]
    fn rejects_reserved_item_names() {
        assert!(!is_valid_path("/DPS-VAULT-A/foo_meta.xml"));
        assert!(!is_valid_path("/IA-DPS-VAULT-QA-1_files.xml"));
        assert!(!is_valid_path("DPS-VAULT_meta.sqlite"));
        assert!(!is_valid_path("/DPS-VAULT/x_reviews.xml"));
        // Prefix without a reserved suffix is allowed, and vice versa.
        assert!(is_valid_path("/DPS-VAULT-A/report.pdf"));
        assert!(is_valid_path("/archive/foo_meta.xml"));
    }

    #[test]
    fn validator_is_deterministic() {
        for input in ["/a//b", "/Collection/a/b/c.pdf", "/./x", ""] {
            assert_eq!(is_valid_path(input), is_valid_path(input));
        }
    }
}
