use sha2::{Digest, Sha256};

const MAX_STEM_CHARS: usize = 80;

/// Windows-safe, deterministic filename for one exported record:
/// `{sanitized_title}--{short_hash(key)}.json`.
///
/// `key` identifies the record (its id, else its source URL, else its
/// serialized body), so the same record always lands in the same file.
pub fn record_filename(title: Option<&str>, key: &str) -> String {
    let sanitized = sanitize_title(title.unwrap_or("untitled"));
    let hash = short_hash(key);
    format!("{sanitized}--{hash}.json")
}

/// Replaces forbidden characters, squeezes underscore runs and trims the
/// result to a bounded stem that Windows accepts.
fn sanitize_title(input: &str) -> String {
    const EDGE: &[char] = &['_', ' ', '.'];

    let mut stem = String::with_capacity(input.len());
    for c in input.chars().map(|c| if is_forbidden(c) { '_' } else { c }) {
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }
    let stem: String = stem
        .trim_matches(EDGE)
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let mut stem = stem.trim_end_matches(EDGE).to_string();
    if stem.is_empty() {
        stem.push_str("untitled");
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}
