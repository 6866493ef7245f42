use std::sync::OnceLock;

use regex::Regex;

use super::record::PersonaRecord;

fn bullet_field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-\s*(.+?)\s*[:：]\s*(.*)$").expect("bullet field pattern is valid")
    })
}

/// Parses `- key：value` lines into a [`PersonaRecord`].
///
/// Either an ASCII or a full-width colon separates key from value; the first
/// colon wins, so values may contain colons themselves. Lines that do not
/// start with a dash are skipped. Never fails: unusable input yields an
/// empty record.
pub fn parse_persona_text(text: &str) -> PersonaRecord {
    let pattern = bullet_field_pattern();
    let mut record = PersonaRecord::new();
    for line in text.lines() {
        let Some(captures) = pattern.captures(line) else {
            continue;
        };
        let key = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let value = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        record.insert(key, value);
    }
    record
}
