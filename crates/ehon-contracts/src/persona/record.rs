use std::fmt;

use indexmap::IndexMap;

use super::traits::Gender;

/// Labels the vision prompt uses for the character's name.
pub const NAME_FIELD_LABELS: &[&str] = &["名前", "name"];

/// Labels the vision prompt uses for the character's gender.
pub const GENDER_FIELD_LABELS: &[&str] = &["性別", "gender"];

/// Persona and situation fields extracted from one storybook page.
///
/// Keys are whatever the model emitted, in emission order. A record is
/// replaced wholesale by the next extraction; fields are never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonaRecord {
    fields: IndexMap<String, String>,
}

impl PersonaRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field. A repeated key keeps its first position and takes
    /// the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Looks up the first field whose key is `label` or starts with it.
    ///
    /// Models tend to echo the whole prompt label back, e.g.
    /// `性別（外見から判断して男性/女性/不明のいずれか）`, so an exact match is
    /// tried first and a prefix match second.
    pub fn field(&self, label: &str) -> Option<&str> {
        if let Some(value) = self.get(label) {
            return Some(value);
        }
        self.fields
            .iter()
            .find(|(key, _)| key.starts_with(label))
            .map(|(_, value)| value.as_str())
    }

    fn field_any(&self, labels: &[&str]) -> Option<&str> {
        labels.iter().find_map(|label| self.field(label))
    }

    pub fn name(&self) -> Option<&str> {
        self.field_any(NAME_FIELD_LABELS)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn gender(&self) -> Gender {
        self.field_any(GENDER_FIELD_LABELS)
            .map(Gender::classify)
            .unwrap_or(Gender::Unspecified)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First display line (`- key：value`), empty for an empty record.
    pub fn first_line(&self) -> String {
        self.fields
            .first()
            .map(|(key, value)| render_line(key, value))
            .unwrap_or_default()
    }
}

impl fmt::Display for PersonaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&render_line(key, value))?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PersonaRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = PersonaRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

pub(crate) fn render_line(key: &str, value: &str) -> String {
    format!("- {key}：{value}")
}
