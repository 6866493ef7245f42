use super::record::PersonaRecord;

/// Input accepted by [`format_persona`]. `Raw` covers fallback paths where
/// the extraction produced a message instead of fields.
#[derive(Debug, Clone, Copy)]
pub enum PersonaSource<'a> {
    Record(&'a PersonaRecord),
    Raw(&'a str),
}

/// Renders persona fields one per line as `- key：value`, in record order.
/// Raw text is returned unchanged.
pub fn format_persona(source: PersonaSource<'_>) -> String {
    match source {
        PersonaSource::Record(record) => record.to_string(),
        PersonaSource::Raw(text) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_entry() {
        let record: PersonaRecord = [("名前", "ミナ"), ("場所", "森の中")].into_iter().collect();
        assert_eq!(
            format_persona(PersonaSource::Record(&record)),
            "- 名前：ミナ\n- 場所：森の中"
        );
    }

    #[test]
    fn empty_record_renders_empty_string() {
        assert_eq!(format_persona(PersonaSource::Record(&PersonaRecord::new())), "");
    }

    #[test]
    fn raw_text_passes_through() {
        let raw = "エラー：画像からキャラクター情報や状況を生成できませんでした。";
        assert_eq!(format_persona(PersonaSource::Raw(raw)), raw);
    }
}
