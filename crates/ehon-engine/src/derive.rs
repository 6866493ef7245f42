use ehon_contracts::persona::{
    detect_character_presence, parse_persona_text, CharacterPresence, PersonaRecord,
};
use tracing::{info, warn};

use crate::capabilities::VisionModel;
use crate::error::ModelError;
use crate::image_input::ImageInput;
use crate::prompts::{EXTRACTION_ERROR_MESSAGE, PERSONA_EXTRACTION_INSTRUCTION};

/// Result of reading one storybook page.
#[derive(Debug)]
pub enum Derivation {
    /// Persona and situation fields, possibly empty.
    Persona(PersonaRecord),
    /// The model reported no human character; `text` is its message.
    NoCharacter { text: String },
    /// The call failed. `message` starts with `エラー：` and is safe to show.
    Failed { message: String, source: ModelError },
}

impl Derivation {
    pub fn label(&self) -> &'static str {
        match self {
            Derivation::Persona(_) => "persona",
            Derivation::NoCharacter { .. } => "no_character",
            Derivation::Failed { .. } => "failed",
        }
    }
}

/// Persona derivation service: one vision call per page, no retries.
pub struct PersonaDeriver {
    vision: Box<dyn VisionModel>,
}

impl PersonaDeriver {
    pub fn new(vision: Box<dyn VisionModel>) -> Self {
        Self { vision }
    }

    pub fn model_name(&self) -> &str {
        self.vision.name()
    }

    pub fn derive(&self, image: &ImageInput) -> Derivation {
        info!(model = self.vision.name(), image = %image.label, "deriving persona from page");
        let text = match self
            .vision
            .describe_image(PERSONA_EXTRACTION_INSTRUCTION, image)
        {
            Ok(text) => text,
            Err(source) => {
                warn!(image = %image.label, "persona extraction failed: {source}");
                return Derivation::Failed {
                    message: format!("{EXTRACTION_ERROR_MESSAGE}\n詳細: {source}"),
                    source,
                };
            }
        };
        info!("vision model answered:\n{text}");
        classify_extraction_text(&text)
    }
}

/// Marker phrases win over any bullet lines in the same answer.
pub fn classify_extraction_text(text: &str) -> Derivation {
    match detect_character_presence(text) {
        CharacterPresence::Absent => Derivation::NoCharacter {
            text: text.trim().to_string(),
        },
        CharacterPresence::Present => Derivation::Persona(parse_persona_text(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::EXTRACTION_ERROR_PREFIX;
    use crate::testing::{page, ScriptedVision};

    #[test]
    fn bullet_answer_becomes_persona_record() {
        let vision = ScriptedVision::answering("--- キャラクター情報 ---\n- 名前：ミナ\n- 性別：女性");
        let deriver = PersonaDeriver::new(Box::new(vision));
        match deriver.derive(&page("page.jpg")) {
            Derivation::Persona(record) => {
                assert_eq!(record.len(), 2);
                assert_eq!(record.name(), Some("ミナ"));
            }
            other => panic!("expected persona, got {other:?}"),
        }
    }

    #[test]
    fn marker_phrase_means_no_character_even_with_bullets() {
        let derivation = classify_extraction_text("- メモ：動物だけ\n人間のキャラクターなし");
        assert!(matches!(derivation, Derivation::NoCharacter { .. }));
    }

    #[test]
    fn prose_without_marker_is_an_empty_persona() {
        let derivation = classify_extraction_text("きれいな森の絵だね。");
        assert!(matches!(derivation, Derivation::Persona(ref record) if record.is_empty()));
    }

    #[test]
    fn call_failure_yields_error_marked_message() {
        let vision = ScriptedVision::default();
        vision.push(Err(ModelError::Status {
            model: "scripted-vision".to_string(),
            status: 403,
            body: "API key not valid".to_string(),
        }));
        let deriver = PersonaDeriver::new(Box::new(vision));
        match deriver.derive(&page("page.jpg")) {
            Derivation::Failed { message, source } => {
                assert!(message.starts_with(EXTRACTION_ERROR_PREFIX));
                assert!(message.contains("API key not valid"));
                assert!(matches!(source, ModelError::Status { status: 403, .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn sends_the_fixed_instruction_once() {
        let vision = ScriptedVision::answering("- 名前：ケン");
        let deriver = PersonaDeriver::new(Box::new(vision.clone()));
        let _ = deriver.derive(&page("page.jpg"));

        let sent = vision.calls.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("page.jpg|"));
        assert!(sent[0].contains("指を指されているキャラクター"));
        assert!(sent[0].contains("人間のキャラクターなし"));
    }
}
