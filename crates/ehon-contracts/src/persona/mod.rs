mod format;
mod parser;
mod record;
mod traits;

pub use format::{format_persona, PersonaSource};
pub use parser::parse_persona_text;
pub use record::{PersonaRecord, GENDER_FIELD_LABELS, NAME_FIELD_LABELS};
pub use traits::{
    detect_character_presence, CharacterPresence, Gender, Voice, GENDER_TABLE,
    NO_CHARACTER_MARKERS, VOICE_TABLE,
};
