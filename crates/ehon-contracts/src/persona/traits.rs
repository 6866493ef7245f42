#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Unspecified,
}

/// Gender labels accepted from the vision model. Matched after trimming,
/// exactly or as a prefix (`女性（推測）` still counts as female).
pub const GENDER_TABLE: &[(&str, Gender)] = &[
    ("男性", Gender::Male),
    ("女性", Gender::Female),
    ("male", Gender::Male),
    ("female", Gender::Female),
];

impl Gender {
    pub fn classify(value: &str) -> Gender {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Gender::Unspecified;
        }
        if let Some((_, gender)) = GENDER_TABLE
            .iter()
            .find(|(label, _)| normalized == *label)
        {
            return *gender;
        }
        GENDER_TABLE
            .iter()
            .find(|(label, _)| normalized.starts_with(label))
            .map(|(_, gender)| *gender)
            .unwrap_or(Gender::Unspecified)
    }

    pub fn voice(self) -> Voice {
        VOICE_TABLE
            .iter()
            .find(|(gender, _)| *gender == self)
            .map(|(_, voice)| *voice)
            .unwrap_or(Voice::Fenrir)
    }
}

/// Prebuilt speech voices used for character replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Voice {
    Charon,
    Sulafat,
    Fenrir,
}

impl Voice {
    pub fn as_str(self) -> &'static str {
        match self {
            Voice::Charon => "Charon",
            Voice::Sulafat => "Sulafat",
            Voice::Fenrir => "Fenrir",
        }
    }
}

pub const VOICE_TABLE: &[(Gender, Voice)] = &[
    (Gender::Male, Voice::Charon),
    (Gender::Female, Voice::Sulafat),
    (Gender::Unspecified, Voice::Fenrir),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterPresence {
    Present,
    Absent,
}

/// Phrases the vision model is told to use when the page has no human
/// character to speak as.
pub const NO_CHARACTER_MARKERS: &[&str] = &["人間のキャラクターなし", "見当たらないみたいだね"];

pub fn detect_character_presence(text: &str) -> CharacterPresence {
    if NO_CHARACTER_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
    {
        CharacterPresence::Absent
    } else {
        CharacterPresence::Present
    }
}
