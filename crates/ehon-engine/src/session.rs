//! Conversation session manager.
//!
//! Owns the live chat session, the persona metadata and the display text.
//! Each turn may replace the session (a new page was shown) before the
//! utterance is sent.

use chrono::{DateTime, Utc};
use ehon_contracts::persona::{format_persona, PersonaRecord, PersonaSource, Voice};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capabilities::ChatModel;
use crate::derive::{Derivation, PersonaDeriver};
use crate::error::{ModelError, RecoveredError};
use crate::image_input::ImageInput;
use crate::prompts::{
    chat_failed_reply, extraction_failed_reply, greeting_failed_reply, persona_greeting_request,
    persona_priming_instruction, DEFAULT_PRIMING_ACK, DEFAULT_PRIMING_INSTRUCTION,
    DISPLAY_DEFAULT, DISPLAY_EXTRACTION_FAILED, DISPLAY_NO_CHARACTER, DISPLAY_UNSET,
    NO_CHARACTER_GREETING_REQUEST, NO_CHARACTER_PRIMING_ACK, NO_CHARACTER_PRIMING_INSTRUCTION,
    PERSONA_PRIMING_ACK, PROMPT_FOR_INPUT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    Default,
    Persona(PersonaRecord),
    NoCharacter,
}

impl SessionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Default => "default",
            SessionKind::Persona(_) => "persona",
            SessionKind::NoCharacter => "no_character",
        }
    }
}

/// One chat session: the priming pair followed by every successful exchange.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    kind: SessionKind,
    started_at: DateTime<Utc>,
    turns: Vec<ChatTurn>,
}

impl ConversationSession {
    fn primed(kind: SessionKind, instruction: String, ack: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            started_at: Utc::now(),
            turns: vec![ChatTurn::user(instruction), ChatTurn::model(ack)],
        }
    }

    pub fn default_session() -> Self {
        Self::primed(
            SessionKind::Default,
            DEFAULT_PRIMING_INSTRUCTION.to_string(),
            DEFAULT_PRIMING_ACK,
        )
    }

    pub fn no_character() -> Self {
        Self::primed(
            SessionKind::NoCharacter,
            NO_CHARACTER_PRIMING_INSTRUCTION.to_string(),
            NO_CHARACTER_PRIMING_ACK,
        )
    }

    pub fn persona(record: PersonaRecord) -> Self {
        let block = format_persona(PersonaSource::Record(&record));
        Self::primed(
            SessionKind::Persona(record),
            persona_priming_instruction(&block),
            PERSONA_PRIMING_ACK,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &SessionKind {
        &self.kind
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// History is only extended when the model answers.
    pub fn send(&mut self, chat: &dyn ChatModel, message: &str) -> Result<String, ModelError> {
        let reply = chat.send(&self.turns, message)?;
        self.turns.push(ChatTurn::user(message));
        self.turns.push(ChatTurn::model(reply.clone()));
        Ok(reply)
    }
}

/// Observable conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Default,
    Persona(PersonaRecord),
    NoCharacter,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::NoSession => "no_session",
            SessionState::Default => "default",
            SessionState::Persona(_) => "persona",
            SessionState::NoCharacter => "no_character",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Model,
    Greeting,
    PromptForInput,
    ExtractionFailed,
    ChatFailed,
    /// Set by the voice path when the recording could not be transcribed.
    RecognitionFailed,
}

impl ReplyOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplyOutcome::Model => "model",
            ReplyOutcome::Greeting => "greeting",
            ReplyOutcome::PromptForInput => "prompt_for_input",
            ReplyOutcome::ExtractionFailed => "extraction_failed",
            ReplyOutcome::ChatFailed => "chat_failed",
            ReplyOutcome::RecognitionFailed => "recognition_failed",
        }
    }
}

/// What one turn produced. `errors` holds every failure that was softened
/// into the reply text, in the order they happened.
#[derive(Debug)]
pub struct TurnReply {
    pub text: String,
    pub outcome: ReplyOutcome,
    pub derivation: Option<&'static str>,
    pub session_started: bool,
    pub errors: Vec<RecoveredError>,
}

impl TurnReply {
    fn new(text: impl Into<String>, outcome: ReplyOutcome) -> Self {
        Self {
            text: text.into(),
            outcome,
            derivation: None,
            session_started: false,
            errors: Vec::new(),
        }
    }
}

pub struct SessionManager {
    deriver: PersonaDeriver,
    chat: Box<dyn ChatModel>,
    session: Option<ConversationSession>,
    persona_metadata: PersonaRecord,
    display_text: String,
}

impl SessionManager {
    pub fn new(deriver: PersonaDeriver, chat: Box<dyn ChatModel>) -> Self {
        Self {
            deriver,
            chat,
            session: None,
            persona_metadata: PersonaRecord::new(),
            display_text: DISPLAY_UNSET.to_string(),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.session.as_ref().map(|session| &session.kind) {
            None => SessionState::NoSession,
            Some(SessionKind::Default) => SessionState::Default,
            Some(SessionKind::Persona(record)) => SessionState::Persona(record.clone()),
            Some(SessionKind::NoCharacter) => SessionState::NoCharacter,
        }
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    pub fn persona_metadata(&self) -> &PersonaRecord {
        &self.persona_metadata
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    /// Voice for the current persona; unspecified when none is set.
    pub fn voice(&self) -> Voice {
        self.persona_metadata.gender().voice()
    }

    pub fn deriver(&self) -> &PersonaDeriver {
        &self.deriver
    }

    pub fn chat_model_name(&self) -> &str {
        self.chat.name()
    }

    /// Runs one conversational turn. Model failures never escape; they are
    /// folded into the reply text and listed in [`TurnReply::errors`].
    pub fn respond(&mut self, utterance: &str, image: Option<&ImageInput>) -> TurnReply {
        let utterance = utterance.trim();
        let mut started = false;

        if let Some(image) = image {
            let derivation = self.deriver.derive(image);
            let label = derivation.label();
            match derivation {
                Derivation::Failed { message, source } => {
                    let mut reply = self.extraction_failed(utterance, &message, source);
                    reply.derivation = Some(label);
                    return reply;
                }
                Derivation::NoCharacter { text } => {
                    debug!("vision model found no character: {text}");
                    self.replace_session(ConversationSession::no_character(), PersonaRecord::new());
                    self.display_text = DISPLAY_NO_CHARACTER.to_string();
                }
                Derivation::Persona(record) => {
                    let formatted = format_persona(PersonaSource::Record(&record));
                    self.display_text = if formatted.is_empty() {
                        DISPLAY_UNSET.to_string()
                    } else {
                        formatted
                    };
                    self.replace_session(ConversationSession::persona(record.clone()), record);
                }
            }
            started = true;

            if utterance.is_empty() {
                let mut reply = self.greet();
                reply.derivation = Some(label);
                reply.session_started = true;
                return reply;
            }
        }

        if utterance.is_empty() {
            debug!("empty utterance; prompting for input");
            return TurnReply::new(PROMPT_FOR_INPUT, ReplyOutcome::PromptForInput);
        }

        if self.session.is_none() {
            self.replace_session(ConversationSession::default_session(), PersonaRecord::new());
            self.display_text = DISPLAY_DEFAULT.to_string();
            started = true;
        }

        let mut reply = self.send(utterance);
        reply.session_started = started;
        reply
    }

    fn replace_session(&mut self, session: ConversationSession, metadata: PersonaRecord) {
        info!(
            session_id = %session.id,
            kind = session.kind.label(),
            "starting chat session"
        );
        self.session = Some(session);
        self.persona_metadata = metadata;
    }

    fn extraction_failed(&mut self, utterance: &str, message: &str, source: ModelError) -> TurnReply {
        self.display_text = DISPLAY_EXTRACTION_FAILED.to_string();
        let explanation = extraction_failed_reply(message);
        let mut errors = vec![RecoveredError::Extraction(source)];

        if utterance.is_empty() || self.session.is_none() {
            let mut reply = TurnReply::new(explanation, ReplyOutcome::ExtractionFailed);
            reply.errors = errors;
            return reply;
        }

        let follow_up = self.send(utterance);
        errors.extend(follow_up.errors);
        let mut reply = TurnReply::new(
            format!("{explanation}\n\n{}", follow_up.text),
            ReplyOutcome::ExtractionFailed,
        );
        reply.errors = errors;
        reply
    }

    fn greet(&mut self) -> TurnReply {
        let first_line = self.persona_metadata.first_line();
        let request = if first_line.is_empty() {
            NO_CHARACTER_GREETING_REQUEST.to_string()
        } else {
            persona_greeting_request(&first_line)
        };
        match self.send_raw(&request) {
            Ok(text) => TurnReply::new(text, ReplyOutcome::Greeting),
            Err(err) => {
                warn!("greeting failed: {err}");
                let mut reply =
                    TurnReply::new(greeting_failed_reply(&err.to_string()), ReplyOutcome::ChatFailed);
                reply.errors.push(RecoveredError::Chat(err));
                reply
            }
        }
    }

    fn send(&mut self, utterance: &str) -> TurnReply {
        match self.send_raw(utterance) {
            Ok(text) => TurnReply::new(text, ReplyOutcome::Model),
            Err(err) => {
                warn!("chat reply failed: {err}");
                let mut reply =
                    TurnReply::new(chat_failed_reply(&err.to_string()), ReplyOutcome::ChatFailed);
                reply.errors.push(RecoveredError::Chat(err));
                reply
            }
        }
    }

    fn send_raw(&mut self, message: &str) -> Result<String, ModelError> {
        let chat = self.chat.as_ref();
        let Some(session) = self.session.as_mut() else {
            return Err(ModelError::Empty {
                model: chat.name().to_string(),
                what: "session",
            });
        };
        debug!(session_id = %session.id, chars = message.chars().count(), "sending chat message");
        session.send(chat, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{PERSONA_BLOCK_END, PERSONA_BLOCK_START};
    use crate::testing::{model_failure, page, ScriptedChat, ScriptedVision};

    const MINA_PAGE: &str = "--- キャラクター情報 ---
- 名前：ミナ
- 性別：女性
- 見た目の特徴：赤いリボンの女の子
- 性格：元気で好奇心いっぱい
- 話しそうな口調や語尾：～だよ！
- 子供たちに対する役割や目的：一緒に遊ぶ友達
--- 現在の状況 ---
- 場所：森の中
- 周囲にいる他の人物や動物、重要な物：うさぎが二匹
- キャラクターの主な行動や状態：花を摘んでいる
- 絵全体の雰囲気：明るく楽しい";

    const NO_HUMAN: &str = "この絵には、お話しできそうな人間のキャラクターは見当たらないみたいだね。";

    fn manager(vision: &ScriptedVision, chat: &ScriptedChat) -> SessionManager {
        SessionManager::new(
            PersonaDeriver::new(Box::new(vision.clone())),
            Box::new(chat.clone()),
        )
    }

    #[test]
    fn starts_without_a_session() {
        let manager = manager(&ScriptedVision::default(), &ScriptedChat::default());
        assert_eq!(manager.state(), SessionState::NoSession);
        assert_eq!(manager.display_text(), DISPLAY_UNSET);
        assert_eq!(manager.voice(), Voice::Fenrir);
    }

    #[test]
    fn empty_utterance_without_image_makes_no_call_and_keeps_state() {
        let chat = ScriptedChat::default();
        let vision = ScriptedVision::default();
        let mut manager = manager(&vision, &chat);

        let reply = manager.respond("   ", None);
        assert_eq!(reply.text, PROMPT_FOR_INPUT);
        assert_eq!(reply.outcome, ReplyOutcome::PromptForInput);
        assert_eq!(manager.state(), SessionState::NoSession);
        assert_eq!(chat.call_count(), 0);
        assert_eq!(vision.call_count(), 0);

        manager.respond("こんにちは", None);
        let before = manager.session().map(|session| session.turns().len());
        let reply = manager.respond("", None);
        assert_eq!(reply.outcome, ReplyOutcome::PromptForInput);
        assert_eq!(manager.state(), SessionState::Default);
        assert_eq!(manager.session().map(|session| session.turns().len()), before);
        assert_eq!(chat.call_count(), 1);
    }

    #[test]
    fn first_text_turn_opens_default_session() {
        let chat = ScriptedChat::default();
        let mut manager = manager(&ScriptedVision::default(), &chat);

        let reply = manager.respond("こんにちは", None);
        assert_eq!(reply.outcome, ReplyOutcome::Model);
        assert_eq!(reply.text, "reply to: こんにちは");
        assert!(reply.session_started);
        assert_eq!(manager.state(), SessionState::Default);
        assert_eq!(manager.display_text(), DISPLAY_DEFAULT);

        let (history, message) = chat.last_call().unwrap();
        assert_eq!(message, "こんにちは");
        assert_eq!(history[0], ChatTurn::user(DEFAULT_PRIMING_INSTRUCTION));
        assert_eq!(history[1], ChatTurn::model(DEFAULT_PRIMING_ACK));
    }

    #[test]
    fn persona_page_primes_with_formatted_block_and_greets_by_name() {
        let vision = ScriptedVision::answering(MINA_PAGE);
        let chat = ScriptedChat::default();
        chat.push(Ok("こんにちは！ミナだよ！森でお花を摘んでいるんだ！".to_string()));
        let mut manager = manager(&vision, &chat);

        let reply = manager.respond("", Some(&page("mina.jpg")));
        assert_eq!(reply.outcome, ReplyOutcome::Greeting);
        assert!(reply.text.contains("ミナ"));
        assert!(reply.session_started);

        let SessionState::Persona(record) = manager.state() else {
            panic!("expected persona session");
        };
        assert_eq!(record.len(), 10);
        let block = format_persona(PersonaSource::Record(&record));
        assert_eq!(block.lines().count(), 10);
        assert_eq!(manager.display_text(), block);

        let (history, message) = chat.last_call().unwrap();
        assert_eq!(message, "（システム：- 名前：ミナ として挨拶してください）こんにちは！");
        let priming = &history[0].text;
        assert!(priming.contains(&format!("{PERSONA_BLOCK_START}\n{block}\n{PERSONA_BLOCK_END}")));
        assert!(priming.contains("1~3文"));
        assert_eq!(history[1], ChatTurn::model(PERSONA_PRIMING_ACK));
    }

    #[test]
    fn female_persona_keeps_sulafat_until_persona_changes() {
        let vision = ScriptedVision::answering(MINA_PAGE);
        vision.push(Ok(NO_HUMAN.to_string()));
        let chat = ScriptedChat::default();
        let mut manager = manager(&vision, &chat);

        manager.respond("", Some(&page("mina.jpg")));
        assert_eq!(manager.voice(), Voice::Sulafat);
        manager.respond("何してるの？", None);
        manager.respond("うさぎの名前は？", None);
        assert_eq!(manager.voice(), Voice::Sulafat);

        manager.respond("", Some(&page("forest.jpg")));
        assert_eq!(manager.voice(), Voice::Fenrir);
    }

    #[test]
    fn no_character_answer_enters_no_character_state() {
        let vision = ScriptedVision::answering(MINA_PAGE);
        vision.push(Ok(NO_HUMAN.to_string()));
        let chat = ScriptedChat::default();
        let mut manager = manager(&vision, &chat);
        manager.respond("", Some(&page("mina.jpg")));

        let reply = manager.respond("", Some(&page("forest.jpg")));
        assert_eq!(manager.state(), SessionState::NoCharacter);
        assert_eq!(manager.display_text(), DISPLAY_NO_CHARACTER);
        assert!(manager.persona_metadata().is_empty());
        assert_eq!(reply.outcome, ReplyOutcome::Greeting);

        let (history, message) = chat.last_call().unwrap();
        assert_eq!(message, NO_CHARACTER_GREETING_REQUEST);
        assert_eq!(history[0], ChatTurn::user(NO_CHARACTER_PRIMING_INSTRUCTION));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn marker_wins_over_bullets_in_the_same_answer() {
        let vision = ScriptedVision::answering("- 名前：不明\n人間のキャラクターなし");
        let mut manager = manager(&vision, &ScriptedChat::default());
        manager.respond("", Some(&page("cat.jpg")));
        assert_eq!(manager.state(), SessionState::NoCharacter);
    }

    #[test]
    fn image_with_utterance_answers_in_the_new_persona() {
        let vision = ScriptedVision::answering(MINA_PAGE);
        let chat = ScriptedChat::default();
        let mut manager = manager(&vision, &chat);

        let reply = manager.respond("どこにいるの？", Some(&page("mina.jpg")));
        assert_eq!(reply.outcome, ReplyOutcome::Model);
        assert_eq!(chat.call_count(), 1);
        let (history, message) = chat.last_call().unwrap();
        assert_eq!(message, "どこにいるの？");
        assert!(history[0].text.contains("- 場所：森の中"));
    }

    #[test]
    fn extraction_failure_from_no_session_creates_nothing() {
        let vision = ScriptedVision::default();
        vision.push(Err(model_failure("scripted-vision", "connection reset")));
        let chat = ScriptedChat::default();
        let mut manager = manager(&vision, &chat);

        let reply = manager.respond("", Some(&page("page.jpg")));
        assert_eq!(reply.outcome, ReplyOutcome::ExtractionFailed);
        assert!(reply.text.starts_with("画像からキャラクター情報や状況を取得できませんでした。"));
        assert!(reply.text.contains("詳細: エラー："));
        assert!(reply.text.contains("connection reset"));
        assert_eq!(reply.errors.len(), 1);
        assert_eq!(reply.errors[0].kind(), "extraction");
        assert_eq!(manager.state(), SessionState::NoSession);
        assert_eq!(manager.display_text(), DISPLAY_EXTRACTION_FAILED);
        assert_eq!(chat.call_count(), 0);
    }

    #[test]
    fn extraction_failure_keeps_prior_persona_session() {
        let vision = ScriptedVision::answering(MINA_PAGE);
        vision.push(Err(model_failure("scripted-vision", "timed out")));
        let chat = ScriptedChat::default();
        let mut manager = manager(&vision, &chat);
        manager.respond("", Some(&page("mina.jpg")));
        let id = manager.session().map(ConversationSession::id);

        let reply = manager.respond("まだいる？", Some(&page("blurry.jpg")));
        assert_eq!(reply.outcome, ReplyOutcome::ExtractionFailed);
        assert!(reply.text.ends_with("reply to: まだいる？"));
        assert!(matches!(manager.state(), SessionState::Persona(_)));
        assert_eq!(manager.session().map(ConversationSession::id), id);
        assert_eq!(manager.voice(), Voice::Sulafat);
    }

    #[test]
    fn chat_failure_leaves_history_untouched() {
        let chat = ScriptedChat::default();
        let mut manager = manager(&ScriptedVision::default(), &chat);
        manager.respond("こんにちは", None);
        let turns = manager.session().map(|session| session.turns().to_vec());

        chat.push(Err(model_failure("scripted-chat", "quota exceeded")));
        let reply = manager.respond("もう一回", None);
        assert_eq!(reply.outcome, ReplyOutcome::ChatFailed);
        assert!(reply.text.starts_with("AIからの応答取得中にエラーが発生しました: "));
        assert!(reply.text.contains("quota exceeded"));
        assert_eq!(manager.session().map(|session| session.turns().to_vec()), turns);
        assert_eq!(manager.state(), SessionState::Default);
    }

    #[test]
    fn greeting_failure_uses_greeting_message() {
        let vision = ScriptedVision::answering(MINA_PAGE);
        let chat = ScriptedChat::default();
        chat.push(Err(model_failure("scripted-chat", "503")));
        let mut manager = manager(&vision, &chat);

        let reply = manager.respond("", Some(&page("mina.jpg")));
        assert_eq!(reply.outcome, ReplyOutcome::ChatFailed);
        assert!(reply.text.starts_with("AIの挨拶生成中にエラーが発生しました: "));
        assert!(matches!(manager.state(), SessionState::Persona(_)));
    }

    #[test]
    fn session_id_is_stable_across_sends_and_changes_on_replacement() {
        let vision = ScriptedVision::answering(MINA_PAGE);
        let chat = ScriptedChat::default();
        let mut manager = manager(&vision, &chat);

        manager.respond("やあ", None);
        let first = manager.session().map(ConversationSession::id);
        manager.respond("元気？", None);
        assert_eq!(manager.session().map(ConversationSession::id), first);
        assert_eq!(manager.session().map(|session| session.turns().len()), Some(6));

        manager.respond("", Some(&page("mina.jpg")));
        assert_ne!(manager.session().map(ConversationSession::id), first);
    }

    #[test]
    fn prose_page_without_marker_becomes_empty_persona() {
        let vision = ScriptedVision::answering("明るい公園の絵です。");
        let chat = ScriptedChat::default();
        let mut manager = manager(&vision, &chat);

        let reply = manager.respond("", Some(&page("park.jpg")));
        assert_eq!(reply.outcome, ReplyOutcome::Greeting);
        assert_eq!(manager.state(), SessionState::Persona(PersonaRecord::new()));
        assert_eq!(manager.display_text(), DISPLAY_UNSET);
        let (_, message) = chat.last_call().unwrap();
        assert_eq!(message, NO_CHARACTER_GREETING_REQUEST);
    }
}
