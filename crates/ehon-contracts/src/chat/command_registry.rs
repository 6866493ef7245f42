#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image",
        action: "stage_image",
    },
    CommandSpec {
        command: "show",
        action: "show_image",
    },
    CommandSpec {
        command: "voice",
        action: "voice_turn",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "clear_image",
        action: "clear_image",
    },
    CommandSpec {
        command: "persona",
        action: "show_persona",
    },
    CommandSpec {
        command: "voice_name",
        action: "show_voice",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/image <path>",
    "/clear_image",
    "/show <path>",
    "/voice <wav>",
    "/persona",
    "/voice_name",
    "/help",
    "/quit",
];
