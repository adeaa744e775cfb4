#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "transcript",
        action: "show_transcript",
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

pub(crate) const OPTIONAL_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "save",
    action: "save_image",
}];

pub const CHAT_HELP_COMMANDS: &[(&str, &str)] = &[
    ("/help", "show this list"),
    ("/save [path]", "save the latest image (defaults to the output directory)"),
    ("/transcript", "print the whole conversation again"),
    ("/quit", "leave the chat"),
];
