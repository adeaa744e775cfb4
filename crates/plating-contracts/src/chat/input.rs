use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, OPTIONAL_PATH_COMMANDS};

/// What one line typed at the chat prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Noop,
    Message(String),
    Help,
    ShowTranscript,
    Quit,
    SaveImage { path: Option<String> },
    Unknown { command: String, arg: String },
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_single_path_arg(arg: &str) -> Option<String> {
    if arg.trim().is_empty() {
        return None;
    }
    let parts = match shell_words::split(arg) {
        Ok(parts) => parts,
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    let joined = parts
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

pub fn parse_input(text: &str) -> ChatInput {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ChatInput::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return match action {
                    "help" => ChatInput::Help,
                    "show_transcript" => ChatInput::ShowTranscript,
                    _ => ChatInput::Quit,
                };
            }

            if find_action(&command, OPTIONAL_PATH_COMMANDS).is_some() {
                return ChatInput::SaveImage {
                    path: parse_single_path_arg(arg),
                };
            }

            return ChatInput::Unknown {
                command,
                arg: arg.to_string(),
            };
        }
    }

    ChatInput::Message(raw_trimmed.to_string())
}
