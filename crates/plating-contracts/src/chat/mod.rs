mod command_registry;
mod directive;
mod input;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use directive::{classify_reply, parse_directive, Directive, DirectiveAction, ModelReply};
pub use input::{parse_input, ChatInput};
