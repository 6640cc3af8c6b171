//! Per-chat conversation state.
//!
//! Admin commands sent without arguments park the chat in an awaiting state;
//! the next plain message supplies the arguments. Any other command abandons
//! the pending input.

use super::types::{BotCommand, PendingInput};

/// Where a chat is in the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatState {
    #[default]
    Idle,
    Awaiting(PendingInput),
}

/// A classified incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(BotCommand),
    /// Slash-prefixed text that is not a known command.
    UnknownCommand(String),
    /// A known command with an argument it cannot use; carries its usage.
    MalformedCommand(&'static str),
    Text(String),
}

impl Input {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match BotCommand::parse(trimmed) {
            Some(command) => Self::Command(command),
            None if trimmed.starts_with('/') => match BotCommand::usage(&command_name(trimmed)) {
                Some(usage) => Self::MalformedCommand(usage),
                None => Self::UnknownCommand(trimmed.to_owned()),
            },
            None => Self::Text(trimmed.to_owned()),
        }
    }
}

/// Lowercased command word without the slash or `@botname` suffix.
fn command_name(text: &str) -> String {
    let word = text.trim_start_matches('/').split_whitespace().next().unwrap_or_default();
    word.split('@').next().unwrap_or(word).to_lowercase()
}

/// What the handler should do in response to an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Execute(BotCommand),
    Prompt(PendingInput),
    Cancel { had_pending: bool },
    UnknownCommand(String),
    Usage(&'static str),
    /// Plain text with nothing pending.
    Chat,
}

/// Computes the next state and the action for an input.
#[must_use]
pub fn transition(state: ChatState, input: Input) -> (ChatState, Action) {
    match (state, input) {
        (ChatState::Awaiting(_), Input::Command(BotCommand::Cancel)) => {
            (ChatState::Idle, Action::Cancel { had_pending: true })
        }
        (ChatState::Idle, Input::Command(BotCommand::Cancel)) => {
            (ChatState::Idle, Action::Cancel { had_pending: false })
        }
        (ChatState::Awaiting(pending), Input::Text(text)) => {
            (ChatState::Idle, Action::Execute(pending.complete(&text)))
        }
        (ChatState::Idle | ChatState::Awaiting(_), Input::Command(command)) => match command.pending() {
            Some(pending) => (ChatState::Awaiting(pending), Action::Prompt(pending)),
            None => (ChatState::Idle, Action::Execute(command)),
        },
        (state, Input::UnknownCommand(text)) => (state, Action::UnknownCommand(text)),
        (state, Input::MalformedCommand(usage)) => (state, Action::Usage(usage)),
        (ChatState::Idle, Input::Text(_)) => (ChatState::Idle, Action::Chat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_parse() {
        assert_eq!(Input::parse("/next"), Input::Command(BotCommand::Next));
        assert_eq!(Input::parse("/nope"), Input::UnknownCommand("/nope".to_owned()));
        assert_eq!(Input::parse(" hello "), Input::Text("hello".to_owned()));
    }

    #[test]
    fn test_bare_admin_command_prompts() {
        let (state, action) = transition(ChatState::Idle, Input::parse("/block"));
        assert_eq!(state, ChatState::Awaiting(PendingInput::BlockUser));
        assert_eq!(action, Action::Prompt(PendingInput::BlockUser));
    }

    #[test]
    fn test_text_completes_pending() {
        let (state, action) = transition(
            ChatState::Awaiting(PendingInput::AssignTable),
            Input::parse("42 abc"),
        );
        assert_eq!(state, ChatState::Idle);
        assert_eq!(action, Action::Execute(BotCommand::Assign(Some("42 abc".to_owned()))));
    }

    #[test]
    fn test_cancel() {
        let (state, action) = transition(ChatState::Awaiting(PendingInput::AddTable), Input::parse("/cancel"));
        assert_eq!(state, ChatState::Idle);
        assert_eq!(action, Action::Cancel { had_pending: true });

        let (_, action) = transition(ChatState::Idle, Input::parse("/cancel"));
        assert_eq!(action, Action::Cancel { had_pending: false });
    }

    #[test]
    fn test_command_abandons_pending() {
        let (state, action) = transition(ChatState::Awaiting(PendingInput::AllowUser), Input::parse("/weeks"));
        assert_eq!(state, ChatState::Idle);
        assert_eq!(action, Action::Execute(BotCommand::Weeks));

        let (state, _) = transition(ChatState::Awaiting(PendingInput::AllowUser), Input::parse("/unblock"));
        assert_eq!(state, ChatState::Awaiting(PendingInput::UnblockUser));
    }

    #[test]
    fn test_unknown_command_keeps_state() {
        let awaiting = ChatState::Awaiting(PendingInput::RemoveTable);
        let (state, action) = transition(awaiting, Input::parse("/what"));
        assert_eq!(state, awaiting);
        assert!(matches!(action, Action::UnknownCommand(_)));
    }

    #[test]
    fn test_bad_argument_gives_usage() {
        assert_eq!(Input::parse("/week abc"), Input::MalformedCommand("/week <n>"));
        assert_eq!(Input::parse("/Workout@PlanBot x"), Input::MalformedCommand("/workout <n>"));

        let awaiting = ChatState::Awaiting(PendingInput::AllowUser);
        let (state, action) = transition(awaiting, Input::parse("/week -1"));
        assert_eq!(state, awaiting);
        assert_eq!(action, Action::Usage("/week <n>"));
    }

    #[test]
    fn test_idle_text_is_chat() {
        assert_eq!(transition(ChatState::Idle, Input::parse("hi")).1, Action::Chat);
    }
}
