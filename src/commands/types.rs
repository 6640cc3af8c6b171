//! Command types and definitions.

use std::fmt;

use teloxide::utils::markdown;

/// Available bot commands.
///
/// Admin commands carry their raw arguments; `None` means the admin will
/// send them in a follow-up message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Greet the user and show their access status.
    Start,

    /// Show help information.
    Help,

    /// List the plans of the assigned table.
    Plans,

    /// Select a plan by name or 1-based index.
    Plan(String),

    /// List the weeks of the selected plan.
    Weeks,

    /// Select a week by number.
    Week(usize),

    /// Show a workout of the selected week; `None` shows the selected one.
    Workout(Option<usize>),

    /// Advance to the next workout.
    Next,

    /// Select the week containing today.
    Today,

    /// Abort a pending admin input.
    Cancel,

    /// Refresh all tables now.
    Reload,

    /// Show refresh status.
    Status,

    /// List tracked tables.
    Tables,

    /// List known users.
    Users,

    /// List exercise videos.
    Links,

    AddTable(Option<String>),
    RemoveTable(Option<String>),
    AddLink(Option<String>),
    RemoveLink(Option<String>),
    Allow(Option<String>),
    Block(Option<String>),
    Unblock(Option<String>),
    Assign(Option<String>),
}

/// Admin input the bot is waiting for after an argument-less command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInput {
    AddTable,
    RemoveTable,
    AddExerciseLink,
    RemoveExerciseLink,
    AllowUser,
    BlockUser,
    UnblockUser,
    AssignTable,
}

impl PendingInput {
    /// Builds the full command once the awaited text arrives.
    #[must_use]
    pub fn complete(self, text: &str) -> BotCommand {
        let args = Some(text.trim().to_owned());
        match self {
            Self::AddTable => BotCommand::AddTable(args),
            Self::RemoveTable => BotCommand::RemoveTable(args),
            Self::AddExerciseLink => BotCommand::AddLink(args),
            Self::RemoveExerciseLink => BotCommand::RemoveLink(args),
            Self::AllowUser => BotCommand::Allow(args),
            Self::BlockUser => BotCommand::Block(args),
            Self::UnblockUser => BotCommand::Unblock(args),
            Self::AssignTable => BotCommand::Assign(args),
        }
    }

    /// Question shown while waiting for the input.
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::AddTable => "Send the table id (or URL) followed by page names, separated by commas.",
            Self::RemoveTable => "Send the id of the table to stop tracking.",
            Self::AddExerciseLink => "Send the exercise name followed by the video URL.",
            Self::RemoveExerciseLink => "Send the exercise name to unlink.",
            Self::AllowUser => "Send the Telegram id of the user to allow.",
            Self::BlockUser => "Send the Telegram id of the user to block.",
            Self::UnblockUser => "Send the Telegram id of the user to unblock.",
            Self::AssignTable => "Send the Telegram user id followed by the table id.",
        }
    }
}

fn non_empty(args: Option<&str>) -> Option<String> {
    args.filter(|a| !a.is_empty()).map(str::to_owned)
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message is not a known command or its argument
    /// is malformed.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let after_slash = text.strip_prefix('/')?;

        let (cmd, args) = match after_slash.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, Some(args.trim())),
            None => (after_slash, None),
        };

        // Group chats append the bot name: /start@SomeBot
        let cmd = cmd.split_once('@').map_or(cmd, |(c, _)| c).to_lowercase();

        match cmd.as_str() {
            "start" => Some(Self::Start),
            "help" | "h" => Some(Self::Help),
            "plans" => Some(Self::Plans),
            "plan" => Some(non_empty(args).map_or(Self::Plans, Self::Plan)),
            "weeks" => Some(Self::Weeks),
            "week" => match args.filter(|a| !a.is_empty()) {
                None => Some(Self::Weeks),
                Some(a) => a.parse().ok().map(Self::Week),
            },
            "workout" => match args.filter(|a| !a.is_empty()) {
                None => Some(Self::Workout(None)),
                Some(a) => a.parse().ok().map(|n| Self::Workout(Some(n))),
            },
            "next" | "n" => Some(Self::Next),
            "today" => Some(Self::Today),
            "cancel" => Some(Self::Cancel),
            "reload" | "refresh" => Some(Self::Reload),
            "status" => Some(Self::Status),
            "tables" => Some(Self::Tables),
            "users" => Some(Self::Users),
            "links" => Some(Self::Links),
            "add_table" => Some(Self::AddTable(non_empty(args))),
            "remove_table" => Some(Self::RemoveTable(non_empty(args))),
            "add_link" => Some(Self::AddLink(non_empty(args))),
            "remove_link" => Some(Self::RemoveLink(non_empty(args))),
            "allow" => Some(Self::Allow(non_empty(args))),
            "block" => Some(Self::Block(non_empty(args))),
            "unblock" => Some(Self::Unblock(non_empty(args))),
            "assign" => Some(Self::Assign(non_empty(args))),
            _ => None,
        }
    }

    /// Returns the input to wait for when an admin command lacks arguments.
    #[must_use]
    pub const fn pending(&self) -> Option<PendingInput> {
        match self {
            Self::AddTable(None) => Some(PendingInput::AddTable),
            Self::RemoveTable(None) => Some(PendingInput::RemoveTable),
            Self::AddLink(None) => Some(PendingInput::AddExerciseLink),
            Self::RemoveLink(None) => Some(PendingInput::RemoveExerciseLink),
            Self::Allow(None) => Some(PendingInput::AllowUser),
            Self::Block(None) => Some(PendingInput::BlockUser),
            Self::Unblock(None) => Some(PendingInput::UnblockUser),
            Self::Assign(None) => Some(PendingInput::AssignTable),
            _ => None,
        }
    }

    /// Returns true for commands only admins may run.
    #[must_use]
    pub const fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Self::Reload
                | Self::Status
                | Self::Tables
                | Self::Users
                | Self::Links
                | Self::AddTable(_)
                | Self::RemoveTable(_)
                | Self::AddLink(_)
                | Self::RemoveLink(_)
                | Self::Allow(_)
                | Self::Block(_)
                | Self::Unblock(_)
                | Self::Assign(_)
        )
    }

    /// Returns true for commands that work without access to a plan.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self, Self::Start | Self::Help | Self::Cancel)
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Plans => "plans",
            Self::Plan(_) => "plan",
            Self::Weeks => "weeks",
            Self::Week(_) => "week",
            Self::Workout(_) => "workout",
            Self::Next => "next",
            Self::Today => "today",
            Self::Cancel => "cancel",
            Self::Reload => "reload",
            Self::Status => "status",
            Self::Tables => "tables",
            Self::Users => "users",
            Self::Links => "links",
            Self::AddTable(_) => "add_table",
            Self::RemoveTable(_) => "remove_table",
            Self::AddLink(_) => "add_link",
            Self::RemoveLink(_) => "remove_link",
            Self::Allow(_) => "allow",
            Self::Block(_) => "block",
            Self::Unblock(_) => "unblock",
            Self::Assign(_) => "assign",
        }
    }

    /// Returns the usage line of a known command name such as `week`.
    #[must_use]
    pub fn usage(name: &str) -> Option<&'static str> {
        Self::user_commands()
            .into_iter()
            .chain(Self::admin_commands())
            .map(|(usage, _)| usage)
            .find(|usage| usage.trim_start_matches('/').split(' ').next() == Some(name))
    }

    /// Returns user commands as `(usage, description)` pairs.
    #[must_use]
    pub fn user_commands() -> Vec<(&'static str, &'static str)> {
        vec![
            ("/plans", "List available plans"),
            ("/plan <name>", "Select a plan"),
            ("/weeks", "List weeks of the plan"),
            ("/week <n>", "Select a week"),
            ("/workout <n>", "Show a workout of the week"),
            ("/next", "Show the next workout"),
            ("/today", "Jump to the current week"),
            ("/cancel", "Cancel the current input"),
            ("/help", "Show this help message"),
        ]
    }

    /// Returns admin commands as `(usage, description)` pairs.
    #[must_use]
    pub fn admin_commands() -> Vec<(&'static str, &'static str)> {
        vec![
            ("/reload", "Refresh all tables now"),
            ("/status", "Show last refresh result"),
            ("/tables", "List tracked tables"),
            ("/add_table <id> <pages>", "Track a table"),
            ("/remove_table <id>", "Stop tracking a table"),
            ("/links", "List exercise videos"),
            ("/add_link <exercise> <url>", "Attach a video to an exercise"),
            ("/remove_link <exercise>", "Remove an exercise video"),
            ("/users", "List known users"),
            ("/allow <user id>", "Grant access"),
            ("/block <user id>", "Revoke access"),
            ("/unblock <user id>", "Lift a block"),
            ("/assign <user id> <table id>", "Assign a table to a user"),
        ]
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan(name) => write!(f, "plan {name}"),
            Self::Week(n) | Self::Workout(Some(n)) => write!(f, "{} {n}", self.name()),
            Self::AddTable(Some(a))
            | Self::RemoveTable(Some(a))
            | Self::AddLink(Some(a))
            | Self::RemoveLink(Some(a))
            | Self::Allow(Some(a))
            | Self::Block(Some(a))
            | Self::Unblock(Some(a))
            | Self::Assign(Some(a)) => write!(f, "{} {a}", self.name()),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Result of command execution.
///
/// `message` is always ready-to-send `MarkdownV2`.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,
}

impl CommandResult {
    /// Creates a successful result from already formatted `MarkdownV2`.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates a successful result from plain text.
    #[must_use]
    pub fn text(message: &str) -> Self {
        Self::success(markdown::escape(message))
    }

    /// Creates an error result from plain text.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            message: markdown::escape(message),
        }
    }
}
