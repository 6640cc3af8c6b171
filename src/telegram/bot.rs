//! Telegram Bot API transport.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{BotCommand as MenuCommand, ParseMode, User};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::{BotCommand, ChatUser, CommandHandler, render};
use crate::scheduler::RefreshReport;

/// Runs the long-polling dispatcher until Ctrl+C.
pub async fn run_dispatcher(bot: Bot, handler: Arc<CommandHandler>) {
    info!("Starting Telegram dispatcher");

    let schema = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![handler])
        .default_handler(|update| async move {
            debug!("Ignoring update {}", update.id.0);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram dispatcher stopped");
}

async fn handle_message(bot: Bot, msg: Message, handler: Arc<CommandHandler>) -> ResponseResult<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let Some(user) = chat_user(from) else {
        warn!("Ignoring message from out-of-range user id {}", from.id);
        return Ok(());
    };

    let result = handler.handle(&user, text).await;
    bot.send_message(msg.chat.id, result.message)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

fn chat_user(from: &User) -> Option<ChatUser> {
    let id = i64::try_from(from.id.0).ok()?;
    let name = from.username.clone().unwrap_or_else(|| from.full_name());
    Some(ChatUser::new(id, Some(name)))
}

/// Publishes the user command list shown in the Telegram menu.
///
/// # Errors
///
/// Returns an error if the Bot API rejects the request.
pub async fn register_commands(bot: &Bot) -> ResponseResult<()> {
    let commands: Vec<MenuCommand> = BotCommand::user_commands()
        .into_iter()
        .map(|(usage, description)| {
            let name = usage.trim_start_matches('/').split(' ').next().unwrap_or(usage);
            MenuCommand::new(name, description)
        })
        .collect();

    bot.set_my_commands(commands).await?;
    Ok(())
}

/// Sends every refresh report with failures to all admins.
pub async fn forward_reports(bot: Bot, admin_ids: Vec<i64>, mut reports: mpsc::Receiver<RefreshReport>) {
    while let Some(report) = reports.recv().await {
        let text = render::report(&report);

        for &admin in &admin_ids {
            if let Err(e) = bot
                .send_message(ChatId(admin), text.clone())
                .parse_mode(ParseMode::MarkdownV2)
                .await
            {
                warn!("Failed to notify admin {}: {}", admin, e);
            }
        }
    }

    debug!("Report channel closed");
}
