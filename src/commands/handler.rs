//! Command handler implementation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use teloxide::utils::markdown::{bold, escape, escape_link_url};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::render;
use super::state::{Action, ChatState, Input, transition};
use super::types::{BotCommand, CommandResult};
use crate::config::{TrackedTable, TrackedTables};
use crate::plan::{WeekRoutine, WorkoutPlans};
use crate::scheduler::RefreshHandle;
use crate::users::{ExerciseLinks, UserRecord, UserStore, is_valid_url};

/// The sender of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: i64,
    pub name: Option<String>,
}

impl ChatUser {
    #[must_use]
    pub const fn new(id: i64, name: Option<String>) -> Self {
        Self { id, name }
    }
}

/// Shared state the handler reads and edits.
#[derive(Debug, Clone)]
pub struct BotContext {
    pub plans: WorkoutPlans,
    pub tables: Arc<RwLock<TrackedTables>>,

    /// Where table edits are saved.
    pub tables_path: PathBuf,

    pub users: Arc<RwLock<UserStore>>,
    pub links: Arc<RwLock<ExerciseLinks>>,
    pub refresh: RefreshHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Granted,
    Pending,
    Blocked,
}

/// A user's table and plan, checked against the registry.
struct Selection {
    user: UserRecord,
    table_id: String,
    plan: String,
}

/// Handles bot commands and per-chat conversation state.
pub struct CommandHandler {
    admin_ids: Vec<i64>,
    context: BotContext,
    sessions: Mutex<HashMap<i64, ChatState>>,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(admin_ids: Vec<i64>, context: BotContext) -> Self {
        Self {
            admin_ids,
            context,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    #[must_use]
    pub fn admin_ids(&self) -> &[i64] {
        &self.admin_ids
    }

    /// Handles one incoming text message and returns the reply.
    pub async fn handle(&self, user: &ChatUser, text: &str) -> CommandResult {
        let is_admin = self.is_admin(user.id);
        let access = self.register(user, is_admin).await;
        let input = Input::parse(text);

        if let Input::Command(command) = &input {
            debug!("User {} sent command: {}", user.id, command);
            if command.is_admin_only() && !is_admin {
                return CommandResult::error("This command is only available to admins.");
            }
        }

        let needs_access = match &input {
            Input::Command(command) => !command.is_public(),
            Input::Text(_) => true,
            Input::UnknownCommand(_) | Input::MalformedCommand(_) => false,
        };
        if needs_access {
            match access {
                Access::Granted => {}
                Access::Blocked => return CommandResult::error("Your access to this bot has been blocked."),
                Access::Pending => {
                    return CommandResult::error(&format!(
                        "You don't have access yet. Ask an admin to run /allow {}",
                        user.id
                    ));
                }
            }
        }

        let action = {
            let mut sessions = self.sessions.lock().await;
            let state = sessions.get(&user.id).copied().unwrap_or_default();
            let (next_state, action) = transition(state, input);
            if next_state == ChatState::Idle {
                sessions.remove(&user.id);
            } else {
                sessions.insert(user.id, next_state);
            }
            action
        };

        let result = match action {
            Action::Execute(command) => self.execute(user.id, command).await,
            Action::Prompt(pending) => CommandResult::text(pending.prompt()),
            Action::Cancel { had_pending: true } => CommandResult::text("Cancelled."),
            Action::Cancel { had_pending: false } => CommandResult::text("Nothing to cancel."),
            Action::UnknownCommand(text) => {
                CommandResult::error(&format!("Unknown command {text}. Send /help for the list."))
            }
            Action::Usage(usage) => CommandResult::error(&format!("Usage: {usage}")),
            Action::Chat => CommandResult::text("Send /help to see what I can do."),
        };

        info!("Reply to {}: success={}", user.id, result.success);
        result
    }

    /// Records the sender and returns their access level.
    async fn register(&self, user: &ChatUser, is_admin: bool) -> Access {
        let mut users = self.context.users.write().await;
        let is_new = users.get(user.id).is_none();
        let record = users.get_or_insert(user.id);

        let mut changed = is_new;
        if user.name.is_some() && record.name != user.name {
            record.name.clone_from(&user.name);
            changed = true;
        }
        if is_admin && !record.has_access() {
            record.authorized = true;
            record.blocked = false;
            changed = true;
        }

        let access = if record.blocked {
            Access::Blocked
        } else if record.authorized {
            Access::Granted
        } else {
            Access::Pending
        };

        if changed && let Err(e) = users.save() {
            warn!("Failed to save users: {}", e);
        }
        access
    }

    /// Executes a parsed command.
    async fn execute(&self, user_id: i64, command: BotCommand) -> CommandResult {
        match command {
            BotCommand::Start => self.handle_start(user_id).await,
            BotCommand::Help => self.handle_help(user_id),
            BotCommand::Plans => self.handle_plans(user_id).await,
            BotCommand::Plan(name) => self.handle_plan(user_id, &name).await,
            BotCommand::Weeks => self.handle_weeks(user_id).await,
            BotCommand::Week(number) => self.handle_week(user_id, number).await,
            BotCommand::Workout(number) => self.handle_workout(user_id, number).await,
            BotCommand::Next => self.handle_next(user_id).await,
            BotCommand::Today => self.handle_today(user_id).await,
            BotCommand::Cancel => CommandResult::text("Nothing to cancel."),
            BotCommand::Reload => self.handle_reload().await,
            BotCommand::Status => self.handle_status().await,
            BotCommand::Tables => self.handle_tables().await,
            BotCommand::Users => self.handle_users().await,
            BotCommand::Links => self.handle_links().await,
            BotCommand::AddTable(args) => self.handle_add_table(&args.unwrap_or_default()).await,
            BotCommand::RemoveTable(args) => self.handle_remove_table(&args.unwrap_or_default()).await,
            BotCommand::AddLink(args) => self.handle_add_link(&args.unwrap_or_default()).await,
            BotCommand::RemoveLink(args) => self.handle_remove_link(&args.unwrap_or_default()).await,
            BotCommand::Allow(args) => self.handle_allow(&args.unwrap_or_default()).await,
            BotCommand::Block(args) => self.handle_block(&args.unwrap_or_default()).await,
            BotCommand::Unblock(args) => self.handle_unblock(&args.unwrap_or_default()).await,
            BotCommand::Assign(args) => self.handle_assign(&args.unwrap_or_default()).await,
        }
    }

    async fn user(&self, user_id: i64) -> UserRecord {
        self.context
            .users
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserRecord::new(user_id))
    }

    /// Applies `update` to a user and saves the store.
    async fn update_user(&self, user_id: i64, update: impl FnOnce(&mut UserRecord)) {
        let mut users = self.context.users.write().await;
        update(users.get_or_insert(user_id));
        if let Err(e) = users.save() {
            warn!("Failed to save users: {}", e);
        }
    }

    async fn assigned_table(&self, user_id: i64) -> Result<(UserRecord, String), CommandResult> {
        let user = self.user(user_id).await;
        match user.table_id.clone() {
            Some(table_id) => Ok((user, table_id)),
            None => Err(CommandResult::error(
                "No plan table is assigned to you yet. Ask an admin to assign one.",
            )),
        }
    }

    async fn selection(&self, user_id: i64) -> Result<Selection, CommandResult> {
        let (user, table_id) = self.assigned_table(user_id).await?;
        let Some(plan) = user.plan.clone() else {
            return Err(CommandResult::error("Select a plan first with /plans."));
        };

        if !self.context.plans.get_plan_names(&table_id).await.contains(&plan) {
            return Err(CommandResult::error(&format!(
                "Plan {plan} is not available right now. Pick another with /plans."
            )));
        }

        Ok(Selection { user, table_id, plan })
    }

    async fn plan_weeks(&self, selection: &Selection) -> Vec<WeekRoutine> {
        self.context
            .plans
            .table(&selection.table_id)
            .await
            .and_then(|t| t.page(&selection.plan).map(<[WeekRoutine]>::to_vec))
            .unwrap_or_default()
    }

    async fn handle_start(&self, user_id: i64) -> CommandResult {
        let user = self.user(user_id).await;

        if !user.has_access() {
            return CommandResult::text(&format!(
                "Hi! This bot shows your workout plan.\n\
                 Your Telegram id is {user_id}. Send it to your coach to get access."
            ));
        }

        let Some(table_id) = user.table_id else {
            return CommandResult::text("Hi! No plan table is assigned to you yet. Ask your coach to assign one.");
        };

        let name = self
            .context
            .plans
            .table_name(&table_id)
            .await
            .filter(|n| !n.is_empty())
            .unwrap_or(table_id);
        CommandResult::text(&format!(
            "Hi! Your plan table is {name}.\nSend /plans to pick a plan or /next for the next workout."
        ))
    }

    fn handle_help(&self, user_id: i64) -> CommandResult {
        let version = env!("CARGO_PKG_VERSION");
        let mut lines = vec![bold(&escape(&format!("Workout plan bot v{version}"))), String::new()];

        for (usage, description) in BotCommand::user_commands() {
            lines.push(escape(&format!("{usage} - {description}")));
        }

        if self.is_admin(user_id) {
            lines.push(String::new());
            lines.push(bold("Admin"));
            for (usage, description) in BotCommand::admin_commands() {
                lines.push(escape(&format!("{usage} - {description}")));
            }
            lines.push(escape("Admin commands sent without arguments ask for them."));
        }

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_plans(&self, user_id: i64) -> CommandResult {
        let (user, table_id) = match self.assigned_table(user_id).await {
            Ok(found) => found,
            Err(e) => return e,
        };

        let names = self.context.plans.get_plan_names(&table_id).await;
        if names.is_empty() {
            return CommandResult::error("Your table has not been loaded yet. Try again later.");
        }

        let table_name = self.context.plans.table_name(&table_id).await.unwrap_or_default();
        CommandResult::success(render::plans(&table_name, &names, user.plan.as_deref()))
    }

    async fn handle_plan(&self, user_id: i64, query: &str) -> CommandResult {
        let (_, table_id) = match self.assigned_table(user_id).await {
            Ok(found) => found,
            Err(e) => return e,
        };

        let names = self.context.plans.get_plan_names(&table_id).await;
        let Some(plan) = find_plan(&names, query).cloned() else {
            return CommandResult::error(&format!("No plan named {query}. Send /plans for the list."));
        };

        let today = Local::now().date_naive();
        let current = self.context.plans.current_week(&table_id, &plan, today).await;
        // Before the plan starts, point at its first week.
        let week = current.map_or(1, |w| w.number);

        self.update_user(user_id, |u| {
            u.plan = Some(plan.clone());
            u.week = Some(week);
            u.workout = None;
        })
        .await;

        let selection = Selection {
            user: self.user(user_id).await,
            table_id,
            plan,
        };
        let weeks = self.plan_weeks(&selection).await;
        CommandResult::success(render::weeks(&selection.plan, &weeks, today, selection.user.week))
    }

    async fn handle_weeks(&self, user_id: i64) -> CommandResult {
        let selection = match self.selection(user_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        let weeks = self.plan_weeks(&selection).await;
        if weeks.is_empty() {
            return CommandResult::error("This plan has no weeks yet.");
        }

        let today = Local::now().date_naive();
        CommandResult::success(render::weeks(&selection.plan, &weeks, today, selection.user.week))
    }

    async fn handle_week(&self, user_id: i64, number: usize) -> CommandResult {
        let selection = match self.selection(user_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        let Some(week) = self
            .context
            .plans
            .get_week_routine(&selection.table_id, &selection.plan, number)
            .await
        else {
            let count = self
                .context
                .plans
                .get_week_number(&selection.table_id, &selection.plan)
                .await;
            return CommandResult::error(&format!("Week {number} doesn't exist. The plan has {count} weeks."));
        };

        self.update_user(user_id, |u| {
            u.week = Some(number);
            u.workout = None;
        })
        .await;

        CommandResult::success(render::week(&week))
    }

    async fn handle_workout(&self, user_id: i64, number: Option<usize>) -> CommandResult {
        let selection = match self.selection(user_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        let Some(week_number) = selection.user.week else {
            return CommandResult::error("Select a week first with /weeks or /today.");
        };
        let Some(number) = number.or(selection.user.workout) else {
            return CommandResult::error("Choose a workout: /workout <n>");
        };

        let plans = &self.context.plans;
        let week = plans
            .get_week_routine(&selection.table_id, &selection.plan, week_number)
            .await;
        let Some((week, workout)) = week.and_then(|w| w.workout(number).cloned().map(|wo| (w, wo))) else {
            let count = plans
                .get_workout_number(&selection.table_id, &selection.plan, week_number)
                .await;
            return CommandResult::error(&format!(
                "Workout {number} doesn't exist. Week {week_number} has {count} workouts."
            ));
        };

        self.update_user(user_id, |u| u.workout = Some(number)).await;

        let links = self.context.links.read().await;
        CommandResult::success(render::workout(&week, &workout, &links))
    }

    async fn handle_next(&self, user_id: i64) -> CommandResult {
        let selection = match self.selection(user_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        let weeks = self.plan_weeks(&selection).await;
        let next = next_position(&weeks, selection.user.week, selection.user.workout);
        let Some((week, workout)) = next.and_then(|(w, wo)| {
            let week = weeks.get(w - 1)?;
            Some((week, week.workout(wo)?))
        }) else {
            return CommandResult::text("That was the last workout of this plan. Pick a new one with /plans.");
        };

        self.update_user(user_id, |u| {
            u.week = Some(week.number);
            u.workout = Some(workout.actual_number);
        })
        .await;

        let links = self.context.links.read().await;
        CommandResult::success(render::workout(week, workout, &links))
    }

    async fn handle_today(&self, user_id: i64) -> CommandResult {
        let selection = match self.selection(user_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        let today = Local::now().date_naive();
        let Some(week) = self
            .context
            .plans
            .current_week(&selection.table_id, &selection.plan, today)
            .await
        else {
            return CommandResult::error(&format!(
                "No week of this plan covers {}. Send /weeks to pick one.",
                today.format("%d.%m.%Y")
            ));
        };

        self.update_user(user_id, |u| {
            u.week = Some(week.number);
            u.workout = None;
        })
        .await;

        CommandResult::success(render::week(&week))
    }

    async fn handle_reload(&self) -> CommandResult {
        match self.context.refresh.refresh_and_wait().await {
            Some(report) => CommandResult {
                success: report.is_success(),
                message: render::report(&report),
            },
            None => CommandResult::error("The refresh scheduler is not running."),
        }
    }

    async fn handle_status(&self) -> CommandResult {
        let tracked = self.context.tables.read().await.len();
        let loaded = self.context.plans.table_ids().await.len();
        let users = self.context.users.read().await.len();
        let links = self.context.links.read().await.len();
        let state = self.context.refresh.state().read().await;

        let last_success = state.last_success_at().map_or_else(
            || "never".to_owned(),
            |at| at.format("%Y-%m-%d %H:%M UTC").to_string(),
        );

        let mut lines = vec![
            bold("Status"),
            escape(&format!("Tables: {loaded} loaded of {tracked} tracked")),
            escape(&format!("Users: {users}, exercise links: {links}")),
            escape(&format!("Refresh passes: {}, last clean pass: {last_success}", state.pass_count())),
        ];

        if let Some(report) = state.last_report() {
            lines.push(String::new());
            lines.push(render::report(report));
        }

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_tables(&self) -> CommandResult {
        let tables = self.context.tables.read().await;
        if tables.is_empty() {
            return CommandResult::text("No tables tracked. Add one with /add_table.");
        }

        let mut lines = vec![bold("Tracked tables")];
        for table in &tables.tables {
            let status = match self.context.plans.table_name(&table.table_id).await {
                None => "not loaded".to_owned(),
                Some(name) if name.is_empty() => "loaded".to_owned(),
                Some(name) => name,
            };
            lines.push(escape(&format!(
                "• {} ({status}): {}",
                table.table_id,
                table.pages.join(", ")
            )));
        }

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_users(&self) -> CommandResult {
        let users = self.context.users.read().await;
        if users.is_empty() {
            return CommandResult::text("No users yet.");
        }

        let mut lines = vec![bold("Users")];
        for user in users.users() {
            let role = if self.is_admin(user.id) {
                "admin"
            } else if user.blocked {
                "blocked"
            } else if user.authorized {
                "allowed"
            } else {
                "pending"
            };

            let mut line = format!("• {} {} [{role}]", user.id, user.name.as_deref().unwrap_or("-"));
            if let Some(table_id) = &user.table_id {
                line.push_str(&format!(" table {table_id}"));
            }
            if let Some(plan) = &user.plan {
                line.push_str(&format!(", {plan}"));
            }
            if let Some(week) = user.week {
                line.push_str(&format!(" week {week}"));
            }
            lines.push(escape(&line));
        }

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_links(&self) -> CommandResult {
        let links = self.context.links.read().await;
        if links.is_empty() {
            return CommandResult::text("No exercise videos yet. Add one with /add_link.");
        }

        let mut lines = vec![bold("Exercise videos")];
        lines.extend(
            links
                .iter()
                .map(|(name, url)| format!("• [{}]({})", escape(name), escape_link_url(url))),
        );

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_add_table(&self, args: &str) -> CommandResult {
        let Some(table) = TrackedTable::parse_input(args) else {
            return CommandResult::error("Usage: /add_table <table id or URL> <page>, <page>...");
        };
        let table_id = table.table_id.clone();
        let pages = table.pages.join(", ");

        {
            let mut tables = self.context.tables.write().await;
            if let Err(e) = tables.add_table(table) {
                return CommandResult::error(&e.to_string());
            }

            if let Err(e) = tables.save_to_file(&self.context.tables_path) {
                tables.remove_table(&table_id); // Rollback
                warn!("Failed to save tables: {}", e);
                return CommandResult::error(&format!("Failed to save: {e}"));
            }
        }

        info!("Table {} added with pages: {}", table_id, pages);
        self.context.refresh.request_refresh().await;
        CommandResult::text(&format!("✓ Tracking {table_id} ({pages}). Loading it now."))
    }

    async fn handle_remove_table(&self, args: &str) -> CommandResult {
        let table_id = args.trim();

        {
            let mut tables = self.context.tables.write().await;
            let Some(index) = tables.tables.iter().position(|t| t.table_id == table_id) else {
                return CommandResult::error(&format!("Table {table_id} is not tracked."));
            };

            let removed = tables.tables.remove(index);
            if let Err(e) = tables.save_to_file(&self.context.tables_path) {
                tables.tables.insert(index, removed); // Rollback
                warn!("Failed to save tables: {}", e);
                return CommandResult::error(&format!("Failed to save: {e}"));
            }
        }

        self.context.plans.remove_table(table_id).await;

        let detached = {
            let mut users = self.context.users.write().await;
            let detached = users.unassign_table(table_id);
            if detached > 0
                && let Err(e) = users.save()
            {
                warn!("Failed to save users: {}", e);
            }
            detached
        };

        info!("Table {} removed, {} users detached", table_id, detached);
        CommandResult::text(&format!("✓ Stopped tracking {table_id}. {detached} users were unassigned."))
    }

    async fn handle_add_link(&self, args: &str) -> CommandResult {
        let Some((name, url)) = args.trim().rsplit_once(char::is_whitespace) else {
            return CommandResult::error("Usage: /add_link <exercise name> <url>");
        };
        let (name, url) = (name.trim(), url.trim());

        if name.is_empty() || !is_valid_url(url) {
            return CommandResult::error("Usage: /add_link <exercise name> <url> (the URL must start with http:// or https://)");
        }

        let mut links = self.context.links.write().await;
        let previous = links.insert(name, url);

        if let Err(e) = links.save() {
            // Rollback
            match previous {
                Some(old) => links.insert(name, &old),
                None => links.remove(name),
            };
            warn!("Failed to save links: {}", e);
            return CommandResult::error(&format!("Failed to save: {e}"));
        }

        let verb = if previous.is_some() { "Updated" } else { "Added" };
        CommandResult::text(&format!("✓ {verb} video for {name}."))
    }

    async fn handle_remove_link(&self, args: &str) -> CommandResult {
        let name = args.trim();
        let mut links = self.context.links.write().await;

        let Some(removed) = links.remove(name) else {
            return CommandResult::error(&format!("No video is linked to {name}."));
        };

        if let Err(e) = links.save() {
            links.insert(name, &removed); // Rollback
            warn!("Failed to save links: {}", e);
            return CommandResult::error(&format!("Failed to save: {e}"));
        }

        CommandResult::text(&format!("✓ Removed video for {name}."))
    }

    async fn handle_allow(&self, args: &str) -> CommandResult {
        let target = match parse_user_id(args) {
            Ok(id) => id,
            Err(e) => return e,
        };

        let mut users = self.context.users.write().await;
        if !users.authorize(target) {
            return CommandResult::text(&format!("User {target} already has access."));
        }
        if let Err(e) = users.save() {
            warn!("Failed to save users: {}", e);
            return CommandResult::error(&format!("Access granted but not saved: {e}"));
        }

        info!("User {} allowed", target);
        CommandResult::text(&format!("✓ User {target} can now use the bot."))
    }

    async fn handle_block(&self, args: &str) -> CommandResult {
        let target = match parse_user_id(args) {
            Ok(id) => id,
            Err(e) => return e,
        };
        if self.is_admin(target) {
            return CommandResult::error("Admins cannot be blocked.");
        }

        self.set_blocked(target, true).await
    }

    async fn handle_unblock(&self, args: &str) -> CommandResult {
        match parse_user_id(args) {
            Ok(target) => self.set_blocked(target, false).await,
            Err(e) => e,
        }
    }

    async fn set_blocked(&self, target: i64, blocked: bool) -> CommandResult {
        let verb = if blocked { "blocked" } else { "unblocked" };

        let mut users = self.context.users.write().await;
        if !users.set_blocked(target, blocked) {
            return CommandResult::text(&format!("User {target} is already {verb}."));
        }
        if let Err(e) = users.save() {
            warn!("Failed to save users: {}", e);
            return CommandResult::error(&format!("User {verb} but not saved: {e}"));
        }

        info!("User {} {}", target, verb);
        CommandResult::text(&format!("✓ User {target} {verb}."))
    }

    async fn handle_assign(&self, args: &str) -> CommandResult {
        let mut parts = args.split_whitespace();
        let (Some(user_arg), Some(table_id), None) = (parts.next(), parts.next(), parts.next()) else {
            return CommandResult::error("Usage: /assign <user id> <table id>");
        };
        let target = match parse_user_id(user_arg) {
            Ok(id) => id,
            Err(e) => return e,
        };

        if !self.context.tables.read().await.contains(table_id) {
            return CommandResult::error(&format!("Table {table_id} is not tracked. Add it with /add_table first."));
        }

        let mut users = self.context.users.write().await;
        users.assign_table(target, table_id);
        let has_access = users.get(target).is_some_and(UserRecord::has_access);
        if let Err(e) = users.save() {
            warn!("Failed to save users: {}", e);
            return CommandResult::error(&format!("Assigned but not saved: {e}"));
        }

        info!("User {} assigned to table {}", target, table_id);
        let note = if has_access { "" } else { " They still need /allow to use it." };
        CommandResult::text(&format!("✓ User {target} now follows table {table_id}.{note}"))
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("admin_ids", &self.admin_ids)
            .finish_non_exhaustive()
    }
}

fn parse_user_id(text: &str) -> Result<i64, CommandResult> {
    let text = text.trim();
    text.parse()
        .map_err(|_| CommandResult::error(&format!("{text:?} is not a Telegram user id.")))
}

/// Matches a plan by exact name, case-insensitive name, or 1-based index.
fn find_plan<'a>(names: &'a [String], query: &str) -> Option<&'a String> {
    let query = query.trim();
    let lowered = query.to_lowercase();

    names
        .iter()
        .find(|n| *n == query)
        .or_else(|| names.iter().find(|n| n.to_lowercase() == lowered))
        .or_else(|| {
            query
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| names.get(i))
        })
}

/// Returns the 1-based `(week, workout)` after the given position.
///
/// Rolls over into the following week (skipping empty ones) and returns
/// `None` past the end of the plan.
fn next_position(weeks: &[WeekRoutine], week: Option<usize>, workout: Option<usize>) -> Option<(usize, usize)> {
    let (mut week, mut workout) = match week {
        Some(week) => (week.max(1), workout.unwrap_or(0) + 1),
        None => (1, 1),
    };

    while let Some(routine) = weeks.get(week - 1) {
        if workout <= routine.workouts.len() {
            return Some((week, workout));
        }
        week += 1;
        workout = 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use super::*;
    use crate::plan::{Exercise, Set, Workout, WorkoutTable};
    use crate::scheduler::{RefreshMessage, RefreshReport, RefreshState};

    const ADMIN: i64 = 1;
    const ATHLETE: i64 = 5;

    fn workout(actual_number: usize, number: u32, exercise: &str) -> Workout {
        Workout {
            description: String::new(),
            sets: vec![Set {
                description: String::new(),
                number: 1,
                exercises: vec![Exercise::new(exercise, "5", None)],
                rounds: "3".to_owned(),
                marked: true,
            }],
            actual_number,
            number,
        }
    }

    fn routine(number: usize, start: NaiveDate, workouts: Vec<Workout>) -> WeekRoutine {
        WeekRoutine {
            start_date: start,
            end_date: start + Days::new(6),
            number,
            workouts,
            comment: String::new(),
        }
    }

    fn sample_table() -> WorkoutTable {
        let start = NaiveDate::from_ymd_opt(2022, 7, 4).unwrap();
        let today = Local::now().date_naive();

        let mut table = WorkoutTable::new("T", "Coach table");
        table.insert_page(
            "Strength",
            vec![
                routine(1, start, vec![workout(1, 1, "Squat"), workout(2, 0, "Stretch")]),
                routine(2, start + Days::new(7), vec![]),
                routine(3, start + Days::new(14), vec![workout(1, 2, "Deadlift")]),
            ],
        );
        table.insert_page(
            "Current",
            vec![routine(1, today - Days::new(1), vec![workout(1, 1, "Row")])],
        );
        table
    }

    struct Fixture {
        _dir: TempDir,
        handler: CommandHandler,
        context: BotContext,
        refresh_rx: mpsc::Receiver<RefreshMessage>,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let plans = WorkoutPlans::new();
        plans.update_workout_table(sample_table()).await;

        let (tx, refresh_rx) = mpsc::channel(8);
        let context = BotContext {
            plans,
            tables: Arc::new(RwLock::new(TrackedTables {
                tables: vec![TrackedTable::new("T", vec!["Strength".to_owned(), "Current".to_owned()])],
            })),
            tables_path: dir.path().join("tables.json"),
            users: Arc::new(RwLock::new(UserStore::load(dir.path().join("users.json")).unwrap())),
            links: Arc::new(RwLock::new(ExerciseLinks::load(dir.path().join("links.json")).unwrap())),
            refresh: RefreshHandle::new(tx, Arc::new(RwLock::new(RefreshState::new()))),
        };

        Fixture {
            _dir: dir,
            handler: CommandHandler::new(vec![ADMIN], context.clone()),
            context,
            refresh_rx,
        }
    }

    fn user(id: i64) -> ChatUser {
        ChatUser::new(id, Some(format!("user{id}")))
    }

    impl Fixture {
        async fn send(&self, id: i64, text: &str) -> CommandResult {
            self.handler.handle(&user(id), text).await
        }

        /// Allows the athlete, assigns table T and selects a plan.
        async fn onboard(&self, plan: &str) {
            assert!(self.send(ADMIN, &format!("/allow {ATHLETE}")).await.success);
            assert!(self.send(ADMIN, &format!("/assign {ATHLETE} T")).await.success);
            assert!(self.send(ATHLETE, &format!("/plan {plan}")).await.success);
        }
    }

    #[tokio::test]
    async fn test_new_user_needs_access() {
        let f = fixture().await;

        let start = f.send(ATHLETE, "/start").await;
        assert!(start.success);
        assert!(start.message.contains("Your Telegram id is 5"));

        let plans = f.send(ATHLETE, "/plans").await;
        assert!(!plans.success);
        assert!(plans.message.contains("/allow 5"));

        let users = f.context.users.read().await;
        assert_eq!(users.get(ATHLETE).unwrap().name.as_deref(), Some("user5"));
    }

    #[tokio::test]
    async fn test_admin_is_authorized_and_guarded() {
        let f = fixture().await;
        assert!(f.send(ADMIN, "/status").await.success);
        assert!(f.context.users.read().await.get(ADMIN).unwrap().has_access());

        f.send(ADMIN, &format!("/allow {ATHLETE}")).await;
        let denied = f.send(ATHLETE, "/users").await;
        assert!(!denied.success);
        assert!(denied.message.contains("only available to admins"));
    }

    #[tokio::test]
    async fn test_plan_navigation() {
        let f = fixture().await;
        f.onboard("strength").await;

        let plans = f.send(ATHLETE, "/plans").await;
        assert!(plans.message.contains("▶ 2\\. Strength"));

        let week = f.send(ATHLETE, "/week 1").await;
        assert!(week.message.contains("2\\. Homework"));

        let workout = f.send(ATHLETE, "/workout 2").await;
        assert!(workout.success);
        assert!(workout.message.contains("Stretch"));

        let missing = f.send(ATHLETE, "/workout 3").await;
        assert!(!missing.success);
        assert!(missing.message.contains("Week 1 has 2 workouts"));

        assert!(!f.send(ATHLETE, "/week 9").await.success);

        let malformed = f.send(ATHLETE, "/week abc").await;
        assert!(!malformed.success);
        assert!(malformed.message.contains("Usage: /week <n>"));
    }

    #[tokio::test]
    async fn test_next_rolls_over_weeks() {
        let f = fixture().await;
        f.onboard("Strength").await;

        assert!(f.send(ATHLETE, "/next").await.message.contains("Squat"));
        assert!(f.send(ATHLETE, "/next").await.message.contains("Stretch"));

        // Week 2 is empty, so the pointer moves on to week 3.
        let third = f.send(ATHLETE, "/next").await;
        assert!(third.message.contains("Deadlift"));
        assert!(third.message.contains("Week 3"));

        let end = f.send(ATHLETE, "/next").await;
        assert!(end.message.contains("last workout"));

        let users = f.context.users.read().await;
        let athlete = users.get(ATHLETE).unwrap();
        assert_eq!((athlete.week, athlete.workout), (Some(3), Some(1)));
    }

    #[tokio::test]
    async fn test_plan_selection_starts_at_current_week() {
        let f = fixture().await;
        f.onboard("2").await;

        let users = f.context.users.read().await;
        assert_eq!(users.get(ATHLETE).unwrap().plan.as_deref(), Some("Strength"));
        drop(users);

        assert!(f.send(ATHLETE, "/plan Current").await.success);
        assert_eq!(f.context.users.read().await.get(ATHLETE).unwrap().week, Some(1));

        let today = f.send(ATHLETE, "/today").await;
        assert!(today.success);
        assert!(today.message.contains("Workout 1"));
    }

    #[tokio::test]
    async fn test_today_outside_plan() {
        let f = fixture().await;
        f.onboard("Strength").await;
        assert!(!f.send(ATHLETE, "/today").await.success);
    }

    #[tokio::test]
    async fn test_pending_admin_input() {
        let f = fixture().await;
        f.send(ATHLETE, "/start").await;

        let prompt = f.send(ADMIN, "/block").await;
        assert!(prompt.message.contains("Telegram id"));

        let done = f.send(ADMIN, &ATHLETE.to_string()).await;
        assert!(done.success, "{}", done.message);

        let blocked = f.send(ATHLETE, "/plans").await;
        assert!(blocked.message.contains("blocked"));

        f.send(ADMIN, "/unblock").await;
        assert!(f.send(ADMIN, "/cancel").await.message.contains("Cancelled"));
        assert!(f.send(ADMIN, "hello").await.message.contains("/help"));
    }

    #[tokio::test]
    async fn test_admins_cannot_be_blocked() {
        let f = fixture().await;
        let result = f.send(ADMIN, &format!("/block {ADMIN}")).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_add_table_saves_and_refreshes() {
        let mut f = fixture().await;

        let result = f.send(ADMIN, "/add_table NEW Plan A, Plan B").await;
        assert!(result.success, "{}", result.message);

        let saved = TrackedTables::load_from_file(&f.context.tables_path).unwrap();
        assert_eq!(saved.get("NEW").unwrap().pages, vec!["Plan A", "Plan B"]);
        assert!(matches!(
            f.refresh_rx.recv().await,
            Some(RefreshMessage::RefreshNow(None))
        ));

        assert!(!f.send(ADMIN, "/add_table NEW Other").await.success);
        assert!(!f.send(ADMIN, "/add_table lonely").await.success);
    }

    #[tokio::test]
    async fn test_remove_table_detaches_users() {
        let f = fixture().await;
        f.onboard("Strength").await;

        let result = f.send(ADMIN, "/remove_table T").await;
        assert!(result.success);
        assert!(f.context.plans.table("T").await.is_none());
        assert!(f.context.users.read().await.get(ATHLETE).unwrap().table_id.is_none());
        assert!(!f.send(ADMIN, "/remove_table T").await.success);
    }

    #[tokio::test]
    async fn test_exercise_links_render() {
        let f = fixture().await;
        f.onboard("Strength").await;

        assert!(f.send(ADMIN, "/add_link squat https://youtu.be/sq").await.success);
        assert!(!f.send(ADMIN, "/add_link squat youtu.be").await.success);

        let workout = f.send(ATHLETE, "/next").await;
        assert!(workout.message.contains("[Squat](https://youtu.be/sq)"));

        let listed = f.send(ADMIN, "/links").await;
        assert!(listed.message.contains("• [squat](https://youtu.be/sq)"));
        assert!(!f.send(ATHLETE, "/links").await.success);

        assert!(f.send(ADMIN, "/remove_link SQUAT").await.success);
        assert!(!f.send(ADMIN, "/remove_link squat").await.success);
    }

    #[tokio::test]
    async fn test_assign_requires_tracked_table() {
        let f = fixture().await;
        let result = f.send(ADMIN, "/assign 5 nope").await;
        assert!(!result.success);
        assert!(!f.send(ADMIN, "/assign five T").await.success);
    }

    #[tokio::test]
    async fn test_reload_returns_report() {
        let Fixture {
            _dir,
            handler,
            mut refresh_rx,
            ..
        } = fixture().await;

        let responder = tokio::spawn(async move {
            if let Some(RefreshMessage::RefreshNow(Some(reply))) = refresh_rx.recv().await {
                let mut report = RefreshReport::new(chrono::Utc::now());
                report.refreshed_pages = 2;
                let _ = reply.send(report);
            }
        });

        let result = handler.handle(&user(ADMIN), "/reload").await;
        assert!(result.success);
        assert!(result.message.contains("2/2 pages"));
        responder.await.unwrap();
    }

    #[test]
    fn test_find_plan() {
        let names = vec!["Cardio".to_owned(), "Сила".to_owned()];
        assert_eq!(find_plan(&names, "Cardio"), Some(&names[0]));
        assert_eq!(find_plan(&names, "сила"), Some(&names[1]));
        assert_eq!(find_plan(&names, "2"), Some(&names[1]));
        assert!(find_plan(&names, "0").is_none());
        assert!(find_plan(&names, "Yoga").is_none());
    }

    #[test]
    fn test_next_position() {
        let start = NaiveDate::from_ymd_opt(2022, 7, 4).unwrap();
        let weeks = vec![
            routine(1, start, vec![workout(1, 1, "a"), workout(2, 2, "b")]),
            routine(2, start, vec![]),
            routine(3, start, vec![workout(1, 1, "c")]),
        ];

        assert_eq!(next_position(&weeks, None, None), Some((1, 1)));
        assert_eq!(next_position(&weeks, Some(1), None), Some((1, 1)));
        assert_eq!(next_position(&weeks, Some(1), Some(1)), Some((1, 2)));
        assert_eq!(next_position(&weeks, Some(1), Some(2)), Some((3, 1)));
        assert_eq!(next_position(&weeks, Some(3), Some(1)), None);
        assert_eq!(next_position(&[], None, None), None);
    }
}
