//! Bridge between console input lines and the member list view-model.

use std::{collections::HashSet, fmt::Write as _, sync::Arc};

use roster_core::{
    AppIcon, EngineNotification, ExecutionContext, GroupMembersViewModel, MemberIdentity,
    MemberListSnapshot, MemberSource, NotificationBus, SettingsService, SnapshotCallback,
    SourceSubscription, TaskRunner,
};
use tracing::{debug, info, warn};

use crate::{
    config::{ConsoleConfig, parse_identity_list},
    member_file::FileMemberSource,
};

const HELP_TEXT: &str = "\
commands:
  <text>               filter members (empty line clears the filter)
  /toggle <hex>        flip selection of one member
  /select <hex>...     select exactly these members
  /preselect <hex>...  add these members to the selection
  /reload              simulate a membership change notification
  /settings            show settings
  /icon <variant>      change the app icon (default, dark, mono, classic)
  /help                show this text
  /quit                exit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Filter(String),
    Toggle(MemberIdentity),
    Select(HashSet<MemberIdentity>),
    Preselect(HashSet<MemberIdentity>),
    Reload,
    ShowSettings,
    SetIcon(AppIcon),
    Help,
    Quit,
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Message(String),
    Quit,
}

/// Parse one input line. Lines not starting with `/` are filter text.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let Some(command) = line.trim_start().strip_prefix('/') else {
        return Ok(ConsoleCommand::Filter(line.to_owned()));
    };

    let (name, args) = command
        .split_once(char::is_whitespace)
        .map(|(name, args)| (name, args.trim()))
        .unwrap_or((command.trim(), ""));

    match name {
        "toggle" if args.is_empty() => Err("usage: /toggle <hex>".to_owned()),
        "toggle" => MemberIdentity::from_hex(args)
            .map(ConsoleCommand::Toggle)
            .map_err(|err| format!("invalid identity '{args}': {err}")),
        "select" => parse_identity_list("select", args)
            .map(ConsoleCommand::Select)
            .map_err(|err| err.to_string()),
        "preselect" => parse_identity_list("preselect", args)
            .map(ConsoleCommand::Preselect)
            .map_err(|err| err.to_string()),
        "reload" => Ok(ConsoleCommand::Reload),
        "settings" => Ok(ConsoleCommand::ShowSettings),
        "icon" => args
            .parse::<AppIcon>()
            .map(ConsoleCommand::SetIcon)
            .map_err(|err| err.to_string()),
        "help" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(format!("unknown command '/{other}' (try /help)")),
    }
}

/// Owns the view-model, the notification bus and the settings for one session.
pub struct ConsoleBridge {
    view_model: GroupMembersViewModel,
    bus: NotificationBus,
    settings: Arc<dyn SettingsService>,
    group_id: String,
    subscription: SourceSubscription,
}

impl ConsoleBridge {
    /// Build the view-model, attach it to the roster file and load it once.
    pub fn start(
        config: &ConsoleConfig,
        runner: TaskRunner,
        context: Arc<dyn ExecutionContext>,
        ui_update: SnapshotCallback,
        settings: Arc<dyn SettingsService>,
    ) -> Self {
        info!(
            roster_file = %config.roster_file.display(),
            group_id = %config.group_id,
            can_remove = config.can_remove,
            "starting console bridge"
        );

        let bus = NotificationBus::default();
        let source: Arc<dyn MemberSource> = Arc::new(FileMemberSource::new(&config.roster_file));
        let view_model = GroupMembersViewModel::new(
            runner,
            context,
            ui_update,
            config.own_identity.clone(),
            config.can_remove,
        );
        let subscription =
            view_model.attach(&bus, Arc::clone(&source), config.group_id.clone());

        if let Err(err) = view_model.reload(source.as_ref(), &config.group_id) {
            warn!(error = %err, "initial roster load failed; starting empty");
        }
        if !config.preselect.is_empty() {
            debug!(count = config.preselect.len(), "applying preselection");
            view_model.preselect(&config.preselect);
        }

        Self {
            view_model,
            bus,
            settings,
            group_id: config.group_id.clone(),
            subscription,
        }
    }

    pub fn view_model(&self) -> &GroupMembersViewModel {
        &self.view_model
    }

    /// Apply one command.
    pub fn handle_command(&self, command: ConsoleCommand) -> CommandOutcome {
        debug!(?command, "handling console command");
        match command {
            ConsoleCommand::Filter(text) => {
                self.view_model.set_search_filter(&text);
                CommandOutcome::Continue
            }
            ConsoleCommand::Toggle(identity) => {
                match self.view_model.toggle_member_selection(&identity) {
                    Some(_) => CommandOutcome::Continue,
                    None => CommandOutcome::Message(format!("no member with identity {identity}")),
                }
            }
            ConsoleCommand::Select(identities) => {
                self.view_model.set_selected_members(&identities, false);
                CommandOutcome::Continue
            }
            ConsoleCommand::Preselect(identities) => {
                self.view_model.preselect(&identities);
                CommandOutcome::Continue
            }
            ConsoleCommand::Reload => {
                let delivered = self.bus.publish(EngineNotification::GroupMembersChanged {
                    group_id: self.group_id.clone(),
                });
                debug!(delivered, "membership change published");
                CommandOutcome::Continue
            }
            ConsoleCommand::ShowSettings => {
                CommandOutcome::Message(render_settings(self.settings.as_ref()))
            }
            ConsoleCommand::SetIcon(icon) => match self.settings.set_app_icon(icon) {
                Ok(()) => CommandOutcome::Message(format!("app icon set to {}", icon.as_str())),
                Err(err) => {
                    warn!(error = %err, "failed saving app icon");
                    CommandOutcome::Message(format!("could not save app icon: {}", err.message))
                }
            },
            ConsoleCommand::Help => CommandOutcome::Message(HELP_TEXT.to_owned()),
            ConsoleCommand::Quit => CommandOutcome::Quit,
        }
    }

    /// Unregister notification handlers.
    pub fn shutdown(self) {
        let removed = self.subscription.detach(&self.bus);
        debug!(removed, "console bridge stopped");
    }
}

/// Render a snapshot as console text.
pub fn render_snapshot(snapshot: &MemberListSnapshot) -> String {
    let mut out = String::new();
    let filter = snapshot.filter.trim();
    let _ = write!(
        out,
        "-- {}/{} members",
        snapshot.visible.len(),
        snapshot.total
    );
    if !filter.is_empty() {
        let _ = write!(out, " matching \"{filter}\"");
    }
    let _ = write!(out, ", {} selected", snapshot.selected.len());

    for member in &snapshot.visible {
        let mark = if member.selected { "[x]" } else { "[ ]" };
        let mut tags = Vec::new();
        if member.is_you {
            tags.push("you");
        }
        if member.admin {
            tags.push("admin");
        }
        if member.pending {
            tags.push("pending");
        }
        if member.removable {
            tags.push("removable");
        }
        let _ = write!(out, "\n{mark} {} <{}>", member.display_name(), member.identity);
        if !tags.is_empty() {
            let _ = write!(out, " ({})", tags.join(", "));
        }
    }
    out
}

fn render_settings(settings: &dyn SettingsService) -> String {
    let custom_osm = settings
        .custom_osm_server_url()
        .unwrap_or_else(|| "-".to_owned());
    format!(
        "automatic backups: {}\n\
         backup reminder: every {} days\n\
         location: {} (share {} ms, every {} ms, custom server {})\n\
         webclient: keep screen on {}, browser notifications {}\n\
         app icon: {}\n\
         sort contacts by last name: {}",
        settings.automatic_backups_enabled(),
        settings.backup_reminder_interval_days(),
        settings.location_integration().as_str(),
        settings.location_share_duration_ms(),
        settings.location_share_interval_ms(),
        custom_osm,
        settings.webclient_keep_screen_on(),
        settings.webclient_notifications_in_browser(),
        settings.app_icon().as_str(),
        settings.contact_sort_by_last_name(),
    )
}
