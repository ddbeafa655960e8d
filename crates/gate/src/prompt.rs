//! User-facing texts and button layouts.

use {
    joingate_channels::{Button, OutgoingMessage, Sender, keyboard},
    joingate_store::SubscriptionConfig,
};

use crate::{
    broadcast::BroadcastSummary,
    callback::CallbackAction,
    policy::{MissingChannel, Scope},
};

/// Buttons per keyboard row in join prompts.
const BUTTONS_PER_ROW: usize = 2;

/// Join prompt listing the channels `sender` still has to join.
///
/// Group prompts carry a confirm button whose press re-checks the group scope.
pub fn join_prompt(sender: &Sender, scope: Scope, missing: &[MissingChannel]) -> OutgoingMessage {
    let mut text = format!(
        "Hey {}, you need to join the channel(s) below before {}.",
        sender.display_name,
        match scope {
            Scope::Global => "using this bot",
            Scope::Group(_) => "sending messages in this group",
        }
    );
    let unlinked: Vec<String> = missing
        .iter()
        .filter(|m| m.link.is_none())
        .map(MissingChannel::title)
        .collect();
    if !unlinked.is_empty() {
        text.push_str("\n\nAlso required: ");
        text.push_str(&unlinked.join(", "));
    }

    let buttons = missing
        .iter()
        .filter_map(|m| m.link.as_ref())
        .map(|link| Button::url(&link.title, &link.url))
        .collect();
    let mut rows = keyboard::rows(buttons, BUTTONS_PER_ROW);
    if let Scope::Group(group) = scope {
        rows.push(vec![Button::callback(
            "I've joined",
            CallbackAction::Confirm(group).to_string(),
        )]);
    }
    OutgoingMessage::text(text).with_buttons(rows)
}

pub fn start_text(sender: &Sender) -> String {
    format!(
        "Hi {}! I make sure members of a group have joined the channels its admins pick.\n\
         Add me to a group as an admin and use /set to choose the channels. Send /help for all commands.",
        sender.display_name
    )
}

pub const HELP_TEXT: &str = "Group admins:\n\
/set <channel> [channel...] - require up to 4 channels\n\
/fsub [on|off|toggle] - show or switch enforcement\n\
/reset - remove this group's channels\n\n\
Owner:\n\
/stats - registry counts\n\
/broadcast <text> - send to every group and user (or reply to a message to forward it)\n\
/cancel - stop a running broadcast\n\
/ban <user id>, /unban <user id>";

pub const UNAVAILABLE_TEXT: &str =
    "I couldn't check your channel memberships right now. Please try again later.";

pub const BANNED_TEXT: &str = "You are banned from using this bot.";

pub const OWNER_ONLY_TEXT: &str = "This command is only available to the bot owner.";

pub const ADMIN_ONLY_TEXT: &str = "Only group admins can do that.";

pub const GROUP_ONLY_TEXT: &str = "This command only works in groups.";

/// Status of a group's enforcement with on/off buttons.
pub fn fsub_status(group: i64, config: Option<&SubscriptionConfig>) -> OutgoingMessage {
    let Some(config) = config.filter(|c| !c.channels.is_empty()) else {
        return OutgoingMessage::text("No channels are configured. Use /set to add some.");
    };
    let titles: Vec<String> = config
        .channels
        .iter()
        .map(|c| format!("- {}", c.display_title()))
        .collect();
    let state = if config.enabled { "on" } else { "off" };
    OutgoingMessage::text(format!(
        "Force-subscribe is {state} for:\n{}",
        titles.join("\n")
    ))
    .with_buttons(vec![vec![
        Button::callback(
            "On",
            CallbackAction::SetEnabled {
                group,
                enabled: true,
            }
            .to_string(),
        ),
        Button::callback(
            "Off",
            CallbackAction::SetEnabled {
                group,
                enabled: false,
            }
            .to_string(),
        ),
    ]])
}

pub fn broadcast_report(summary: &BroadcastSummary) -> String {
    let headline = if summary.cancelled {
        "Broadcast cancelled."
    } else {
        "Broadcast finished."
    };
    format!(
        "{headline}\nGroups: {}\nUsers: {}\nPinned: {}\nFailed: {}",
        summary.groups_sent, summary.users_sent, summary.pinned, summary.failed
    )
}
