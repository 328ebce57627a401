//! Line-oriented front end helpers: parse typed lines into commands and
//! render client events as text.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::chat::ChatTarget;
use crate::client::{ClientCommand, ClientEvent};

/// Ids below this are server timestamps in seconds; the rest are local
/// send times in milliseconds.
const MILLIS_THRESHOLD: u64 = 100_000_000_000;

/// Help text for `/help`.
pub const HELP: &str = "\
commands:
  <text>                      send to the active conversation
  /rooms                      refresh the room list
  /users                      refresh the online users
  /join <room-id> [password]  join a room and make it active
  /dm <user-id>               talk to a user privately
  /create <name> [password]   create a room
  /leave                      deselect the active conversation
  /logout                     end the session and forget it
  /quit                       exit, keeping the session";

/// What a typed line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the session task.
    Command(ClientCommand),
    /// Print [`HELP`].
    Help,
    /// Blank line.
    Nothing,
    /// Unusable input, with the reason.
    Invalid(String),
}

/// Parse one typed line.
#[must_use]
pub fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Nothing;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Input::Command(ClientCommand::SendText(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let first = words.next();
    let second = words.next().map(str::to_string);

    let command = match (verb, first) {
        ("rooms", _) => ClientCommand::RefreshRooms,
        ("users", _) => ClientCommand::RefreshUsers,
        ("leave", _) => ClientCommand::ClearTarget,
        ("logout", _) => ClientCommand::Logout,
        ("quit" | "exit", _) => ClientCommand::Shutdown,
        ("help", _) => return Input::Help,
        ("join", Some(room)) => ClientCommand::SelectTarget {
            target: ChatTarget::room(room, ""),
            password: second,
        },
        ("dm", Some(user)) => ClientCommand::SelectTarget {
            target: ChatTarget::user(user, ""),
            password: None,
        },
        ("create", Some(name)) => ClientCommand::CreateRoom {
            name: name.to_string(),
            password: second.unwrap_or_default(),
        },
        ("join" | "dm" | "create", None) => {
            return Input::Invalid(format!("/{verb} needs an argument"));
        }
        _ => return Input::Invalid(format!("unknown command /{verb}")),
    };
    Input::Command(command)
}

/// Placeholder for ids that cannot be shown as a time.
const UNKNOWN_TIME: &str = "--:--";

/// Whether `format` is a usable strftime pattern.
#[must_use]
pub fn is_valid_timestamp_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Format a message id as a local time.
///
/// Ids outside the representable range, and patterns chrono cannot render,
/// produce a placeholder.
#[must_use]
pub fn format_timestamp(id: i64, format: &str) -> String {
    let parsed = if id.unsigned_abs() < MILLIS_THRESHOLD {
        DateTime::from_timestamp(id, 0)
    } else {
        DateTime::from_timestamp_millis(id)
    };
    let Some(time) = parsed else {
        return UNKNOWN_TIME.to_string();
    };
    let mut out = String::new();
    match write!(out, "{}", time.with_timezone(&Local).format(format)) {
        Ok(()) => out,
        Err(_) => UNKNOWN_TIME.to_string(),
    }
}

/// Render `event` for the terminal. `None` means nothing worth printing.
#[must_use]
pub fn render_event(event: &ClientEvent, timestamp_format: &str) -> Option<String> {
    let text = match event {
        ClientEvent::Connected => "* connected".to_string(),
        ClientEvent::Disconnected => "* disconnected".to_string(),
        ClientEvent::MessageAppended { key, message } => format!(
            "[{}] ({key}) {}: {}",
            format_timestamp(message.id, timestamp_format),
            message.author.name,
            message.content
        ),
        ClientEvent::UnreadChanged(peers) if peers.is_empty() => return None,
        ClientEvent::UnreadChanged(peers) => format!("* unread from: {}", peers.join(", ")),
        ClientEvent::RoomsUpdated(rooms) if rooms.is_empty() => "* no rooms".to_string(),
        ClientEvent::RoomsUpdated(rooms) => {
            let lines: Vec<String> = rooms
                .iter()
                .map(|r| {
                    let lock = if r.has_password { " [locked]" } else { "" };
                    format!("  {} {} ({} online){lock}", r.id, r.name, r.count)
                })
                .collect();
            format!("* rooms:\n{}", lines.join("\n"))
        }
        ClientEvent::UsersUpdated(users) if users.is_empty() => "* nobody else online".to_string(),
        ClientEvent::UsersUpdated(users) => {
            let names: Vec<String> = users.iter().map(|u| format!("{} ({})", u.name, u.id)).collect();
            format!("* online: {}", names.join(", "))
        }
        ClientEvent::RoomDetailUpdated(detail) => {
            let names: Vec<&str> = detail.users.iter().map(|u| u.name.as_str()).collect();
            format!("* members of {}: {}", detail.name, names.join(", "))
        }
        ClientEvent::TargetChanged(Some(ChatTarget::Room { name, .. })) => {
            format!("* now in room {name}")
        }
        ClientEvent::TargetChanged(Some(ChatTarget::User { name, .. })) => {
            format!("* now talking to {name}")
        }
        ClientEvent::TargetChanged(None) => "* no active conversation".to_string(),
        ClientEvent::Error(reason) => format!("! {reason}"),
        ClientEvent::LoggedOut => "* logged out".to_string(),
    };
    Some(text)
}
