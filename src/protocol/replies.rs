//! Text the server writes back to clients
//!
//! Each constant is one wire line; the transport appends the newline.

use crate::store::StoredMessage;

pub const GREETING: [&str; 2] = ["Welcome to the Messaging Server!", "Type: login <username>"];

pub const ERR_EMPTY_USERNAME: &str = "ERROR: empty username";
pub const ERR_USERNAME_TAKEN: &str = "ERROR: username already in use";
pub const ERR_SERVER_FULL: &str = "ERROR: server full";
pub const ERR_SHUTTING_DOWN: &str = "ERROR: server shutting down";

pub const MESSAGE_SENT: &str = "Message sent ✓";
pub const GOODBYE: &str = "Goodbye";
pub const SHUTDOWN_NOTICE: &str = "Server shutting down...";

pub const ERR_UNKNOWN_COMMAND: &str = "ERROR: Unknown command. Type 'help'";
pub const ERR_TARGET_MISSING: &str = "ERROR: target username does not exist";
pub const ERR_SELECT_MISSING: &str = "ERROR: user not connected/known";

pub const SWITCHED_TO_OPEN: &str = "Switched to OPEN_CHAT mode.";
pub const RETURNED_TO_OPEN: &str = "Returned to OPEN_CHAT mode.";
pub const ERR_UNKNOWN_SLASH: &str = "Unknown slash command in closed chat. /help";
pub const BACKSLASH_HINT: &str = "Use /command for commands. To send message, just type it.";

pub const NO_USERS: &str = "(no users)";
pub const NO_MESSAGES: &str = "(no messages)";

pub const MENU_HEADER: &str = "---- Menu: Chat Rooms ----";
pub const MENU_EMPTY: &str = "(no chat rooms)";
pub const MENU_COMMANDS: &str =
    "Commands: select <username>   group <users...>   room   history   back   listusers   help";
pub const ERR_MENU_USER_MISSING: &str = "ERROR: User does not exist.";
pub const ERR_MENU_UNKNOWN: &str = "Unknown command. Type 'help'";

pub const ROOM_ENTERED: [&str; 2] = [
    "[MENU] Entering OPEN CHAT.",
    "Type messages normally. Type /exit to return to menu.",
];
pub const ROOM_LEFT: &str = "[MENU] Returned from Open Chat.";
pub const GROUP_CREATED: [&str; 2] = ["[MENU] Semi-Closed room created.", "Type /exit to leave."];
pub const GROUP_NO_VALID_USERS: &str = "No valid users.";
pub const GROUP_LEFT: &str = "[MENU] Returned from Semi-Closed chat.";

const HELP: [&str; 10] = [
    "Available commands:",
    " - Chat <user> <message>    (open mode)",
    " - getmessages <user>",
    " - deletemessages <user>",
    " - getuserlist",
    " - Menu   (interactive chatrooms)",
    " - select <username>   (enter closed chat)",
    " - open   (go to open mode)",
    " - /help  (in closed mode show this help)",
    " - exit",
];

const CLOSED_HELP: [&str; 2] = [
    "In CLOSED_CHAT: type message directly to send to chat partner.",
    "Use /open or /menu or /exit to leave closed chat.",
];

const MENU_HELP: [&str; 8] = [
    "Chat room menu:",
    " - select <username>   (closed chat with an online user)",
    " - group <u1> <u2> ...   (semi-closed chat, up to the group limit)",
    " - room   (open chat: broadcast to everyone online)",
    " - history   (stored messages for your current chat)",
    " - listusers",
    " - back   (leave the menu)",
    " - help",
];

/// Lines sent right after a successful login
pub fn welcome(username: &str) -> [String; 2] {
    [
        format!("Welcome, {}!", username),
        "Type 'help' for commands.".to_string(),
    ]
}

/// Help text; CLOSED mode adds two lines about direct messaging
pub fn help(in_closed_chat: bool) -> Vec<&'static str> {
    let mut lines = HELP.to_vec();
    if in_closed_chat {
        lines.extend(CLOSED_HELP);
    }
    lines
}

pub fn menu_help() -> &'static [&'static str] {
    &MENU_HELP
}

pub fn entered_closed_chat(partner: &str) -> [String; 2] {
    [
        format!(
            "Entered CLOSED_CHAT with {}. Type messages directly to send.",
            partner
        ),
        "Type /open to return to open chat, /menu to view menu, /exit to quit.".to_string(),
    ]
}

/// Numbered list of past partners shown on entering the browser
pub fn menu_listing(partners: &[String]) -> Vec<String> {
    let mut lines = vec![MENU_HEADER.to_string()];
    if partners.is_empty() {
        lines.push(MENU_EMPTY.to_string());
    } else {
        lines.extend(
            partners
                .iter()
                .enumerate()
                .map(|(i, partner)| format!("{}) Chat with {}", i + 1, partner)),
        );
    }
    lines.push(MENU_COMMANDS.to_string());
    lines
}

/// One line per online user, or a placeholder
pub fn user_list(users: &[String]) -> Vec<String> {
    if users.is_empty() {
        vec![NO_USERS.to_string()]
    } else {
        users.to_vec()
    }
}

/// `getmessages` output: `<time> <sender>-><receiver>: <content>`
pub fn conversation(messages: &[StoredMessage]) -> Vec<String> {
    if messages.is_empty() {
        return vec![NO_MESSAGES.to_string()];
    }
    messages
        .iter()
        .map(|m| {
            format!(
                "{} {}->{}: {}",
                m.formatted_time(),
                m.sender,
                m.receiver,
                m.content
            )
        })
        .collect()
}

/// Browser `history` output: `[<time>] <sender>: <content>`
pub fn history(messages: &[StoredMessage]) -> Vec<String> {
    if messages.is_empty() {
        return vec![NO_MESSAGES.to_string()];
    }
    messages
        .iter()
        .map(|m| format!("[{}] {}: {}", m.formatted_time(), m.sender, m.content))
        .collect()
}

pub fn messages_deleted(count: u64) -> String {
    format!("OK: {} messages deleted", count)
}

pub fn error(detail: impl std::fmt::Display) -> String {
    format!("ERROR: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sender: &str, receiver: &str, content: &str) -> StoredMessage {
        StoredMessage {
            id: 1,
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_help_varies_by_mode() {
        let open = help(false);
        let closed = help(true);
        assert_eq!(open[0], "Available commands:");
        assert_eq!(closed.len(), open.len() + 2);
        assert!(closed.last().unwrap().contains("/open"));
    }

    #[test]
    fn test_menu_listing_numbers_partners() {
        let lines = menu_listing(&["bob".to_string(), "carol".to_string()]);
        assert_eq!(lines[0], MENU_HEADER);
        assert_eq!(lines[1], "1) Chat with bob");
        assert_eq!(lines[2], "2) Chat with carol");
        assert_eq!(lines[3], MENU_COMMANDS);

        assert_eq!(menu_listing(&[])[1], MENU_EMPTY);
    }

    #[test]
    fn test_conversation_formatting() {
        let lines = conversation(&[msg("alice", "bob", "hi")]);
        assert_eq!(lines, vec!["1970-01-01 00:00:00 alice->bob: hi"]);
        assert_eq!(conversation(&[]), vec![NO_MESSAGES]);
    }

    #[test]
    fn test_history_formatting() {
        let lines = history(&[msg("alice", "bob", "hi")]);
        assert_eq!(lines, vec!["[1970-01-01 00:00:00] alice: hi"]);
    }
}
