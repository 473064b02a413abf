//! Parsing of client input lines into commands
//!
//! Every line is trimmed before it gets here. Command words compare
//! case-insensitively; usernames and message text are kept verbatim.

/// Split off the first whitespace-delimited word; the rest is trimmed
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.find(char::is_whitespace) {
        Some(at) => (&input[..at], input[at..].trim()),
        None => (input, ""),
    }
}

/// First word of `rest`, or `None` if there is none
fn first_arg(rest: &str) -> Option<&str> {
    let (arg, _) = split_word(rest);
    (!arg.is_empty()).then_some(arg)
}

/// Username from the first line of a connection: `login <name>` or a bare
/// name, cut to `max_len` characters
pub fn parse_login(line: &str, max_len: usize) -> String {
    let line = line.trim();
    let name = line.strip_prefix("login ").unwrap_or(line);
    let truncated: String = name.chars().take(max_len).collect();
    truncated.trim().to_string()
}

/// Commands understood in OPEN mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenCommand<'a> {
    /// `Chat <user> <text>`
    Chat { target: &'a str, text: &'a str },
    /// `select <user>`
    Select(&'a str),
    /// `Menu`
    Menu,
    /// `getmessages <user>`
    GetMessages(&'a str),
    /// `deletemessages <user>`
    DeleteMessages(&'a str),
    /// `getuserlist`
    GetUserList,
    /// `open`
    Open,
    /// `help`
    Help,
    /// `exit`
    Exit,
    /// Known command with a missing argument
    Usage(&'static str),
    /// Anything else
    Unknown,
}

impl<'a> OpenCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let (word, rest) = split_word(line);

        if word.eq_ignore_ascii_case("chat") {
            let (target, text) = split_word(rest);
            if target.is_empty() || text.is_empty() {
                return OpenCommand::Usage("usage: Chat <user> <message>");
            }
            OpenCommand::Chat { target, text }
        } else if word.eq_ignore_ascii_case("select") {
            first_arg(rest).map_or(OpenCommand::Usage("usage select <username>"), OpenCommand::Select)
        } else if word.eq_ignore_ascii_case("getmessages") {
            first_arg(rest).map_or(
                OpenCommand::Usage("usage getmessages <user>"),
                OpenCommand::GetMessages,
            )
        } else if word.eq_ignore_ascii_case("deletemessages") {
            first_arg(rest).map_or(
                OpenCommand::Usage("usage deletemessages <user>"),
                OpenCommand::DeleteMessages,
            )
        } else if word.eq_ignore_ascii_case("getuserlist") {
            OpenCommand::GetUserList
        } else if word.eq_ignore_ascii_case("menu") {
            OpenCommand::Menu
        } else if word.eq_ignore_ascii_case("open") {
            OpenCommand::Open
        } else if word.eq_ignore_ascii_case("help") {
            OpenCommand::Help
        } else if word.eq_ignore_ascii_case("exit") {
            OpenCommand::Exit
        } else {
            OpenCommand::Unknown
        }
    }
}

/// Slash commands available while in CLOSED mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    Open,
    Menu,
    Exit,
    Help,
    Users,
    Unknown,
}

impl SlashCommand {
    /// Parse the text after the leading `/`
    fn parse(body: &str) -> Self {
        let (word, _) = split_word(body);
        match word.to_ascii_lowercase().as_str() {
            "open" => SlashCommand::Open,
            "menu" => SlashCommand::Menu,
            "exit" => SlashCommand::Exit,
            "help" => SlashCommand::Help,
            "users" => SlashCommand::Users,
            _ => SlashCommand::Unknown,
        }
    }
}

/// How a line typed in CLOSED mode is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedInput<'a> {
    /// `/command`
    Slash(SlashCommand),
    /// `\anything`: a mistyped command prefix
    Backslash,
    /// The whole line is a message for the partner
    Text(&'a str),
}

impl<'a> ClosedInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        if let Some(body) = line.strip_prefix('/') {
            ClosedInput::Slash(SlashCommand::parse(body))
        } else if line.starts_with('\\') {
            ClosedInput::Backslash
        } else {
            ClosedInput::Text(line)
        }
    }
}

/// `/exit` leaves the group chat and the broadcast room; every other line is
/// chat text there
pub fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("/exit")
}

/// Commands understood inside the chatroom browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand<'a> {
    /// `select <user>`: closed chat with a user
    Select(&'a str),
    /// `group <user> [<user> ...]`: semi-closed chat
    Group(Vec<&'a str>),
    /// `room`: broadcast room
    Room,
    /// `history`: stored messages for the current mode
    History,
    /// `listusers`
    ListUsers,
    /// `help`
    Help,
    /// `back`
    Back,
    Usage(&'static str),
    Unknown,
}

impl<'a> BrowserCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let (word, rest) = split_word(line);

        match word.to_ascii_lowercase().as_str() {
            "select" => first_arg(rest)
                .map_or(BrowserCommand::Usage("usage select <username>"), BrowserCommand::Select),
            "group" => {
                let members: Vec<&str> = rest.split_whitespace().collect();
                if members.is_empty() {
                    BrowserCommand::Usage("usage group <user> [<user> ...]")
                } else {
                    BrowserCommand::Group(members)
                }
            }
            "room" => BrowserCommand::Room,
            "history" => BrowserCommand::History,
            "listusers" => BrowserCommand::ListUsers,
            "help" => BrowserCommand::Help,
            "back" => BrowserCommand::Back,
            _ => BrowserCommand::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login() {
        assert_eq!(parse_login("login Alice\r", 31), "Alice");
        assert_eq!(parse_login("  Bob  ", 31), "Bob");
        assert_eq!(parse_login(" \t ", 31), "");
        assert_eq!(parse_login("login  Carol", 31), "Carol");
        assert_eq!(parse_login("", 31), "");
        assert_eq!(parse_login("login abcdefgh", 4), "abcd");
        assert_eq!(parse_login("ab cdef", 3), "ab");
    }

    #[test]
    fn test_chat_keeps_full_message() {
        assert_eq!(
            OpenCommand::parse("Chat Bob hello there  friend"),
            OpenCommand::Chat {
                target: "Bob",
                text: "hello there  friend"
            }
        );
        assert_eq!(
            OpenCommand::parse("CHAT   Bob    hi  "),
            OpenCommand::Chat {
                target: "Bob",
                text: "hi"
            }
        );
    }

    #[test]
    fn test_missing_arguments_report_usage() {
        assert!(matches!(OpenCommand::parse("Chat"), OpenCommand::Usage(_)));
        assert!(matches!(OpenCommand::parse("Chat Bob"), OpenCommand::Usage(_)));
        assert!(matches!(OpenCommand::parse("select"), OpenCommand::Usage(_)));
        assert!(matches!(OpenCommand::parse("getmessages "), OpenCommand::Usage(_)));
        assert!(matches!(OpenCommand::parse("deletemessages"), OpenCommand::Usage(_)));
    }

    #[test]
    fn test_bare_words_ignore_case_but_names_do_not() {
        assert_eq!(OpenCommand::parse("SELECT Bob"), OpenCommand::Select("Bob"));
        assert_eq!(OpenCommand::parse("select bob"), OpenCommand::Select("bob"));
        assert_eq!(OpenCommand::parse("menu"), OpenCommand::Menu);
        assert_eq!(OpenCommand::parse("Menu"), OpenCommand::Menu);
        assert_eq!(OpenCommand::parse("GetUserList"), OpenCommand::GetUserList);
        assert_eq!(OpenCommand::parse("EXIT"), OpenCommand::Exit);
        assert_eq!(OpenCommand::parse("getmessages Bob extra"), OpenCommand::GetMessages("Bob"));
        assert_eq!(OpenCommand::parse("dance"), OpenCommand::Unknown);
    }

    #[test]
    fn test_closed_input() {
        assert_eq!(ClosedInput::parse("/open"), ClosedInput::Slash(SlashCommand::Open));
        assert_eq!(ClosedInput::parse("/MENU"), ClosedInput::Slash(SlashCommand::Menu));
        assert_eq!(ClosedInput::parse("/users"), ClosedInput::Slash(SlashCommand::Users));
        assert_eq!(ClosedInput::parse("/nope"), ClosedInput::Slash(SlashCommand::Unknown));
        assert_eq!(ClosedInput::parse("/"), ClosedInput::Slash(SlashCommand::Unknown));
        assert_eq!(ClosedInput::parse("\\open"), ClosedInput::Backslash);
        assert_eq!(ClosedInput::parse("exit"), ClosedInput::Text("exit"));
        assert_eq!(ClosedInput::parse("hi / there"), ClosedInput::Text("hi / there"));
    }

    #[test]
    fn test_browser_commands() {
        assert_eq!(BrowserCommand::parse("select Bob"), BrowserCommand::Select("Bob"));
        assert_eq!(
            BrowserCommand::parse("group Bob  Carol"),
            BrowserCommand::Group(vec!["Bob", "Carol"])
        );
        assert!(matches!(BrowserCommand::parse("group"), BrowserCommand::Usage(_)));
        assert!(matches!(BrowserCommand::parse("select"), BrowserCommand::Usage(_)));
        assert_eq!(BrowserCommand::parse("BACK"), BrowserCommand::Back);
        assert_eq!(BrowserCommand::parse("ListUsers"), BrowserCommand::ListUsers);
        assert_eq!(BrowserCommand::parse("room"), BrowserCommand::Room);
        assert_eq!(BrowserCommand::parse("history"), BrowserCommand::History);
        assert_eq!(BrowserCommand::parse("1"), BrowserCommand::Unknown);
    }

    #[test]
    fn test_is_exit() {
        assert!(is_exit("/exit"));
        assert!(is_exit("/EXIT"));
        assert!(!is_exit("exit"));
        assert!(!is_exit("/exit now"));
    }
}
