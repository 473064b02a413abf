//! Per-connection chat state machine
//!
//! A [`Session`] exists from a successful login until the connection ends.
//! It owns the user's chat mode and which screen their input is aimed at,
//! and turns each input line into registry, router and store calls plus
//! reply lines on the user's own connection.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::command::{ClosedInput, OpenCommand, SlashCommand, is_exit};
use crate::protocol::replies;
use crate::server::router::MessageRouter;
use crate::transport::ClientHandle;

/// Who free text goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMode {
    /// Commands only; messages need an explicit `Chat <user> <text>`
    Open,
    /// Every non-command line goes to `partner`
    Closed { partner: String },
    /// Every line except `/exit` goes to each of `partners`
    SemiClosed { partners: Vec<String> },
}

/// Which part of the interface is reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Screen {
    /// Regular command/message handling for the current [`ChatMode`]
    Chat,
    /// Chatroom browser; `back` returns to `Chat` with the mode unchanged
    Browser,
    /// Broadcast room opened from the browser
    Room,
}

/// Whether the session keeps reading after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// State of one logged-in client
pub struct Session {
    pub(super) username: String,
    pub(super) handle: ClientHandle,
    pub(super) router: MessageRouter,
    pub(super) mode: ChatMode,
    pub(super) screen: Screen,
    pub(super) max_group_size: usize,
}

impl Session {
    pub fn new(
        username: String,
        handle: ClientHandle,
        router: MessageRouter,
        max_group_size: usize,
    ) -> Self {
        Self {
            username,
            handle,
            router,
            mode: ChatMode::Open,
            screen: Screen::Chat,
            max_group_size,
        }
    }

    pub fn mode(&self) -> &ChatMode {
        &self.mode
    }

    pub fn in_browser(&self) -> bool {
        self.screen != Screen::Chat
    }

    /// Welcome banner and help, sent once after login
    pub fn greet(&self) -> Result<()> {
        self.handle.send_lines(replies::welcome(&self.username))?;
        self.send_help()
    }

    /// Process one input line.
    ///
    /// Protocol and storage failures are reported to the client as an
    /// `ERROR:` line and the session continues. Only a failure to write to
    /// the client's own connection is returned.
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        match self.dispatch(line).await {
            Err(e) if !e.is_terminal() => {
                warn!("{}: {}", self.username, e);
                self.reply(replies::error(&e))?;
                Ok(Flow::Continue)
            }
            other => other,
        }
    }

    async fn dispatch(&mut self, line: &str) -> Result<Flow> {
        match self.screen {
            Screen::Browser => self.handle_browser(line).await,
            Screen::Room => self.handle_room(line).await,
            Screen::Chat => match self.mode.clone() {
                ChatMode::Open => self.handle_open(line).await,
                ChatMode::Closed { partner } => self.handle_closed(&partner, line).await,
                ChatMode::SemiClosed { partners } => {
                    self.handle_semi_closed(&partners, line).await
                }
            },
        }
    }

    async fn handle_open(&mut self, line: &str) -> Result<Flow> {
        match OpenCommand::parse(line) {
            OpenCommand::Chat { target, text } => {
                if !self.registry_has(target).await {
                    return self.reply(replies::ERR_TARGET_MISSING);
                }
                self.router.send_private(&self.username, target, text).await?;
                self.reply(replies::MESSAGE_SENT)
            }
            OpenCommand::Select(target) => {
                if !self.registry_has(target).await {
                    return self.reply(replies::ERR_SELECT_MISSING);
                }
                self.enter_closed(target)
            }
            OpenCommand::Menu => self.enter_browser().await,
            OpenCommand::GetMessages(other) => {
                let messages = self.router.store().query_pair(&self.username, other).await?;
                self.reply_lines(replies::conversation(&messages))
            }
            OpenCommand::DeleteMessages(other) => {
                let deleted = self.router.store().delete_pair(&self.username, other).await?;
                info!(
                    "{} deleted {} messages with {}",
                    self.username, deleted, other
                );
                self.reply(replies::messages_deleted(deleted))
            }
            OpenCommand::GetUserList => self.send_user_list().await,
            OpenCommand::Open => self.reply(replies::SWITCHED_TO_OPEN),
            OpenCommand::Help => self.send_help().map(|_| Flow::Continue),
            OpenCommand::Exit => self.goodbye(),
            OpenCommand::Usage(usage) => self.reply(replies::error(usage)),
            OpenCommand::Unknown => self.reply(replies::ERR_UNKNOWN_COMMAND),
        }
    }

    async fn handle_closed(&mut self, partner: &str, line: &str) -> Result<Flow> {
        match ClosedInput::parse(line) {
            ClosedInput::Slash(SlashCommand::Open) => {
                self.mode = ChatMode::Open;
                self.reply(replies::RETURNED_TO_OPEN)
            }
            ClosedInput::Slash(SlashCommand::Menu) => self.enter_browser().await,
            ClosedInput::Slash(SlashCommand::Exit) => self.goodbye(),
            ClosedInput::Slash(SlashCommand::Help) => self.send_help().map(|_| Flow::Continue),
            ClosedInput::Slash(SlashCommand::Users) => self.send_user_list().await,
            ClosedInput::Slash(SlashCommand::Unknown) => self.reply(replies::ERR_UNKNOWN_SLASH),
            ClosedInput::Backslash => self.reply(replies::BACKSLASH_HINT),
            ClosedInput::Text(text) => {
                self.router.send_private(&self.username, partner, text).await?;
                self.reply(replies::MESSAGE_SENT)
            }
        }
    }

    async fn handle_semi_closed(&mut self, partners: &[String], line: &str) -> Result<Flow> {
        if is_exit(line) {
            self.mode = ChatMode::Open;
            self.reply(replies::GROUP_LEFT)?;
            self.send_help()?;
            return Ok(Flow::Continue);
        }

        let outcomes = self.router.send_group(&self.username, partners, line).await;
        for (member, outcome) in &outcomes {
            if let Err(e) = outcome {
                self.reply(replies::error(format_args!("{}: {}", member, e)))?;
            }
        }
        self.reply(replies::MESSAGE_SENT)
    }

    /// Switch to CLOSED mode with `partner` and leave any browser screen
    pub(super) fn enter_closed(&mut self, partner: &str) -> Result<Flow> {
        debug!("{} entered closed chat with {}", self.username, partner);
        self.mode = ChatMode::Closed {
            partner: partner.to_string(),
        };
        self.screen = Screen::Chat;
        self.reply_lines(replies::entered_closed_chat(partner))
    }

    pub(super) async fn registry_has(&self, username: &str) -> bool {
        self.router.registry().exists(username).await
    }

    pub(super) async fn send_user_list(&self) -> Result<Flow> {
        let users = self.router.registry().snapshot().await;
        self.reply_lines(replies::user_list(&users))
    }

    pub(super) fn send_help(&self) -> Result<()> {
        let in_closed_chat = matches!(self.mode, ChatMode::Closed { .. });
        self.handle.send_lines(replies::help(in_closed_chat))
    }

    fn goodbye(&self) -> Result<Flow> {
        self.handle.send_line(replies::GOODBYE)?;
        Ok(Flow::Exit)
    }

    pub(super) fn reply(&self, line: impl Into<String>) -> Result<Flow> {
        self.handle.send_line(line)?;
        Ok(Flow::Continue)
    }

    pub(super) fn reply_lines<I, S>(&self, lines: I) -> Result<Flow>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle.send_lines(lines)?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::server::registry::ClientRegistry;
    use crate::store::MessageStore;
    use crate::transport::ConnectionWriter;

    /// A logged-in session plus the queue its replies land in
    pub(in crate::server) struct TestClient {
        pub session: Session,
        pub output: ConnectionWriter,
    }

    impl TestClient {
        pub async fn send(&mut self, line: &str) -> Vec<String> {
            let flow = self.session.handle_line(line).await.unwrap();
            assert_eq!(flow, Flow::Continue, "unexpected exit on {line:?}");
            self.output.drain_lines()
        }
    }

    pub(in crate::server) async fn router() -> MessageRouter {
        let store = MessageStore::in_memory().await.unwrap();
        MessageRouter::new(Arc::new(ClientRegistry::new(10)), Arc::new(store))
    }

    pub(in crate::server) async fn login(router: &MessageRouter, name: &str) -> TestClient {
        let (handle, output) = ClientHandle::new();
        router.registry().register(name, handle.clone()).await.unwrap();
        TestClient {
            session: Session::new(name.to_string(), handle, router.clone(), 5),
            output,
        }
    }

    #[tokio::test]
    async fn test_greet() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;

        alice.session.greet().unwrap();

        let lines = alice.output.drain_lines();
        assert_eq!(lines[0], "Welcome, Alice!");
        assert_eq!(lines[1], "Type 'help' for commands.");
        assert_eq!(lines[2], "Available commands:");
    }

    #[tokio::test]
    async fn test_empty_lines_are_ignored() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;

        assert!(alice.send("").await.is_empty());
        assert!(alice.send("   \r").await.is_empty());
        assert_eq!(alice.session.mode(), &ChatMode::Open);
    }

    #[tokio::test]
    async fn test_chat_delivers_and_acks() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        let mut bob = login(&router, "Bob").await;

        assert_eq!(alice.send("Chat Bob hello").await, vec!["Message sent ✓"]);
        assert_eq!(bob.output.drain_lines(), vec!["Alice -> Bob: hello"]);

        let stored = router.store().query_pair("Bob", "Alice").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "hello");
    }

    #[tokio::test]
    async fn test_chat_to_unknown_user_stores_nothing() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;

        assert_eq!(
            alice.send("Chat Ghost hi").await,
            vec!["ERROR: target username does not exist"]
        );
        assert_eq!(router.store().message_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_usernames_are_case_sensitive() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        let _bob = login(&router, "Bob").await;

        assert_eq!(
            alice.send("chat bob hi").await,
            vec!["ERROR: target username does not exist"]
        );
    }

    #[tokio::test]
    async fn test_select_then_bare_text_then_open() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        let mut bob = login(&router, "Bob").await;

        let lines = alice.send("select Bob").await;
        assert!(lines[0].starts_with("Entered CLOSED_CHAT with Bob."));
        assert_eq!(
            alice.session.mode(),
            &ChatMode::Closed {
                partner: "Bob".into()
            }
        );

        assert_eq!(alice.send("hello").await, vec!["Message sent ✓"]);
        assert_eq!(bob.output.drain_lines(), vec!["Alice -> Bob: hello"]);

        assert_eq!(alice.send("/open").await, vec!["Returned to OPEN_CHAT mode."]);
        assert_eq!(alice.session.mode(), &ChatMode::Open);

        assert_eq!(
            alice.send("hello").await,
            vec!["ERROR: Unknown command. Type 'help'"]
        );
        assert_eq!(router.store().query_pair("Alice", "Bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_unknown_user_stays_open() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;

        assert_eq!(
            alice.send("select Ghost").await,
            vec!["ERROR: user not connected/known"]
        );
        assert_eq!(alice.session.mode(), &ChatMode::Open);
    }

    #[tokio::test]
    async fn test_closed_chat_to_departed_partner_is_stored() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        let bob = login(&router, "Bob").await;
        alice.send("select Bob").await;

        router.registry().unregister(bob.session.handle.id()).await;

        assert_eq!(alice.send("still there?").await, vec!["Message sent ✓"]);
        let stored = router.store().query_pair("Alice", "Bob").await.unwrap();
        assert_eq!(stored[0].content, "still there?");
    }

    #[tokio::test]
    async fn test_closed_mode_slash_and_backslash() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        let _bob = login(&router, "Bob").await;
        alice.send("select Bob").await;

        assert_eq!(
            alice.send("/dance").await,
            vec!["Unknown slash command in closed chat. /help"]
        );
        assert_eq!(
            alice.send("\\open").await,
            vec!["Use /command for commands. To send message, just type it."]
        );
        assert_eq!(alice.send("/users").await, vec!["Alice", "Bob"]);

        let help = alice.send("/help").await;
        assert!(help.iter().any(|l| l.starts_with("In CLOSED_CHAT")));
        assert_eq!(router.store().message_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exit_from_open_and_closed() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        let mut bob = login(&router, "Bob").await;

        assert_eq!(alice.session.handle_line("exit").await.unwrap(), Flow::Exit);
        assert_eq!(alice.output.drain_lines(), vec!["Goodbye"]);

        bob.send("select Alice").await;
        assert_eq!(bob.session.handle_line("/EXIT").await.unwrap(), Flow::Exit);
        assert_eq!(bob.output.drain_lines(), vec!["Goodbye"]);
    }

    #[tokio::test]
    async fn test_getmessages_and_deletemessages() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        let mut bob = login(&router, "Bob").await;

        assert_eq!(alice.send("getmessages Bob").await, vec!["(no messages)"]);

        alice.send("Chat Bob hello").await;
        bob.send("Chat Alice hi").await;
        assert_eq!(alice.output.drain_lines(), vec!["Bob -> Alice: hi"]);

        let lines = alice.send("getmessages Bob").await;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" Alice->Bob: hello"));
        assert!(lines[1].ends_with(" Bob->Alice: hi"));

        assert_eq!(
            alice.send("deletemessages Bob").await,
            vec!["OK: 2 messages deleted"]
        );
        assert_eq!(alice.send("getmessages Bob").await, vec!["(no messages)"]);
    }

    #[tokio::test]
    async fn test_open_mode_informational_commands() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;

        assert_eq!(alice.send("open").await, vec!["Switched to OPEN_CHAT mode."]);
        assert_eq!(alice.send("getuserlist").await, vec!["Alice"]);
        assert_eq!(alice.send("HELP").await[0], "Available commands:");
    }

    #[tokio::test]
    async fn test_missing_arguments_are_errors() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;

        assert_eq!(
            alice.send("Chat Bob").await,
            vec!["ERROR: usage: Chat <user> <message>"]
        );
        assert_eq!(alice.send("select").await, vec!["ERROR: usage select <username>"]);
        assert_eq!(
            alice.send("getmessages").await,
            vec!["ERROR: usage getmessages <user>"]
        );
        assert_eq!(
            alice.send("deletemessages").await,
            vec!["ERROR: usage deletemessages <user>"]
        );
        assert_eq!(alice.session.mode(), &ChatMode::Open);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_inline() {
        let router = router().await;
        let mut alice = login(&router, "Alice").await;
        router.store().close().await;

        let lines = alice.send("getmessages Bob").await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERROR: "), "got {lines:?}");

        assert_eq!(alice.send("getuserlist").await, vec!["Alice"]);
    }
}
