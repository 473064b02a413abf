//! Chatroom browser and broadcast room
//!
//! The browser is a screen of the session, not a loop of its own: entering
//! it only changes which handler the next input line goes to. The chat mode
//! is left untouched while browsing, so `back` lands in whatever mode the
//! user entered from.

use tracing::debug;

use crate::error::Result;
use crate::protocol::command::{BrowserCommand, is_exit};
use crate::protocol::replies;
use crate::server::session::{ChatMode, Flow, Screen, Session};

impl Session {
    /// Open the browser and list past conversation partners
    pub(super) async fn enter_browser(&mut self) -> Result<Flow> {
        debug!("{} opened the chatroom browser", self.username);
        self.screen = Screen::Browser;
        self.send_menu().await
    }

    pub(super) async fn handle_browser(&mut self, line: &str) -> Result<Flow> {
        match BrowserCommand::parse(line) {
            BrowserCommand::Select(target) => {
                if !self.registry_has(target).await {
                    self.reply(replies::ERR_MENU_USER_MISSING)?;
                    return self.send_menu().await;
                }
                self.enter_closed(target)
            }
            BrowserCommand::Group(names) => self.enter_group(&names).await,
            BrowserCommand::Room => {
                self.screen = Screen::Room;
                self.reply_lines(replies::ROOM_ENTERED)
            }
            BrowserCommand::History => {
                self.send_history().await?;
                self.send_menu().await
            }
            BrowserCommand::ListUsers => {
                self.send_user_list().await?;
                self.send_menu().await
            }
            BrowserCommand::Help => {
                self.reply_lines(replies::menu_help().iter().copied())?;
                self.send_menu().await
            }
            BrowserCommand::Back => {
                self.screen = Screen::Chat;
                self.send_help()?;
                Ok(Flow::Continue)
            }
            BrowserCommand::Usage(usage) => {
                self.reply(replies::error(usage))?;
                self.send_menu().await
            }
            BrowserCommand::Unknown => {
                self.reply(replies::ERR_MENU_UNKNOWN)?;
                self.send_menu().await
            }
        }
    }

    /// Inside the broadcast room every line except `/exit` goes to everyone
    pub(super) async fn handle_room(&mut self, line: &str) -> Result<Flow> {
        if is_exit(line) {
            self.screen = Screen::Browser;
            self.reply(replies::ROOM_LEFT)?;
            return self.send_menu().await;
        }

        self.router.broadcast(&self.username, line).await;
        Ok(Flow::Continue)
    }

    /// Keep the online, distinct names up to the group limit and switch to
    /// SEMI_CLOSED with them
    async fn enter_group(&mut self, names: &[&str]) -> Result<Flow> {
        let mut partners: Vec<String> = Vec::with_capacity(self.max_group_size);
        for name in names {
            if partners.len() == self.max_group_size {
                break;
            }
            if partners.iter().any(|p| p == name) || !self.registry_has(name).await {
                continue;
            }
            partners.push(name.to_string());
        }

        if partners.is_empty() {
            self.reply(replies::GROUP_NO_VALID_USERS)?;
            return self.send_menu().await;
        }

        debug!("{} started a group chat with {:?}", self.username, partners);
        self.mode = ChatMode::SemiClosed { partners };
        self.screen = Screen::Chat;
        self.reply_lines(replies::GROUP_CREATED)
    }

    /// Stored messages relevant to the current mode
    async fn send_history(&self) -> Result<Flow> {
        let store = self.router.store();
        let messages = match &self.mode {
            ChatMode::Open => store.query_user(&self.username).await?,
            ChatMode::Closed { partner } => store.query_pair(&self.username, partner).await?,
            ChatMode::SemiClosed { partners } => {
                store.query_group(&self.username, partners).await?
            }
        };
        self.reply_lines(replies::history(&messages))
    }

    async fn send_menu(&self) -> Result<Flow> {
        let partners = self.router.store().distinct_partners(&self.username).await?;
        self.reply_lines(replies::menu_listing(&partners))
    }
}
