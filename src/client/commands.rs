//! Outbound command surface.
//!
//! Every method encodes its lines with [`crate::encode::command`] and hands
//! them to the session task without waiting. Lines sent before the session
//! is registered are queued and flushed after `001`.

use crate::encode::command::{self as cmd, TypingState};
use crate::encode::EncodeContext;
use crate::error::Result;
use crate::event::SessionId;
use crate::state::ListMode;

use super::actor::Command;
use super::SessionManager;

impl SessionManager {
    fn send(&self, session: SessionId, lines: Vec<String>) -> Result<()> {
        self.command(session, Command::Send(lines))
    }

    fn send_line(&self, session: SessionId, line: String) -> Result<()> {
        self.send(session, vec![line])
    }

    /// Encoding options from the session's acknowledged capabilities.
    pub fn encode_context(&self, session: SessionId) -> Result<EncodeContext> {
        self.with_handle(session, |h| {
            EncodeContext::from_caps(&h.shared.state.read().caps)
        })
    }

    // ========================================================================
    // Channels
    // ========================================================================

    pub fn join(&self, session: SessionId, channel: &str, key: Option<&str>) -> Result<()> {
        self.send_line(session, cmd::join(channel, key))
    }

    pub fn part(&self, session: SessionId, channel: &str, reason: Option<&str>) -> Result<()> {
        self.send_line(session, cmd::part(channel, reason))
    }

    pub fn get_topic(&self, session: SessionId, channel: &str) -> Result<()> {
        self.send_line(session, cmd::topic_get(channel))
    }

    pub fn set_topic(&self, session: SessionId, channel: &str, topic: &str) -> Result<()> {
        self.send_line(session, cmd::topic_set(channel, topic))
    }

    pub fn invite(&self, session: SessionId, nickname: &str, channel: &str) -> Result<()> {
        self.send_line(session, cmd::invite(nickname, channel))
    }

    pub fn kick(
        &self,
        session: SessionId,
        channel: &str,
        nickname: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.send_line(session, cmd::kick(channel, nickname, reason))
    }

    pub fn mode(&self, session: SessionId, target: &str, modes: &str, args: &[&str]) -> Result<()> {
        self.send_line(session, cmd::mode(target, modes, args))
    }

    pub fn ban(&self, session: SessionId, channel: &str, mask: &str) -> Result<()> {
        self.send_line(session, cmd::ban(channel, mask))
    }

    pub fn unban(&self, session: SessionId, channel: &str, mask: &str) -> Result<()> {
        self.send_line(session, cmd::unban(channel, mask))
    }

    pub fn add_exception(&self, session: SessionId, channel: &str, mask: &str) -> Result<()> {
        self.send_line(session, cmd::exception_add(channel, mask))
    }

    pub fn remove_exception(&self, session: SessionId, channel: &str, mask: &str) -> Result<()> {
        self.send_line(session, cmd::exception_remove(channel, mask))
    }

    pub fn add_invite_exception(&self, session: SessionId, channel: &str, mask: &str) -> Result<()> {
        self.send_line(session, cmd::invex_add(channel, mask))
    }

    pub fn remove_invite_exception(
        &self,
        session: SessionId,
        channel: &str,
        mask: &str,
    ) -> Result<()> {
        self.send_line(session, cmd::invex_remove(channel, mask))
    }

    /// Ask for a ban, exception or invite-exception list.
    pub fn query_list_mode(&self, session: SessionId, channel: &str, list: ListMode) -> Result<()> {
        self.send_line(session, cmd::list_mode_query(channel, list))
    }

    /// `LIST`, optionally filtered (channel names or ELIST conditions).
    pub fn list_channels(&self, session: SessionId, filters: &[&str]) -> Result<()> {
        self.send_line(session, cmd::list(filters))
    }

    pub fn rename_channel(
        &self,
        session: SessionId,
        old: &str,
        new: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.send_line(session, cmd::rename(old, new, reason))
    }

    /// Clear the unread and mention counters of a channel. Local only.
    pub fn mark_read(&self, session: SessionId, channel: &str) -> Result<()> {
        self.command(session, Command::MarkRead(channel.to_string()))
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// `PRIVMSG`, split and batched as the session's capabilities allow.
    pub fn send_message(&self, session: SessionId, target: &str, text: &str) -> Result<()> {
        let ctx = self.encode_context(session)?;
        self.send(session, cmd::privmsg(&ctx, target, text))
    }

    pub fn send_notice(&self, session: SessionId, target: &str, text: &str) -> Result<()> {
        let ctx = self.encode_context(session)?;
        self.send(session, cmd::notice(&ctx, target, text))
    }

    /// Private message shown in the context of `channel`.
    pub fn send_whisper(
        &self,
        session: SessionId,
        target: &str,
        channel: &str,
        text: &str,
    ) -> Result<()> {
        let ctx = self.encode_context(session)?;
        self.send(session, cmd::whisper(&ctx, target, channel, text))
    }

    /// Typing notification. Silently skipped without `message-tags`.
    pub fn send_typing(&self, session: SessionId, target: &str, state: TypingState) -> Result<()> {
        let ctx = self.encode_context(session)?;
        match cmd::typing(&ctx, target, state) {
            Some(line) => self.send_line(session, line),
            None => Ok(()),
        }
    }

    pub fn redact(
        &self,
        session: SessionId,
        target: &str,
        msgid: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.send_line(session, cmd::redact(target, msgid, reason))
    }

    /// Send a line verbatim (line breaks are neutralised).
    pub fn raw(&self, session: SessionId, line: &str) -> Result<()> {
        self.send_line(session, cmd::raw(line))
    }

    // ========================================================================
    // Users and accounts
    // ========================================================================

    pub fn change_nick(&self, session: SessionId, nickname: &str) -> Result<()> {
        self.send_line(session, cmd::nick(nickname))
    }

    pub fn whois(&self, session: SessionId, nickname: &str) -> Result<()> {
        self.send_line(session, cmd::whois(nickname))
    }

    pub fn who(&self, session: SessionId, mask: &str) -> Result<()> {
        self.send_line(session, cmd::who(mask))
    }

    /// Set (`Some`) or clear (`None`) our away message.
    pub fn set_away(&self, session: SessionId, message: Option<&str>) -> Result<()> {
        self.send_line(session, cmd::away(message))
    }

    pub fn register_account(
        &self,
        session: SessionId,
        account: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<()> {
        self.send_line(session, cmd::register(account, email, password))
    }

    pub fn verify_account(&self, session: SessionId, account: &str, code: &str) -> Result<()> {
        self.send_line(session, cmd::verify(account, code))
    }

    pub fn monitor_add(&self, session: SessionId, targets: &[&str]) -> Result<()> {
        self.send(session, cmd::monitor_add(targets))
    }

    pub fn monitor_remove(&self, session: SessionId, targets: &[&str]) -> Result<()> {
        self.send(session, cmd::monitor_remove(targets))
    }

    pub fn monitor_clear(&self, session: SessionId) -> Result<()> {
        self.send_line(session, cmd::monitor_clear())
    }

    pub fn monitor_list(&self, session: SessionId) -> Result<()> {
        self.send_line(session, cmd::monitor_list())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn metadata_get(&self, session: SessionId, target: &str, keys: &[&str]) -> Result<()> {
        self.send_line(session, cmd::metadata_get(target, keys))
    }

    pub fn metadata_list(&self, session: SessionId, target: &str) -> Result<()> {
        self.send_line(session, cmd::metadata_list(target))
    }

    pub fn metadata_set(&self, session: SessionId, target: &str, key: &str, value: &str) -> Result<()> {
        self.send_line(session, cmd::metadata_set(target, key, Some(value)))
    }

    /// Remove one key, or every key when `key` is `None`.
    pub fn metadata_clear(&self, session: SessionId, target: &str, key: Option<&str>) -> Result<()> {
        let line = match key {
            Some(key) => cmd::metadata_set(target, key, None),
            None => cmd::metadata_clear(target),
        };
        self.send_line(session, line)
    }

    pub fn metadata_subscribe(&self, session: SessionId, keys: &[&str]) -> Result<()> {
        self.send_line(session, cmd::metadata_sub(keys))
    }

    pub fn metadata_unsubscribe(&self, session: SessionId, keys: &[&str]) -> Result<()> {
        self.send_line(session, cmd::metadata_unsub(keys))
    }
}
