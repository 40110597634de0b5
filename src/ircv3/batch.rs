//! IRCv3 `batch` reassembly.
//!
//! Lines tagged with an open batch reference are buffered instead of being
//! dispatched. When a `draft/multiline` batch closes, its members are
//! folded into one [`MultilineMessage`]; other batch types are dropped.
//! A batch opened inside another batch belongs to its parent and is
//! dropped with it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::event::MultilineMessage;
use crate::message::{Message, Source};

/// Batch types that carry a multiline message.
pub const MULTILINE_BATCH_TYPES: &[&str] = &["draft/multiline", "multiline"];

/// Tag marking a multiline member that continues the previous one without a line break.
pub const MULTILINE_CONCAT_TAG: &str = "draft/multiline-concat";

static BATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a reference for an outbound batch.
pub fn generate_batch_ref() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let counter = BATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", timestamp, counter)
}

/// One buffered line of an open batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMember {
    pub command: String,
    pub source: Source,
    pub body: String,
    pub concat: bool,
    pub msgid: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

/// A batch between `BATCH +id` and `BATCH -id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBatch {
    pub id: String,
    pub kind: String,
    pub params: Vec<String>,
    pub source: Source,
    /// `time` tag of the opening line.
    pub time: Option<DateTime<Utc>>,
    /// Enclosing batch, when the opening line was itself tagged with one.
    pub parent: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub members: Vec<BatchMember>,
}

impl OpenBatch {
    fn is_multiline(&self) -> bool {
        MULTILINE_BATCH_TYPES.contains(&self.kind.as_str())
    }

    fn into_multiline(self, now: DateTime<Utc>) -> MultilineMessage {
        let mut body = String::new();
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 && !member.concat {
                body.push('\n');
            }
            body.push_str(&member.body);
        }

        let time = self
            .time
            .or_else(|| self.members.iter().filter_map(|m| m.time).min())
            .unwrap_or(now);

        let source = self
            .members
            .first()
            .map(|m| m.source.clone())
            .unwrap_or(self.source);

        MultilineMessage {
            target: self.params.into_iter().next().unwrap_or_default(),
            notice: self
                .members
                .first()
                .is_some_and(|m| m.command == "NOTICE"),
            message_ids: self.members.into_iter().filter_map(|m| m.msgid).collect(),
            batch_id: self.id,
            source,
            body,
            time,
        }
    }
}

/// What the reassembler did with a line.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStep {
    /// Not batch-related; dispatch normally.
    Pass,
    /// Opened, buffered or closed without output.
    Consumed,
    /// A multiline batch closed.
    Multiline(MultilineMessage),
}

/// Open-batch table for one session.
#[derive(Debug, Default)]
pub struct BatchReassembler {
    open: HashMap<String, OpenBatch>,
}

impl BatchReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one line through the table.
    pub fn process(&mut self, msg: &Message, now: DateTime<Utc>) -> BatchStep {
        if msg.command == "BATCH" {
            return self.handle_batch_command(msg, now);
        }

        let Some(id) = msg.batch_id() else {
            return BatchStep::Pass;
        };
        let Some(batch) = self.open.get_mut(id) else {
            return BatchStep::Pass;
        };

        batch.members.push(BatchMember {
            command: msg.command.clone(),
            source: msg.source.clone(),
            body: msg.param(1).unwrap_or_default().to_string(),
            concat: msg.has_tag(MULTILINE_CONCAT_TAG),
            msgid: msg.msgid().map(str::to_string),
            time: msg.server_time(),
        });
        BatchStep::Consumed
    }

    fn handle_batch_command(&mut self, msg: &Message, now: DateTime<Utc>) -> BatchStep {
        let Some(reference) = msg.param(0) else {
            debug!("BATCH without reference");
            return BatchStep::Consumed;
        };

        if let Some(id) = reference.strip_prefix('+') {
            let batch = OpenBatch {
                id: id.to_string(),
                kind: msg.param(1).unwrap_or_default().to_string(),
                params: msg.params.iter().skip(2).cloned().collect(),
                source: msg.source.clone(),
                time: msg.server_time(),
                parent: msg
                    .batch_id()
                    .filter(|parent| self.open.contains_key(*parent))
                    .map(str::to_string),
                opened_at: now,
                members: Vec::new(),
            };
            self.open.insert(batch.id.clone(), batch);
            return BatchStep::Consumed;
        }

        let Some(id) = reference.strip_prefix('-') else {
            debug!(reference, "BATCH reference without +/- marker");
            return BatchStep::Consumed;
        };

        let closed = self.open.remove(id);
        if closed.is_some() {
            self.drop_children(id);
        }
        match closed {
            Some(batch) if batch.parent.is_some() => {
                debug!(
                    batch = %batch.id,
                    parent = ?batch.parent,
                    "dropping nested batch with its parent"
                );
                BatchStep::Consumed
            }
            Some(batch) if batch.is_multiline() => BatchStep::Multiline(batch.into_multiline(now)),
            Some(batch) => {
                debug!(
                    batch = %batch.id,
                    kind = %batch.kind,
                    members = batch.members.len(),
                    "dropping unhandled batch type"
                );
                BatchStep::Consumed
            }
            None => {
                debug!(batch = id, "close for unknown batch");
                BatchStep::Consumed
            }
        }
    }

    /// Close every batch nested under `parent` without output.
    fn drop_children(&mut self, parent: &str) {
        let children: Vec<String> = self
            .open
            .values()
            .filter(|b| b.parent.as_deref() == Some(parent))
            .map(|b| b.id.clone())
            .collect();
        for child in children {
            self.open.remove(&child);
            self.drop_children(&child);
        }
    }

    /// Whether `id` is currently open.
    pub fn is_open(&self, id: &str) -> bool {
        self.open.contains_key(id)
    }

    /// Buffered member count of an open batch.
    pub fn member_count(&self, id: &str) -> Option<usize> {
        self.open.get(id).map(|b| b.members.len())
    }

    /// Number of open batches.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Discard every open batch (transport closed). Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.open.len();
        self.open.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(raw: &str) -> Message {
        Message::parse(raw, "irc.test").unwrap()
    }

    fn feed(re: &mut BatchReassembler, raw: &str) -> BatchStep {
        re.process(&line(raw), Utc::now())
    }

    #[test]
    fn test_multiline_concat() {
        let mut re = BatchReassembler::new();
        assert_eq!(feed(&mut re, ":n!u@h BATCH +b1 draft/multiline #c"), BatchStep::Consumed);
        assert_eq!(
            feed(&mut re, "@batch=b1;msgid=m1 :n!u@h PRIVMSG #c :line1"),
            BatchStep::Consumed
        );
        feed(&mut re, "@batch=b1;msgid=m2 :n!u@h PRIVMSG #c :line2");
        feed(
            &mut re,
            "@batch=b1;msgid=m3;draft/multiline-concat :n!u@h PRIVMSG #c :line3",
        );
        assert_eq!(re.member_count("b1"), Some(3));

        match feed(&mut re, ":n!u@h BATCH -b1") {
            BatchStep::Multiline(m) => {
                assert_eq!(m.body, "line1\nline2line3");
                assert_eq!(m.message_ids, vec!["m1", "m2", "m3"]);
                assert_eq!(m.target, "#c");
                assert_eq!(m.source.name, "n");
                assert!(!m.notice);
            }
            other => panic!("expected multiline, got {:?}", other),
        }
        assert!(re.is_empty());
    }

    #[test]
    fn test_timestamp_precedence() {
        let mut re = BatchReassembler::new();
        feed(&mut re, ":n BATCH +b draft/multiline #c");
        feed(&mut re, "@batch=b;time=2024-01-01T00:00:05.000Z :n PRIVMSG #c :a");
        feed(&mut re, "@batch=b;time=2024-01-01T00:00:01.000Z :n PRIVMSG #c :b");
        let BatchStep::Multiline(m) = feed(&mut re, ":n BATCH -b") else {
            panic!("expected multiline");
        };
        assert_eq!(m.time.to_rfc3339(), "2024-01-01T00:00:01+00:00");

        feed(
            &mut re,
            "@time=2023-06-01T00:00:00.000Z :n BATCH +b2 draft/multiline #c",
        );
        feed(&mut re, "@batch=b2;time=2024-01-01T00:00:01.000Z :n PRIVMSG #c :a");
        let BatchStep::Multiline(m) = feed(&mut re, ":n BATCH -b2") else {
            panic!("expected multiline");
        };
        assert_eq!(m.time.to_rfc3339(), "2023-06-01T00:00:00+00:00");
    }

    #[test]
    fn test_unknown_type_is_dropped() {
        let mut re = BatchReassembler::new();
        feed(&mut re, ":irc.test BATCH +h chathistory #c");
        assert_eq!(
            feed(&mut re, "@batch=h :n PRIVMSG #c :old"),
            BatchStep::Consumed
        );
        assert_eq!(feed(&mut re, ":irc.test BATCH -h"), BatchStep::Consumed);
        assert!(re.is_empty());
    }

    #[test]
    fn test_nested_multiline_dropped_with_parent() {
        let mut re = BatchReassembler::new();
        feed(&mut re, ":irc.test BATCH +h chathistory #c");
        assert_eq!(
            feed(&mut re, "@batch=h :n!u@h BATCH +m draft/multiline #c"),
            BatchStep::Consumed
        );
        feed(&mut re, "@batch=m :n!u@h PRIVMSG #c :first");
        feed(&mut re, "@batch=m :n!u@h PRIVMSG #c :second");
        assert_eq!(re.member_count("m"), Some(2));

        assert_eq!(feed(&mut re, ":irc.test BATCH -m"), BatchStep::Consumed);
        assert_eq!(feed(&mut re, ":irc.test BATCH -h"), BatchStep::Consumed);
        assert!(re.is_empty());
    }

    #[test]
    fn test_closing_parent_discards_open_children() {
        let mut re = BatchReassembler::new();
        feed(&mut re, ":irc.test BATCH +h chathistory #c");
        feed(&mut re, "@batch=h :n BATCH +m draft/multiline #c");
        feed(&mut re, "@batch=m :n PRIVMSG #c :orphan");
        assert_eq!(feed(&mut re, ":irc.test BATCH -h"), BatchStep::Consumed);
        assert!(re.is_empty());
        assert_eq!(feed(&mut re, ":irc.test BATCH -m"), BatchStep::Consumed);
    }

    #[test]
    fn test_unrelated_lines_pass() {
        let mut re = BatchReassembler::new();
        assert_eq!(feed(&mut re, ":n PRIVMSG #c :hi"), BatchStep::Pass);
        assert_eq!(
            feed(&mut re, "@batch=nope :n PRIVMSG #c :hi"),
            BatchStep::Pass
        );
    }

    #[test]
    fn test_clear_discards_open_batches() {
        let mut re = BatchReassembler::new();
        feed(&mut re, ":n BATCH +a draft/multiline #c");
        feed(&mut re, ":n BATCH +b netsplit x y");
        assert_eq!(re.clear(), 2);
        assert_eq!(feed(&mut re, ":n BATCH -a"), BatchStep::Consumed);
    }

    #[test]
    fn test_batch_refs_are_unique() {
        assert_ne!(generate_batch_ref(), generate_batch_ref());
    }
}
