#![deny(missing_docs)]
//! Conversation logs for colloquy.
//!
//! [`ConversationLog`] is a session hook that writes one JSON-lines file
//! per session into a log directory:
//!
//! ```text
//! conversation_logs/
//!   20240131-142501-<session id>.jsonl
//! ```
//!
//! Each line is one [`LogRecord`]: a session start marker, one record per
//! completed turn, and a session end marker. The file is opened lazily on
//! the first event of a session and flushed after every record, so a
//! crash loses at most the turn in flight. Logging failures never affect
//! the dialog; the hook registry reports them and carries on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colloquy_core::hook::{Hook, HookAction, HookContext, HookPoint};
use colloquy_core::{DomainId, HookError, Origin, SessionId, Topic, TurnDiagnostic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Replacement for masked values.
pub const MASK: &str = "***";

/// Errors from writing a conversation log.
#[derive(Debug, Error)]
pub enum ConvLogError {
    /// Creating or writing the file failed.
    #[error("conversation log io error: {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be serialized.
    #[error("conversation log serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ConvLogError> for HookError {
    fn from(e: ConvLogError) -> Self {
        HookError::Other(Box::new(e))
    }
}

/// What a log line describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// The session started.
    SessionStart,
    /// A turn completed.
    Turn {
        /// Active domain at the end of the turn.
        domain: Option<DomainId>,
        /// The external input and carried values the turn started from.
        seed: serde_json::Value,
        /// Final envelope.
        envelope: serde_json::Value,
        /// Services in firing order.
        fired: Vec<String>,
        /// Non-fatal problems observed.
        diagnostics: Vec<TurnDiagnostic>,
    },
    /// The session shut down.
    SessionEnd,
}

/// One line of a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
    /// Session the record belongs to.
    pub session: SessionId,
    /// Turn number (0 before the first turn).
    pub turn: u64,
    /// The record's payload.
    #[serde(flatten)]
    pub event: LogEvent,
}

struct OpenLog {
    session: SessionId,
    path: PathBuf,
    file: tokio::fs::File,
}

/// A hook writing one JSON-lines file per session.
pub struct ConversationLog {
    dir: PathBuf,
    masked: BTreeSet<Topic>,
    open: Mutex<Option<OpenLog>>,
}

impl ConversationLog {
    /// Log into `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            masked: BTreeSet::new(),
            open: Mutex::new(None),
        }
    }

    /// Replace the string values of `topics` with [`MASK`] in every record.
    pub fn with_masked_topics<I, T>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        self.masked.extend(topics.into_iter().map(Into::into));
        self
    }

    /// The directory logs are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the current session's file, once opened.
    pub async fn current_path(&self) -> Option<PathBuf> {
        self.open.lock().await.as_ref().map(|o| o.path.clone())
    }

    fn mask(&self, mut value: serde_json::Value) -> serde_json::Value {
        if let serde_json::Value::Object(map) = &mut value {
            for (topic, v) in map.iter_mut() {
                if self.masked.contains(topic.as_str()) && v.is_string() {
                    *v = serde_json::Value::String(MASK.to_string());
                }
            }
        }
        value
    }

    fn event(&self, ctx: &HookContext) -> Option<LogEvent> {
        match ctx.point {
            HookPoint::SessionStart => Some(LogEvent::SessionStart),
            HookPoint::SessionEnd => Some(LogEvent::SessionEnd),
            HookPoint::TurnEnd => {
                let report = ctx.report.as_ref()?;
                let seed: serde_json::Map<String, serde_json::Value> = report
                    .envelope
                    .iter()
                    .filter(|(topic, _)| {
                        matches!(
                            report.envelope.origin(topic.as_str()),
                            Some(Origin::Seed | Origin::Carried)
                        )
                    })
                    .map(|(topic, value)| (topic.to_string(), value.clone()))
                    .collect();
                Some(LogEvent::Turn {
                    domain: report.domain.clone(),
                    seed: self.mask(serde_json::Value::Object(seed)),
                    envelope: self.mask(report.envelope.to_json()),
                    fired: report.fired.iter().map(ToString::to_string).collect(),
                    diagnostics: report.diagnostics.clone(),
                })
            }
            _ => None,
        }
    }

    async fn write(&self, record: &LogRecord) -> Result<(), ConvLogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut open = self.open.lock().await;
        if open.as_ref().is_none_or(|o| o.session != record.session) {
            tokio::fs::create_dir_all(&self.dir).await?;
            let name = format!(
                "{}-{}.jsonl",
                record.timestamp.format("%Y%m%d-%H%M%S"),
                record.session
            );
            let path = self.dir.join(name);
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            tracing::debug!(path = %path.display(), "colloquy.convlog.open");
            *open = Some(OpenLog {
                session: record.session.clone(),
                path,
                file,
            });
        }
        if let Some(log) = open.as_mut() {
            log.file.write_all(&line).await?;
            log.file.flush().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConversationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLog")
            .field("dir", &self.dir)
            .field("masked", &self.masked)
            .finish()
    }
}

#[async_trait]
impl Hook for ConversationLog {
    fn points(&self) -> &[HookPoint] {
        &[HookPoint::SessionStart, HookPoint::TurnEnd, HookPoint::SessionEnd]
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError> {
        let Some(event) = self.event(ctx) else {
            return Ok(HookAction::Continue);
        };
        let record = LogRecord {
            timestamp: Utc::now(),
            session: ctx.session.clone(),
            turn: ctx.turn,
            event,
        };
        self.write(&record).await?;
        Ok(HookAction::Continue)
    }
}
