use async_trait::async_trait;
use colloquy_core::{Envelope, InputError, InputSource};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Create a connected input handle and session input source.
///
/// The handle can live on another task or thread. Values are not queued:
/// a value sent while an earlier one is still pending replaces it, and
/// the session sees the last one observed before it asks.
pub fn input_channel() -> (InputHandle, ChannelInput) {
    let (tx, rx) = watch::channel(None);
    (InputHandle { tx }, ChannelInput { rx })
}

/// Producer side of [`input_channel`]. Dropping every clone ends the
/// session's input.
#[derive(Clone, Debug)]
pub struct InputHandle {
    tx: watch::Sender<Option<Value>>,
}

impl InputHandle {
    /// Hand over a value, replacing any value not yet taken.
    /// Returns `false` once the session side is gone.
    pub fn send(&self, value: impl Into<Value>) -> bool {
        self.tx.send(Some(value.into())).is_ok()
    }

    /// Whether the session side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Session side of [`input_channel`].
#[derive(Debug)]
pub struct ChannelInput {
    rx: watch::Receiver<Option<Value>>,
}

#[async_trait]
impl InputSource for ChannelInput {
    async fn next_input(
        &mut self,
        _last_output: Option<&Envelope>,
    ) -> Result<Option<Value>, InputError> {
        loop {
            // An unseen value is still delivered after the handle is dropped.
            if self.rx.changed().await.is_err() {
                return Ok(None);
            }
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Ok(Some(value));
            }
        }
    }
}

/// Spawn a task that feeds every non-empty line of `reader` into `handle`.
///
/// The task ends on EOF, on a read error, or once the session side is gone.
pub fn spawn_line_reader<R>(reader: R, handle: InputHandle) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if !handle.send(line) {
                        tracing::debug!("colloquy.input.closed");
                        return;
                    }
                }
                Ok(None) => {
                    tracing::debug!("colloquy.input.eof");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "colloquy.input.read_failed");
                    return;
                }
            }
        }
    })
}
