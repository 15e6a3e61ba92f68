use async_trait::async_trait;
use colloquy_core::{
    Envelope, InputError, InputSource, Publications, Service, ServiceDescriptor, ServiceError,
    ServiceId, Topic,
};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

/// Reads the user's next utterance from a line-oriented reader.
pub struct ConsoleInput<R = BufReader<Stdin>> {
    lines: Lines<R>,
    prompt: Option<String>,
}

impl ConsoleInput {
    /// Read from the process's stdin.
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> ConsoleInput<R> {
    /// Read from any buffered reader.
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            prompt: None,
        }
    }

    /// Print `prompt` to stdout before waiting for a line.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> InputSource for ConsoleInput<R> {
    async fn next_input(
        &mut self,
        _last_output: Option<&Envelope>,
    ) -> Result<Option<serde_json::Value>, InputError> {
        if let Some(prompt) = &self.prompt {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(prompt.as_bytes()).await?;
            stdout.flush().await?;
        }
        match self.lines.next_line().await? {
            Some(line) => Ok(Some(serde_json::Value::String(line.trim().to_string()))),
            None => {
                tracing::debug!("colloquy.console.eof");
                Ok(None)
            }
        }
    }
}

/// A sink service that prints one topic's text after every turn.
///
/// Domain-agnostic; publishes nothing. A `null` value prints nothing.
pub struct ConsoleOutput {
    id: ServiceId,
    topic: Topic,
    prefix: String,
    out: Box<dyn Write + Send + Sync>,
}

impl ConsoleOutput {
    /// Print `topic` to stdout.
    pub fn new(id: impl Into<ServiceId>, topic: impl Into<Topic>) -> Self {
        Self::to_writer(id, topic, Box::new(std::io::stdout()))
    }

    /// Print `topic` to any writer.
    pub fn to_writer(
        id: impl Into<ServiceId>,
        topic: impl Into<Topic>,
        out: Box<dyn Write + Send + Sync>,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            prefix: "System: ".to_string(),
            out,
        }
    }

    /// Text printed before each utterance.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

#[async_trait]
impl Service for ConsoleOutput {
    fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.id.clone()).subscribes([self.topic.clone()])
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        let text = match envelope.get(self.topic.as_str()) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => return Ok(Publications::none()),
            Some(other) => other.to_string(),
        };
        writeln!(self.out, "{}{text}", self.prefix)
            .and_then(|()| self.out.flush())
            .map_err(|e| ServiceError::Other(Box::new(e)))?;
        Ok(Publications::none())
    }
}
