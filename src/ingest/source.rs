//! Message sources
//!
//! The stream capability the consumer pulls from. Delivery is at-least-once:
//! committing positions is the source's business, not the consumer's.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use crate::error::{OrderError, Result};

/// A raw message as delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Partitioning key set by the producer, normally the order uid
    pub key: Option<String>,
    /// Encoded order
    pub payload: Vec<u8>,
    /// Position of the message within the source
    pub position: u64,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>, position: u64) -> Self {
        Self {
            key: None,
            payload: payload.into(),
            position,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A stream of order messages.
///
/// `receive` must be cancel-safe: the consumer races it against its
/// cancellation token and drops the future when shutdown wins, and no message
/// may be lost when that happens.
#[async_trait]
pub trait OrderSource: Send {
    /// Waits for the next message. `Ok(None)` means the stream is exhausted.
    async fn receive(&mut self) -> Result<Option<Message>>;

    /// Releases the source's resources.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// == Channel Source ==
/// Source fed by an in-process channel. Exhausted once every sender is dropped.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Message>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx }
    }

    /// Creates a bounded channel and the source reading from it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Message>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl OrderSource for ChannelSource {
    async fn receive(&mut self) -> Result<Option<Message>> {
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.rx.close();
        Ok(())
    }
}

// == Line Source ==
/// Source reading newline-delimited JSON messages from a reader.
///
/// Blank lines are skipped. A message's position is its 0-based line number.
#[derive(Debug)]
pub struct LineSource<R> {
    lines: Lines<R>,
    next_position: u64,
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            next_position: 0,
        }
    }
}

impl LineSource<BufReader<File>> {
    /// Opens a JSON-lines file as a source.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).await.map_err(|e| {
            OrderError::Source(format!("cannot open {}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl LineSource<BufReader<Stdin>> {
    /// Reads messages from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> OrderSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<Message>> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(line) => line,
                Err(e) => {
                    // An undecodable line is consumed; keep later positions aligned
                    if e.kind() == std::io::ErrorKind::InvalidData {
                        self.next_position += 1;
                    }
                    return Err(OrderError::Source(e.to_string()));
                }
            };

            let Some(line) = line else {
                return Ok(None);
            };

            let position = self.next_position;
            self.next_position += 1;

            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(Message::new(line, position)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_delivers_in_order() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send(Message::new("one", 0)).await.unwrap();
        tx.send(Message::new("two", 1).with_key("k")).await.unwrap();
        drop(tx);

        let first = source.receive().await.unwrap().unwrap();
        assert_eq!(first.payload, b"one");
        let second = source.receive().await.unwrap().unwrap();
        assert_eq!(second.key.as_deref(), Some("k"));
        assert_eq!(second.position, 1);
        assert!(source.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_source_skips_blank_lines() {
        let input: &[u8] = b"{\"order_uid\":\"A1\"}\n\n   \n{\"order_uid\":\"B2\"}\n";
        let mut source = LineSource::new(input);

        let first = source.receive().await.unwrap().unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(first.payload, br#"{"order_uid":"A1"}"#);

        let second = source.receive().await.unwrap().unwrap();
        assert_eq!(second.position, 3);

        assert!(source.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_source_position_after_invalid_utf8() {
        let input: &[u8] = b"{\"order_uid\":\"A1\"}\n\xff\xfe\n{\"order_uid\":\"C3\"}\n";
        let mut source = LineSource::new(input);

        assert_eq!(source.receive().await.unwrap().unwrap().position, 0);
        assert!(matches!(source.receive().await, Err(OrderError::Source(_))));

        let third = source.receive().await.unwrap().unwrap();
        assert_eq!(third.position, 2);
        assert_eq!(third.payload, br#"{"order_uid":"C3"}"#);
        assert!(source.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_source_open_missing_file() {
        let result = LineSource::open("/definitely/not/here.jsonl").await;
        assert!(matches!(result, Err(OrderError::Source(_))));
    }
}
