//! Newline-delimited line transport.
//!
//! Reading buffers partial input until a full line is available and never
//! yields a partial line. Lines longer than the reader's limit are skipped
//! like any other undecodable line. Writing goes through a single queue
//! drained by one task, so messages leave in the order they were queued,
//! and the stream is shut down once the queue closes.

use mk_protocol::codec::encode;
use mk_protocol::ipc::Message;
use std::io;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Longest line accepted, terminator included.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reads complete lines from a byte stream.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_line: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_line(reader, MAX_LINE_BYTES)
    }

    pub fn with_max_line(reader: R, max_line: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            max_line: max_line.max(1),
        }
    }

    /// Next non-blank line, without its terminator.
    ///
    /// Returns `Ok(None)` at end of input. Bytes after the last newline are
    /// discarded with a warning. A line over the limit is dropped with a
    /// warning and reading resumes after its newline. Invalid UTF-8 is
    /// replaced rather than failing the stream; the codec rejects such
    /// lines later.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            let n = (&mut self.inner)
                .take(self.max_line as u64)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                return Ok(None);
            }

            if self.buf.last() != Some(&b'\n') {
                if n < self.max_line {
                    warn!(bytes = n, "Discarding unterminated line at end of input");
                    return Ok(None);
                }
                warn!(limit = self.max_line, "DecodeError: dropping oversized line");
                if !self.skip_line().await? {
                    return Ok(None);
                }
                continue;
            }
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }

            let line = String::from_utf8_lossy(&self.buf);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.into_owned()));
        }
    }

    /// Discard input up to and including the next newline without
    /// buffering it. Returns false if input ends first.
    async fn skip_line(&mut self) -> io::Result<bool> {
        loop {
            let (used, found) = {
                let available = self.inner.fill_buf().await?;
                if available.is_empty() {
                    return Ok(false);
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (available.len(), false),
                }
            };
            self.inner.consume(used);
            if found {
                return Ok(true);
            }
        }
    }
}

/// Handle for queueing outbound messages.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<Message>,
}

impl Outbound {
    /// Queue a message. Returns false once the writer has stopped.
    pub fn send(&self, message: impl Into<Message>) -> bool {
        self.tx.send(message.into()).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the task that owns the write half of the stream.
///
/// The task ends once every [`Outbound`] has been dropped and the queue is
/// drained, or on the first write error.
pub fn spawn_writer<W>(writer: W) -> (Outbound, JoinHandle<io::Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(write_loop(writer, rx));
    (Outbound { tx }, handle)
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Message>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let line = match encode(&message) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode outbound message: {e}");
                continue;
            }
        };
        debug!(%line, "Sending");

        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        if rx.is_empty() {
            writer.flush().await?;
        }
    }

    writer.flush().await?;
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mk_protocol::ipc::Response;

    #[tokio::test]
    async fn test_reader_skips_blank_lines_and_drops_fragment() {
        let input: &[u8] = b"first\n\n   \r\nsecond\r\nunterminated";
        let mut reader = LineReader::new(input);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let input: &[u8] = b"{\"id\":\"0123456789\"}\nok\n0123456789abcdef";
        let mut reader = LineReader::with_max_line(input, 8);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("ok"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_waits_for_full_line() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = LineReader::new(server);

        let read = tokio::spawn(async move { reader.next_line().await });
        client.write_all(b"{\"id\":").await.unwrap();
        tokio::task::yield_now().await;
        assert!(!read.is_finished());

        client.write_all(b"\"1\"}\n").await.unwrap();
        let line = read.await.unwrap().unwrap();
        assert_eq!(line.as_deref(), Some(r#"{"id":"1"}"#));
    }

    #[tokio::test]
    async fn test_writer_emits_one_line_per_message_in_order() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (outbound, handle) = spawn_writer(client);

        assert!(outbound.send(Response::success("1", None)));
        assert!(outbound.send(Response::failure("2", "ActionError: boom")));
        drop(outbound);
        handle.await.unwrap().unwrap();

        // The write half is shut down, so reading to the end terminates.
        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(
            written,
            "{\"id\":\"1\",\"success\":true}\n{\"id\":\"2\",\"success\":false,\"error\":\"ActionError: boom\"}\n"
        );
    }
}
