//! Orchestrator-side connection to the helper.
//!
//! The client allocates correlation ids, matches each Response to the
//! request waiting for it and forwards Events on a separate channel. When
//! the helper's output closes, every request still waiting fails with
//! [`ClientError::Disconnected`].

use crate::config::resolve::HelperCommand;
use crate::helper::transport::{spawn_writer, LineReader, Outbound};
use crate::helper::HelperServer;
use mk_protocol::codec::decode;
use mk_protocol::geometry::{Point, Rgb};
use mk_protocol::ipc::{
    ClickParams, Command, HelperEvent, KeypressParams, Message, Outcome, Permissions,
    PixelColorParams, PixelColorResult, ShowOverlayParams, WaitPixelStateParams,
    WaitPixelZoneParams, WaitResult,
};
use mk_protocol::recorder_models::RecorderMode;
use mk_protocol::scenario_models::{Modifier, MouseButton};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const IN_PROCESS_BUFFER: usize = 64 * 1024;

/// Errors seen by the orchestrator when talking to the helper.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The helper's output closed before the response arrived.
    #[error("Helper disconnected before responding")]
    Disconnected,

    /// The helper answered with an error Response.
    #[error("{0}")]
    Remote(String),

    #[error("Helper I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// A success Response carried a result of the wrong shape.
    #[error("Unexpected result for {method}: {reason}")]
    UnexpectedResult { method: &'static str, reason: String },

    #[error("Failed to start helper {program}: {source}")]
    Spawn { program: PathBuf, source: io::Error },
}

type Reply = Result<Option<Value>, ClientError>;

#[derive(Default)]
struct Pending {
    closed: bool,
    waiters: HashMap<String, oneshot::Sender<Reply>>,
}

#[derive(Clone, Default)]
struct PendingTable(Arc<Mutex<Pending>>);

impl PendingTable {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a waiter, unless the connection is already closed.
    fn register(&self, id: &str) -> Option<oneshot::Receiver<Reply>> {
        let mut pending = self.lock();
        if pending.closed {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        pending.waiters.insert(id.to_string(), tx);
        Some(rx)
    }

    fn resolve(&self, id: &str, reply: Reply) -> bool {
        match self.lock().waiters.remove(id) {
            Some(tx) => {
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    fn forget(&self, id: &str) {
        self.lock().waiters.remove(id);
    }

    /// Mark the connection closed and fail everything still waiting.
    fn close(&self) -> usize {
        let waiters = {
            let mut pending = self.lock();
            pending.closed = true;
            std::mem::take(&mut pending.waiters)
        };
        let count = waiters.len();
        for (_, tx) in waiters {
            let _ = tx.send(Err(ClientError::Disconnected));
        }
        count
    }
}

/// A connection to one helper process.
pub struct HelperClient {
    outbound: Mutex<Option<Outbound>>,
    pending: PendingTable,
    events: Mutex<Option<mpsc::UnboundedReceiver<HelperEvent>>>,
    reader_task: JoinHandle<()>,
    writer_task: Mutex<Option<JoinHandle<io::Result<()>>>>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl HelperClient {
    /// Start the helper as a subprocess and connect to its stdio.
    ///
    /// The helper's stderr is inherited so its logs reach the terminal.
    pub fn spawn(command: &HelperCommand) -> Result<Self, ClientError> {
        let mut child = ProcessCommand::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClientError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let missing = |what: &str| ClientError::Spawn {
            program: command.program.clone(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, format!("no {what} pipe")),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        info!(program = %command.program.display(), pid = ?child.id(), "Helper spawned");
        let mut client = Self::connect(stdout, stdin);
        client.child = tokio::sync::Mutex::new(Some(child));
        Ok(client)
    }

    /// Connect over an existing pair of streams.
    ///
    /// # Arguments
    ///
    /// * `reader` - The helper's output (responses and events)
    /// * `writer` - The helper's input (requests)
    pub fn connect<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, writer_task) = spawn_writer(writer);
        let pending = PendingTable::default();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(read_loop(reader, pending.clone(), events_tx));

        Self {
            outbound: Mutex::new(Some(outbound)),
            pending,
            events: Mutex::new(Some(events_rx)),
            reader_task,
            writer_task: Mutex::new(Some(writer_task)),
            child: tokio::sync::Mutex::new(None),
        }
    }

    /// Run `server` on a task in this process and connect to it.
    ///
    /// The server stops when the client shuts down or is dropped.
    pub fn in_process(server: HelperServer) -> (Self, JoinHandle<anyhow::Result<()>>) {
        let (client_io, server_io) = tokio::io::duplex(IN_PROCESS_BUFFER);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, client_write) = tokio::io::split(client_io);
        let server_task = tokio::spawn(server.serve(server_read, server_write));
        (Self::connect(client_read, client_write), server_task)
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<HelperEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn outbound(&self) -> Option<Outbound> {
        self.outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Send a command and wait for its response.
    ///
    /// Returns the `result` payload, `None` for a void success.
    pub async fn request(&self, command: Command) -> Result<Option<Value>, ClientError> {
        let id = Uuid::new_v4().to_string();
        let method = command.method();
        let request = command.into_request(id.clone())?;

        let reply = self.pending.register(&id).ok_or(ClientError::Disconnected)?;
        let sent = self
            .outbound()
            .map(|outbound| outbound.send(request))
            .unwrap_or(false);
        if !sent {
            self.pending.forget(&id);
            return Err(ClientError::Disconnected);
        }
        debug!(%id, method, "Request sent");

        reply.await.map_err(|_| ClientError::Disconnected)?
    }

    async fn request_as<T: DeserializeOwned>(&self, command: Command) -> Result<T, ClientError> {
        let method = command.method();
        let value = self
            .request(command)
            .await?
            .ok_or_else(|| ClientError::UnexpectedResult {
                method,
                reason: "missing result".to_string(),
            })?;
        serde_json::from_value(value).map_err(|e| ClientError::UnexpectedResult {
            method,
            reason: e.to_string(),
        })
    }

    async fn request_void(&self, command: Command) -> Result<(), ClientError> {
        self.request(command).await.map(|_| ())
    }

    pub async fn check_permissions(&self) -> Result<Permissions, ClientError> {
        self.request_as(Command::CheckPermissions).await
    }

    pub async fn show_recorder_overlay(&self, position: Option<Point>) -> Result<(), ClientError> {
        self.request_void(Command::ShowRecorderOverlay(ShowOverlayParams { position }))
            .await
    }

    pub async fn hide_recorder_overlay(&self) -> Result<(), ClientError> {
        self.request_void(Command::HideRecorderOverlay).await
    }

    pub async fn set_recorder_state(&self, mode: RecorderMode) -> Result<(), ClientError> {
        self.request_void(Command::SetRecorderState(mode)).await
    }

    pub async fn show_magnifier(&self) -> Result<(), ClientError> {
        self.request_void(Command::ShowMagnifier).await
    }

    pub async fn hide_magnifier(&self) -> Result<(), ClientError> {
        self.request_void(Command::HideMagnifier).await
    }

    pub async fn execute_click(&self, position: Point, button: MouseButton) -> Result<(), ClientError> {
        self.request_void(Command::ExecuteClick(ClickParams { position, button }))
            .await
    }

    pub async fn execute_keypress(
        &self,
        key: impl Into<String>,
        modifiers: BTreeSet<Modifier>,
    ) -> Result<(), ClientError> {
        self.request_void(Command::ExecuteKeypress(KeypressParams {
            key: key.into(),
            modifiers,
        }))
        .await
    }

    pub async fn get_pixel_color(&self, position: Point) -> Result<Rgb, ClientError> {
        let result: PixelColorResult = self
            .request_as(Command::GetPixelColor(PixelColorParams { position }))
            .await?;
        Ok(result.color)
    }

    pub async fn wait_for_pixel_state(
        &self,
        params: WaitPixelStateParams,
    ) -> Result<WaitResult, ClientError> {
        self.request_as(Command::WaitForPixelState(params)).await
    }

    pub async fn wait_for_pixel_zone(
        &self,
        params: WaitPixelZoneParams,
    ) -> Result<WaitResult, ClientError> {
        self.request_as(Command::WaitForPixelZone(params)).await
    }

    /// Close the helper's input and wait for it to exit.
    ///
    /// Requests still in flight fail with [`ClientError::Disconnected`]
    /// once the helper closes its output.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let writer_task = self
            .writer_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = writer_task {
            match task.await {
                Ok(result) => result?,
                Err(e) => warn!("Request writer task failed: {e}"),
            }
        }

        if let Some(mut child) = self.child.lock().await.take() {
            let status = child.wait().await?;
            info!(%status, "Helper exited");
        }
        Ok(())
    }
}

impl Drop for HelperClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop<R>(
    reader: R,
    pending: PendingTable,
    events_tx: mpsc::UnboundedSender<HelperEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = LineReader::new(reader);

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read from helper: {e}");
                break;
            }
        };

        match decode(&line) {
            Ok(Message::Response(response)) => {
                let reply = match response.outcome {
                    Outcome::Success(result) => Ok(result),
                    Outcome::Failure(error) => Err(ClientError::Remote(error)),
                };
                if !pending.resolve(&response.id, reply) {
                    warn!(id = %response.id, "Response for unknown request id");
                }
            }
            Ok(Message::Event(message)) => match HelperEvent::try_from(&message) {
                Ok(event) => {
                    debug!(event = event.name(), "Event received");
                    let _ = events_tx.send(event);
                }
                Err(e) => warn!(event = %message.event, "Ignoring unknown event: {e}"),
            },
            Ok(Message::Request(request)) => {
                warn!(method = %request.method, "Ignoring request sent by helper");
            }
            Err(e) => warn!("Dropping undecodable line from helper: {e}"),
        }
    }

    let failed = pending.close();
    info!(failed, "Helper output closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mk_protocol::codec::encode;
    use mk_protocol::geometry::Rect;
    use mk_protocol::ipc::{Request, Response};
    use tokio::io::{AsyncWriteExt, DuplexStream};

    /// A fake helper: the test reads requests from `requests` and writes
    /// lines to `output`.
    fn pair() -> (HelperClient, LineReader<DuplexStream>, DuplexStream) {
        let (client_in, helper_out) = tokio::io::duplex(4096);
        let (client_out, helper_in) = tokio::io::duplex(4096);
        let client = HelperClient::connect(client_in, client_out);
        (client, LineReader::new(helper_in), helper_out)
    }

    async fn next_request(lines: &mut LineReader<DuplexStream>) -> Request {
        let line = lines.next_line().await.unwrap().unwrap();
        match decode(&line).unwrap() {
            Message::Request(request) => request,
            other => panic!("Expected request, got {other:?}"),
        }
    }

    async fn reply(output: &mut DuplexStream, response: Response) {
        let line = encode(&Message::Response(response)).unwrap();
        output.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_responses_are_matched_by_id() {
        let (client, mut requests, mut output) = pair();
        let client = Arc::new(client);

        let slow = {
            let client = client.clone();
            tokio::spawn(async move { client.check_permissions().await })
        };
        let first = next_request(&mut requests).await;

        let fast = {
            let client = client.clone();
            tokio::spawn(async move { client.hide_magnifier().await })
        };
        let second = next_request(&mut requests).await;
        assert_ne!(first.id, second.id);

        reply(&mut output, Response::success(second.id, None)).await;
        fast.await.unwrap().unwrap();

        let permissions = serde_json::json!({"accessibility": true, "screenCapture": false});
        reply(&mut output, Response::success(first.id, Some(permissions))).await;
        let permissions = slow.await.unwrap().unwrap();
        assert!(permissions.accessibility);
        assert!(!permissions.screen_capture);
    }

    #[tokio::test]
    async fn test_remote_error_is_surfaced() {
        let (client, mut requests, mut output) = pair();
        let client = Arc::new(client);

        let call = {
            let client = client.clone();
            tokio::spawn(async move { client.execute_keypress("hyper", BTreeSet::new()).await })
        };
        let request = next_request(&mut requests).await;
        assert_eq!(request.method, "executeKeypress");
        reply(
            &mut output,
            Response::failure(request.id, "ActionError: unknown key name 'hyper'"),
        )
        .await;

        match call.await.unwrap() {
            Err(ClientError::Remote(error)) => assert!(error.starts_with("ActionError:")),
            other => panic!("Expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_in_flight_requests_fail_when_helper_closes() {
        let (client, mut requests, output) = pair();
        let client = Arc::new(client);

        let call = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .wait_for_pixel_state(WaitPixelStateParams {
                        position: Point::new(1, 1),
                        color: Rgb::new(0, 0, 0),
                        threshold: 0.0,
                        timeout_ms: None,
                    })
                    .await
            })
        };
        next_request(&mut requests).await;
        drop(output);

        assert!(matches!(call.await.unwrap(), Err(ClientError::Disconnected)));
        assert!(matches!(
            client.show_magnifier().await,
            Err(ClientError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_events_are_forwarded_in_order() {
        let (client, _requests, mut output) = pair();
        let mut events = client.events().unwrap();
        assert!(client.events().is_none());

        for event in [
            HelperEvent::ZoneSelected {
                rect: Rect::new(0, 0, 2, 2),
            },
            HelperEvent::OverlayClosed,
        ] {
            let line = encode(&Message::Event(event.to_message().unwrap())).unwrap();
            output.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }

        assert!(matches!(events.recv().await, Some(HelperEvent::ZoneSelected { .. })));
        assert_eq!(events.recv().await, Some(HelperEvent::OverlayClosed));
    }
}
