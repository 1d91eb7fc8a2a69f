//! Helper server loop.
//!
//! Reads requests line by line and answers each one exactly once.
//! `setRecorderState` is handled on the read loop itself so mode changes
//! keep their arrival order. Every other request runs on its own task, so
//! a long pixel wait never delays faster requests. At end of input all
//! in-flight handlers are aborted, queued output is flushed and the loop
//! returns.

use crate::helper::error::HelperError;
use crate::helper::listener::InputListener;
use crate::helper::overlay::Overlay;
use crate::helper::recorder::RecorderCell;
use crate::helper::router::Router;
use crate::helper::transport::{spawn_writer, LineReader, Outbound};
use crate::platform::Desktop;
use anyhow::{Context, Result};
use mk_protocol::codec::decode;
use mk_protocol::config_models::HelperSettings;
use mk_protocol::ipc::{Command, Message, Response};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The automation helper.
pub struct HelperServer {
    desktop: Arc<dyn Desktop>,
    router: Router,
}

impl HelperServer {
    /// Create a helper with a fresh recorder mode (`idle`) and a hidden overlay.
    pub fn new(desktop: Arc<dyn Desktop>, settings: HelperSettings) -> Self {
        let router = Router::new(
            desktop.clone(),
            RecorderCell::new(),
            Arc::new(Overlay::new()),
            settings,
        );
        Self { desktop, router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serve on the process's standard input and output.
    pub async fn serve_stdio(self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests from `reader`, writing responses and events to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport faults: a failed read or a
    /// failed write. Malformed lines are logged and answered or dropped.
    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(desktop = self.desktop.name(), "Helper started");

        let (outbound, writer_task) = spawn_writer(writer);
        let listener_task = self.start_listener(outbound.clone());

        let mut lines = LineReader::new(reader);
        let mut handlers = JoinSet::new();

        let read_result = loop {
            while handlers.try_join_next().is_some() {}

            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => {
                    error!("Failed to read from orchestrator: {e}");
                    break Err(e);
                }
            };
            debug!(%line, "Received");

            match decode(&line) {
                Ok(Message::Request(request)) => match Command::try_from(&request) {
                    Ok(command @ Command::SetRecorderState(_)) => {
                        outbound.send(self.router.respond(request.id, command).await);
                    }
                    Ok(command) => {
                        let router = self.router.clone();
                        let outbound = outbound.clone();
                        handlers.spawn(async move {
                            let response = router.respond(request.id, command).await;
                            outbound.send(response);
                        });
                    }
                    Err(e) => reject(&outbound, request.id, e.into()),
                },
                Ok(other) => warn!(?other, "Ignoring non-request message from orchestrator"),
                Err(e) => match e.request_id().map(str::to_owned) {
                    Some(id) => reject(&outbound, id, e.into()),
                    None => warn!("Dropping undecodable line: {e}"),
                },
            }
        };

        info!(in_flight = handlers.len(), "Input closed, shutting down");
        handlers.abort_all();
        while handlers.join_next().await.is_some() {}

        if let Some(task) = listener_task {
            task.abort();
            let _ = task.await;
        }
        drop(outbound);

        let write_result = writer_task.await.context("Writer task panicked")?;
        read_result.context("Failed to read from orchestrator")?;
        write_result.context("Failed to write to orchestrator")?;

        info!("Helper stopped");
        Ok(())
    }

    fn start_listener(&self, outbound: Outbound) -> Option<tokio::task::JoinHandle<()>> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        if let Err(e) = self.desktop.listen(raw_tx) {
            warn!("Input listener unavailable, no input events will be sent: {e}");
            return None;
        }

        let listener = InputListener::new(
            self.desktop.clone(),
            self.router.recorder().clone(),
            self.router.overlay().clone(),
            outbound,
        );
        Some(tokio::spawn(listener.run(raw_rx)))
    }
}

/// Answer a request that never reached a handler.
fn reject(outbound: &Outbound, id: String, error: HelperError) {
    warn!(%id, "Rejected request: {error}");
    outbound.send(Response::failure(id, error.to_string()));
}
