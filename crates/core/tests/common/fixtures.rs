//! Test fixtures: helpers wired to a mock desktop.

use mk_core::client::HelperClient;
use mk_core::helper::overlay::Overlay;
use mk_core::helper::recorder::RecorderCell;
use mk_core::helper::transport::LineReader;
use mk_core::helper::HelperServer;
use mk_core::platform::MockDesktop;
use mk_protocol::codec::{decode, encode};
use mk_protocol::config_models::HelperSettings;
use mk_protocol::ipc::{Command, EventMessage, Message, Response};
use mk_protocol::recorder_models::RecorderMode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// How long a test waits for a single line before giving up.
const LINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings with a short default wait so timeouts finish quickly.
#[allow(dead_code)]
pub fn fast_settings() -> HelperSettings {
    HelperSettings {
        poll_interval_ms: 10,
        default_timeout_ms: 200,
    }
}

/// A helper serving raw lines, for tests that speak the wire format directly.
#[allow(dead_code)]
pub struct RawHelper {
    pub mock: Arc<MockDesktop>,
    pub input: DuplexStream,
    pub output: LineReader<DuplexStream>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

#[allow(dead_code)]
impl RawHelper {
    pub fn start(settings: HelperSettings) -> Self {
        let mock = Arc::new(MockDesktop::default());
        let server = HelperServer::new(mock.clone(), settings);

        let (input, server_in) = tokio::io::duplex(8192);
        let (server_out, output) = tokio::io::duplex(8192);
        let task = tokio::spawn(server.serve(server_in, server_out));

        Self {
            mock,
            input,
            output: LineReader::new(output),
            task,
        }
    }

    pub async fn send_line(&mut self, line: &str) {
        self.input
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    pub async fn send(&mut self, id: &str, command: Command) {
        let request = command.into_request(id).unwrap();
        let line = encode(&Message::Request(request)).unwrap();
        self.send_line(&line).await;
    }

    /// Next raw line written by the helper.
    pub async fn next_line(&mut self) -> String {
        tokio::time::timeout(LINE_TIMEOUT, self.output.next_line())
            .await
            .expect("helper did not write a line in time")
            .unwrap()
            .expect("helper output closed")
    }

    pub async fn next_response(&mut self) -> Response {
        match decode(&self.next_line().await).unwrap() {
            Message::Response(response) => response,
            other => panic!("Expected response, got {other:?}"),
        }
    }

    pub async fn next_event(&mut self) -> EventMessage {
        match decode(&self.next_line().await).unwrap() {
            Message::Event(event) => event,
            other => panic!("Expected event, got {other:?}"),
        }
    }

    /// Close the helper's input and wait for it to stop.
    pub async fn close(self) -> anyhow::Result<()> {
        drop(self.input);
        tokio::time::timeout(LINE_TIMEOUT, self.task)
            .await
            .expect("helper did not stop after input closed")
            .unwrap()
    }
}

/// Poll `condition` until it holds. Fails the test after the line timeout.
#[allow(dead_code)]
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(LINE_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    if polled.is_err() {
        panic!("timed out waiting for {what}");
    }
}

/// A client connected to an in-process helper over a mock desktop, with
/// the helper's recorder mode and overlay visible to the test.
#[allow(dead_code)]
pub struct Connected {
    pub mock: Arc<MockDesktop>,
    pub client: Arc<HelperClient>,
    pub recorder: RecorderCell,
    pub overlay: Arc<Overlay>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

#[allow(dead_code)]
pub fn connected_client(settings: HelperSettings) -> Connected {
    let mock = Arc::new(MockDesktop::default());
    let server = HelperServer::new(mock.clone(), settings);
    let recorder = server.router().recorder().clone();
    let overlay = server.router().overlay().clone();
    let (client, task) = HelperClient::in_process(server);
    Connected {
        mock,
        client: Arc::new(client),
        recorder,
        overlay,
        task,
    }
}

#[allow(dead_code)]
impl Connected {
    /// Wait until the helper has applied `mode`.
    pub async fn mode_becomes(&self, mode: RecorderMode) {
        eventually("recorder mode", || self.recorder.get() == mode).await;
    }

    /// Wait until the helper shows or hides its magnifier.
    pub async fn magnifier_becomes(&self, shown: bool) {
        eventually("magnifier", || self.overlay.magnifier_visible() == shown).await;
    }
}
