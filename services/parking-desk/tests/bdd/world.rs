//! BDD test world for the parking desk

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cucumber::World;
use parking_desk::actions::Dispatcher;
use parking_desk::api::BackendApi;
use parking_desk::capture::{Frame, FrameSource};
use parking_desk::config::{BackendConfig, SyncConfig};
use parking_desk::io::{HttpClient, HttpResponse};
use parking_desk::poller::{Poller, TickOutcome};
use parking_desk::recognition::Recognizer;
use parking_desk::state::{new_state_handle, Notice, StateHandle};
use parking_desk::sync::SyncClient;
use parking_desk::table::ReconcileReport;
use parking_desk::transport::WebSocketConnectionFactory;
use parking_desk::DeskError;
use tokio::sync::Semaphore;

pub const BASE_URL: &str = "http://parking.test";

/// Backend double answering canned responses keyed by `"METHOD /path"`.
///
/// Every request is recorded; unknown routes answer 404.
#[derive(Debug, Default)]
pub struct FakeBackend {
    responses: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn respond(&self, route: &str, status: u16, body: &str) {
        self.responses.lock().unwrap().insert(
            route.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn answer(&self, method: &str, url: &str) -> HttpResponse {
        let path = url.strip_prefix(BASE_URL).unwrap_or(url);
        let route = format!("{} {}", method, path);
        self.requests.lock().unwrap().push(route.clone());
        self.responses
            .lock()
            .unwrap()
            .get(&route)
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                body: r#"{"error": "not found"}"#.to_string(),
            })
    }
}

#[async_trait]
impl HttpClient for FakeBackend {
    async fn get(&self, url: &str) -> parking_desk::Result<HttpResponse> {
        Ok(self.answer("GET", url))
    }

    async fn get_bytes(&self, url: &str) -> parking_desk::Result<Vec<u8>> {
        Ok(self.answer("GET", url).body.into_bytes())
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
    ) -> parking_desk::Result<HttpResponse> {
        Ok(self.answer("POST", url))
    }

    async fn post_file(
        &self,
        url: &str,
        _field: &str,
        _file_name: &str,
        _mime: &str,
        _bytes: Vec<u8>,
    ) -> parking_desk::Result<HttpResponse> {
        Ok(self.answer("POST", url))
    }

    async fn delete(&self, url: &str) -> parking_desk::Result<HttpResponse> {
        Ok(self.answer("DELETE", url))
    }
}

/// Frame source that always has the same still image
#[derive(Debug)]
pub struct StillFrameSource;

#[async_trait]
impl FrameSource for StillFrameSource {
    async fn open(&self) -> parking_desk::Result<()> {
        Ok(())
    }

    async fn latest_frame(&self) -> parking_desk::Result<Frame> {
        Ok(Frame::jpeg(vec![0xff, 0xd8, 0xff, 0xd9]))
    }
}

/// What the recognizer answers once it is allowed to finish
#[derive(Debug, Clone)]
pub enum RecognizerReply {
    Plate(String),
    Nothing,
    Failure,
}

/// Recognizer that blocks until released and counts concurrent calls
#[derive(Debug)]
pub struct GatedRecognizer {
    reply: RecognizerReply,
    gate: Semaphore,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GatedRecognizer {
    pub fn new(reply: RecognizerReply, open: bool) -> Self {
        Self {
            reply,
            gate: Semaphore::new(usize::from(open)),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for GatedRecognizer {
    async fn recognize(&self, _frame: Frame) -> parking_desk::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        drop(permit);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.reply {
            RecognizerReply::Plate(plate) => Ok(Some(plate.clone())),
            RecognizerReply::Nothing => Ok(None),
            RecognizerReply::Failure => Err(DeskError::Recognition("status 500".to_string())),
        }
    }
}

#[derive(Debug, Default, World)]
pub struct DeskWorld {
    // Backend and actions
    pub backend: Option<Arc<FakeBackend>>,
    pub dispatcher: Option<Arc<Dispatcher>>,
    pub last_notice: Option<Notice>,

    // Reconciliation
    pub sync: Option<Arc<SyncClient>>,
    pub last_report: Option<ReconcileReport>,
    pub row_order_before: Option<Vec<u64>>,

    // Recognition polling
    pub recognizer: Option<Arc<GatedRecognizer>>,
    pub poller: Option<Poller>,
    pub tick_outcomes: Vec<TickOutcome>,
}

impl DeskWorld {
    /// Dispatcher wired to the fake backend, created on first use
    pub fn dispatcher(&mut self) -> Arc<Dispatcher> {
        if let Some(dispatcher) = &self.dispatcher {
            return Arc::clone(dispatcher);
        }
        let backend = self.backend();
        let config = BackendConfig {
            base_url: BASE_URL.to_string(),
            ..BackendConfig::default()
        };
        let api = Arc::new(BackendApi::new(&config, backend));
        let dispatcher = Arc::new(Dispatcher::new(api, new_state_handle(20)));
        self.dispatcher = Some(Arc::clone(&dispatcher));
        dispatcher
    }

    pub fn backend(&mut self) -> Arc<FakeBackend> {
        Arc::clone(self.backend.get_or_insert_with(Default::default))
    }

    /// Push channel client sharing the dispatcher's state; never connected
    pub fn sync_client(&mut self) -> Arc<SyncClient> {
        if let Some(sync) = &self.sync {
            return Arc::clone(sync);
        }
        let sync = Arc::new(SyncClient::new(
            "ws://parking.test/socket.io/?EIO=4&transport=websocket",
            SyncConfig::default(),
            Arc::new(WebSocketConnectionFactory::new()),
            self.state(),
        ));
        self.sync = Some(Arc::clone(&sync));
        sync
    }

    pub fn state(&mut self) -> StateHandle {
        Arc::clone(self.dispatcher().state())
    }
}
