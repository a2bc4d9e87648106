//! In-process stand-in for the upload/process service.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use multer::Multipart;
use roads_client::{Config, MediaItem, ParameterField, ParameterForm, UploadProcessOrchestrator};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::Notify;

#[derive(Clone, Debug)]
pub struct ReceivedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    pub fn json(status: StatusCode, value: Value) -> Self {
        Self {
            status,
            body: value.to_string(),
        }
    }

    pub fn raw(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, [(CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

/// What the client did while talking to the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub busy: bool,
    pub phase: &'static str,
}

pub struct MockState {
    upload_reply: Reply,
    process_reply: Reply,
    gate: Option<Arc<Notify>>,
    pub entered_upload: Notify,
    pub upload_calls: AtomicUsize,
    pub process_calls: AtomicUsize,
    pub uploads: Mutex<Vec<ReceivedFile>>,
    pub process_bodies: Mutex<Vec<Value>>,
    pub observations: Mutex<Vec<Observation>>,
    watched: Mutex<Option<UploadProcessOrchestrator>>,
}

impl MockState {
    fn observe(&self) {
        if let Some(orchestrator) = self.watched.lock().unwrap().as_ref() {
            self.observations.lock().unwrap().push(Observation {
                busy: orchestrator.is_busy(),
                phase: orchestrator.phase().label(),
            });
        }
    }
}

pub struct MockService {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockService {
    pub async fn start(upload_reply: Reply, process_reply: Reply) -> Self {
        Self::start_with_gate(upload_reply, process_reply, None).await
    }

    /// Upload requests wait on `gate` before answering.
    pub async fn start_with_gate(
        upload_reply: Reply,
        process_reply: Reply,
        gate: Option<Arc<Notify>>,
    ) -> Self {
        let state = Arc::new(MockState {
            upload_reply,
            process_reply,
            gate,
            entered_upload: Notify::new(),
            upload_calls: AtomicUsize::new(0),
            process_calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            process_bodies: Mutex::new(Vec::new()),
            observations: Mutex::new(Vec::new()),
            watched: Mutex::new(None),
        });

        let app = Router::new()
            .route("/upload", post(upload_handler))
            .route("/process", post(process_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            api_base: self.base_url.clone(),
            ..Config::default()
        }
    }

    pub fn orchestrator(&self) -> UploadProcessOrchestrator {
        UploadProcessOrchestrator::new(&self.config())
    }

    /// Records busy flag and phase of `orchestrator` on every request.
    pub fn watch(&self, orchestrator: &UploadProcessOrchestrator) {
        *self.state.watched.lock().unwrap() = Some(orchestrator.clone());
    }

    pub fn upload_calls(&self) -> usize {
        self.state.upload_calls.load(Ordering::SeqCst)
    }

    pub fn process_calls(&self) -> usize {
        self.state.process_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<ReceivedFile> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn process_bodies(&self) -> Vec<Value> {
        self.state.process_bodies.lock().unwrap().clone()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.state.observations.lock().unwrap().clone()
    }
}

async fn upload_handler(State(state): State<Arc<MockState>>, request: Request) -> Response {
    state.upload_calls.fetch_add(1, Ordering::SeqCst);
    state.observe();
    state.entered_upload.notify_one();
    if let Some(gate) = &state.gate {
        gate.notified().await;
    }

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let boundary = match multer::parse_boundary(&content_type) {
        Ok(boundary) => boundary,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let mut multipart = Multipart::new(request.into_body().into_data_stream(), boundary);
    while let Ok(Some(field)) = multipart.next_field().await {
        let received = ReceivedFile {
            field: field.name().unwrap_or("").to_string(),
            file_name: field.file_name().unwrap_or("").to_string(),
            content_type: field.content_type().map(|m| m.to_string()),
            data: Vec::new(),
        };
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.uploads.lock().unwrap().push(ReceivedFile { data, ..received });
    }

    state.upload_reply.clone().into_response()
}

async fn process_handler(State(state): State<Arc<MockState>>, body: Bytes) -> Response {
    state.process_calls.fetch_add(1, Ordering::SeqCst);
    state.observe();

    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.process_bodies.lock().unwrap().push(value);

    state.process_reply.clone().into_response()
}

/// Address with nothing listening on it.
pub async fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn videos(names: &[&str]) -> Vec<MediaItem> {
    names
        .iter()
        .map(|name| MediaItem::new(*name, "video/mp4", format!("payload:{}", name).into_bytes()))
        .collect()
}

pub fn four_videos() -> Vec<MediaItem> {
    videos(&["north cam.mp4", "east.mp4", "south.mp4", "west.mp4"])
}

pub fn filled_form() -> ParameterForm {
    let mut form = ParameterForm::new();
    form.set_field(ParameterField::NoOfLanes, "3");
    form.set_field(ParameterField::PlatoonWeight, "1.5");
    form.set_field(ParameterField::IncomingDistance, "120");
    form.set_field(ParameterField::AverageSpeed, "0");
    form
}

pub fn upload_ok() -> Reply {
    Reply::json(
        StatusCode::OK,
        serde_json::json!({
            "message": "Files successfully uploaded",
            "files": ["video1.mp4", "video2.mp4", "video3.mp4", "video4.mp4"]
        }),
    )
}

pub const PROCESS_BODY: &str = r#"{
    "intersection": "A",
    "videos_processed": ["video2.mp4", "video1.mp4", "video4.mp4", "video3.mp4"],
    "results": {
        "video2.mp4": {"file_name": "video2.mp4", "t_clear": 14.2, "traffic_score": 61, "safety_penalty": 3, "green_wave_bonus": 5, "cps": 63.0},
        "video1.mp4": {"file_name": "video1.mp4", "t_clear": 9.8, "traffic_score": 40, "safety_penatly": 1.5, "green_wave_bonus": 2, "cps": 40.5},
        "video4.mp4": {"error": "decode failed"},
        "video3.mp4": {"file_name": "video3.mp4", "t_clear": 11, "traffic_score": 52, "green_wave_bonus": 4, "cps": 56.0, "frame_data": [{"frame": 0, "vehicles": 7}]}
    }
}"#;

pub fn process_ok() -> Reply {
    Reply::raw(StatusCode::OK, PROCESS_BODY)
}
