//! HTTP relay between browser-style clients and the model provider.
//!
//! | Method | Path                   | Body in                                  | Body out            |
//! |--------|------------------------|------------------------------------------|---------------------|
//! | POST   | `/api/generate-image`  | `{prompt, imageBase64?, aspectRatio?}`   | `{image}`           |
//! | POST   | `/api/optimize-prompt` | `{prompt}`                               | `{optimizedPrompt}` |
//! | GET    | `/api/health`          |                                          | `{status, ...}`     |
//!
//! Failures answer `{error}` with a non-2xx status. Every response carries
//! `Access-Control-Allow-Origin: *`. Handlers run on rouille's worker
//! threads and share only the immutable [`RelayState`].

use std::io::Read;
use std::net::SocketAddr;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::Result;
use nanostudio_contracts::api::{
    ErrorResponse, GenerateImageRequest, GenerateImageResponse, HealthResponse,
    OptimizePromptRequest, OptimizePromptResponse, GENERATE_IMAGE_PATH, HEALTH_PATH,
    OPTIMIZE_PROMPT_PATH, PROMPT_REQUIRED,
};
use rouille::{Request, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::backend::{DirectBackend, StudioBackend};
use crate::config::{KeyRole, StudioConfig};

type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync + 'static>;

pub struct RelayState {
    backend: DirectBackend,
    body_limit_bytes: usize,
}

pub struct RelayServer {
    state: Arc<RelayState>,
}

impl RelayServer {
    pub fn new(backend: DirectBackend, body_limit_bytes: usize) -> Self {
        Self {
            state: Arc::new(RelayState {
                backend,
                body_limit_bytes,
            }),
        }
    }

    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        let backend = DirectBackend::from_config(config, KeyRole::Relay)?;
        if config.api_key(KeyRole::Relay).is_none() && backend.provider_name() == "gemini" {
            log::warn!("API_KEY is not set; provider calls will fail until it is configured");
        }
        Ok(Self::new(backend, config.body_limit_bytes))
    }

    pub fn bind(self, addr: &str) -> Result<BoundRelay> {
        let state = self.state;
        let handler: Handler = Box::new(move |request| handle_request(request, &state));
        let server = rouille::Server::new(addr, handler)
            .map_err(|err| anyhow::anyhow!("failed to bind relay on {addr}: {err}"))?;
        Ok(BoundRelay { server })
    }
}

pub struct BoundRelay {
    server: rouille::Server<Handler>,
}

impl BoundRelay {
    pub fn addr(&self) -> SocketAddr {
        self.server.server_addr()
    }

    /// Serves on the current thread until the process exits.
    pub fn run(self) {
        log::info!("Server running on http://{}", self.addr());
        self.server.run();
    }

    pub fn spawn(self) -> RunningRelay {
        let addr = self.addr();
        let (handle, stop) = self.server.stoppable();
        RunningRelay {
            addr,
            stop: Some(stop),
            handle: Some(handle),
        }
    }
}

/// A relay serving on a background thread; stops when dropped.
pub struct RunningRelay {
    addr: SocketAddr,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RunningRelay {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL clients append endpoint names to.
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RunningRelay {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

pub fn handle_request(request: &Request, state: &RelayState) -> Response {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    let response = route(request, state, &request_id);
    log::info!(
        "[{request_id}] {} {} -> {} ({} ms)",
        request.method(),
        request.url(),
        response.status_code,
        started.elapsed().as_millis()
    );
    response.with_additional_header("Access-Control-Allow-Origin", "*")
}

fn route(request: &Request, state: &RelayState, request_id: &Uuid) -> Response {
    if request.method() == "OPTIONS" {
        return Response::empty_204()
            .with_additional_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
            .with_additional_header("Access-Control-Allow-Headers", "Content-Type");
    }

    let url = request.url();
    match (url.as_str(), request.method()) {
        (GENERATE_IMAGE_PATH, "POST") => handle_generate(request, state, request_id),
        (OPTIMIZE_PROMPT_PATH, "POST") => handle_optimize(request, state, request_id),
        (HEALTH_PATH, "GET") => handle_health(state),
        (GENERATE_IMAGE_PATH | OPTIMIZE_PROMPT_PATH | HEALTH_PATH, _) => {
            error_response(405, "Method Not Allowed")
        }
        _ => error_response(404, "Not found"),
    }
}

fn handle_generate(request: &Request, state: &RelayState, request_id: &Uuid) -> Response {
    let body: GenerateImageRequest = match read_json_body(request, state.body_limit_bytes) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.prompt.trim().is_empty() {
        return error_response(400, PROMPT_REQUIRED);
    }
    match state.backend.generate_image(&body) {
        Ok(image) => Response::json(&GenerateImageResponse { image }),
        Err(err) => {
            log::error!("[{request_id}] Server generation error: {err:#}");
            upstream_error(&err)
        }
    }
}

fn handle_optimize(request: &Request, state: &RelayState, request_id: &Uuid) -> Response {
    let body: OptimizePromptRequest = match read_json_body(request, state.body_limit_bytes) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.prompt.trim().is_empty() {
        return error_response(400, PROMPT_REQUIRED);
    }
    match state.backend.optimize_prompt(&body.prompt) {
        Ok(optimized_prompt) => Response::json(&OptimizePromptResponse { optimized_prompt }),
        Err(err) => {
            log::error!("[{request_id}] Server optimization error: {err:#}");
            upstream_error(&err)
        }
    }
}

fn handle_health(state: &RelayState) -> Response {
    Response::json(&HealthResponse {
        status: "ok".to_string(),
        provider: state.backend.provider_name().to_string(),
        image_model: state.backend.image_model().to_string(),
        text_model: state.backend.text_model().to_string(),
    })
}

fn read_json_body<T: DeserializeOwned>(request: &Request, limit: usize) -> Result<T, Response> {
    let Some(body) = request.data() else {
        return Err(error_response(400, "Request body already consumed"));
    };
    let mut raw = Vec::new();
    if let Err(err) = body.take((limit as u64).saturating_add(1)).read_to_end(&mut raw) {
        return Err(error_response(400, &format!("Failed to read request body: {err}")));
    }
    if raw.len() > limit {
        return Err(error_response(
            413,
            &format!("Request body exceeds {} bytes", limit),
        ));
    }
    serde_json::from_slice(&raw)
        .map_err(|err| error_response(400, &format!("Invalid JSON: {err}")))
}

fn upstream_error(err: &anyhow::Error) -> Response {
    let message = format!("{err:#}");
    if message.trim().is_empty() {
        error_response(500, "Internal Server Error")
    } else {
        error_response(500, &message)
    }
}

fn error_response(status: u16, message: &str) -> Response {
    Response::json(&ErrorResponse::new(message)).with_status_code(status)
}
