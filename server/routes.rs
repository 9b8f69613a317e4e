use std::io::{Cursor, Read};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use neurite::{Error, Resource};

use crate::handlers;
use crate::state::SharedState;
use crate::util::form::split_url;

pub type JsonResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn json_header() -> Header {
    Header::from_bytes(b"Content-Type", b"application/json").unwrap()
}

pub fn json_response<T: Serialize>(status: u16, body: &T) -> JsonResponse {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => return error_response(&Error::Io(e.into())),
    };
    let len = bytes.len();
    Response::new(StatusCode(status), vec![json_header()], Cursor::new(bytes), Some(len), None)
}

/// Client-facing message for `err`, pointing at the route that fixes it
/// where there is one.
pub fn detail(err: &Error) -> String {
    match err {
        Error::Unavailable(Resource::Network) => format!("{err}, use POST /network/create first"),
        _ => err.to_string(),
    }
}

/// `{"detail": ...}` with the status the error maps to.
pub fn error_response(err: &Error) -> JsonResponse {
    let status = err.status();
    if status >= 500 {
        warn!("{err}");
    } else {
        debug!("{err}");
    }
    let bytes = json!({ "detail": detail(err) }).to_string().into_bytes();
    let len = bytes.len();
    Response::new(StatusCode(status), vec![json_header()], Cursor::new(bytes), Some(len), None)
}

pub fn respond<T: Serialize>(status: u16, result: neurite::Result<T>) -> JsonResponse {
    match result {
        Ok(body) => json_response(status, &body),
        Err(e) => error_response(&e),
    }
}

pub fn not_found() -> JsonResponse {
    json_response(404, &json!({ "detail": "Not Found" }))
}

/// Reads and deserializes a JSON request body.
pub fn read_json<T: DeserializeOwned>(request: &mut Request) -> neurite::Result<T> {
    let mut body = String::new();
    request.as_reader().read_to_string(&mut body)?;
    serde_json::from_str(&body).map_err(|e| Error::InvalidInput(format!("invalid request body: {e}")))
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Dispatches incoming requests to the appropriate handler.
///
/// All handlers except SSE receive a `&mut Request` so that the dispatcher
/// retains ownership and responds at the end. The SSE handler takes ownership
/// to stream for the whole training run.
pub fn dispatch(mut request: Request, state: SharedState) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let (path, query) = split_url(&url);
    debug!("{} {}", method, url);

    if method == Method::Post && path == "/network/train" {
        handlers::train_sse::handle(request, state);
        return;
    }

    let response = match (method, path) {
        (Method::Get, "/healthz") => handlers::health::handle(&state),

        // ── Network ──────────────────────────────────────────────────────
        (Method::Post, "/network/create")      => handlers::network::handle_create(&mut request, &state),
        (Method::Get,  "/network/state")       => handlers::network::handle_state(&state),
        (Method::Post, "/network/predict")     => handlers::network::handle_predict(&mut request, &state),
        (Method::Post, "/network/activations") => handlers::network::handle_activations(&mut request, &state),
        (Method::Post, "/network/save")        => handlers::network::handle_save(&mut request, &state),
        (Method::Post, "/network/load")        => handlers::network::handle_load(&mut request, &state),

        // ── Dataset ──────────────────────────────────────────────────────
        (Method::Get, "/mnist/samples") => handlers::mnist::handle_samples(query, &state),

        _ => not_found(),
    };

    let _ = request.respond(response);
}
