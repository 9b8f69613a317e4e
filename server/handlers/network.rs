use serde::Deserialize;
use serde_json::json;
use tiny_http::Request;

use neurite::{Activation, Error, Result};

use crate::routes::{error_response, read_json, respond, JsonResponse};
use crate::state::AppState;

fn default_activation() -> Activation {
    Activation::Sigmoid
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    sizes: Vec<usize>,
    #[serde(default = "default_activation")]
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct PixelsRequest {
    pixels: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ModelRequest {
    name: String,
}

/// Model names become file names inside the model directory.
fn checked_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!(
            "invalid model name {name:?}, use letters, digits, '-', '_' or '.'"
        )))
    }
}

// ---------------------------------------------------------------------------
// POST /network/create
// ---------------------------------------------------------------------------

pub fn handle_create(request: &mut Request, state: &AppState) -> JsonResponse {
    let result = read_json::<CreateRequest>(request)
        .and_then(|req| state.session.create_network(req.sizes, req.activation));
    respond(201, result)
}

// ---------------------------------------------------------------------------
// GET /network/state
// ---------------------------------------------------------------------------

pub fn handle_state(state: &AppState) -> JsonResponse {
    respond(200, state.session.network_state())
}

// ---------------------------------------------------------------------------
// POST /network/predict  and  POST /network/activations
// ---------------------------------------------------------------------------

pub fn handle_predict(request: &mut Request, state: &AppState) -> JsonResponse {
    let result = read_json::<PixelsRequest>(request).and_then(|req| state.session.predict(&req.pixels));
    respond(200, result)
}

pub fn handle_activations(request: &mut Request, state: &AppState) -> JsonResponse {
    let result = read_json::<PixelsRequest>(request).and_then(|req| state.session.activations(&req.pixels));
    respond(200, result)
}

// ---------------------------------------------------------------------------
// POST /network/save  and  POST /network/load
// ---------------------------------------------------------------------------

pub fn handle_save(request: &mut Request, state: &AppState) -> JsonResponse {
    let req = match read_json::<ModelRequest>(request) {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };
    let result = checked_name(&req.name).and_then(|name| {
        let path = state.config.model_path(name);
        state.session.save_model(&path)?;
        Ok(json!({
            "name": name,
            "path": path.display().to_string(),
            "metadata": state.session.last_run().map(|run| json!({
                "training_config": run.config,
                "final_accuracy": run.final_accuracy,
            })),
        }))
    });
    respond(200, result)
}

pub fn handle_load(request: &mut Request, state: &AppState) -> JsonResponse {
    let req = match read_json::<ModelRequest>(request) {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };
    let result = checked_name(&req.name).and_then(|name| {
        let (network, metadata) = state.session.load_model(state.config.model_path(name))?;
        Ok(json!({ "network": network, "metadata": metadata }))
    });
    respond(200, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_stay_inside_the_directory() {
        assert!(checked_name("mnist-30_v2").is_ok());
        assert!(checked_name("../etc/passwd").is_err());
        assert!(checked_name("a/b").is_err());
        assert!(checked_name(".hidden").is_err());
        assert!(checked_name("").is_err());
    }

    #[test]
    fn create_request_defaults_to_sigmoid() {
        let req: CreateRequest = serde_json::from_str(r#"{"sizes": [784, 30, 10]}"#).unwrap();
        assert_eq!(req.activation, Activation::Sigmoid);
        assert!(serde_json::from_str::<CreateRequest>(r#"{"sizes": [2, 2], "activation": "tanh"}"#).is_err());
    }
}
