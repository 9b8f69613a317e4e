use serde_json::json;

use crate::routes::{json_response, JsonResponse};
use crate::state::AppState;

/// `GET /healthz`: answers even while a training run holds the network.
pub fn handle(state: &AppState) -> JsonResponse {
    let session = &state.session;
    json_response(
        200,
        &json!({
            "status": "ok",
            "network_loaded": session.has_network(),
            "dataset_loaded": session.dataset().is_some(),
            "training": session.is_training(),
        }),
    )
}
