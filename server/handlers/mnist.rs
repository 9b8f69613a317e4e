use serde_json::json;

use neurite::{Error, Partition, Result};

use crate::routes::{respond, JsonResponse};
use crate::state::AppState;
use crate::util::form::{parse_query, query_get};

const DEFAULT_COUNT: usize = 10;
const MAX_COUNT: usize = 100;

fn parse_count(raw: Option<&str>) -> Result<usize> {
    let count = match raw {
        None => return Ok(DEFAULT_COUNT),
        Some(raw) => raw.parse::<usize>().ok(),
    };
    count
        .filter(|c| (1..=MAX_COUNT).contains(c))
        .ok_or_else(|| Error::InvalidInput(format!("count must be between 1 and {MAX_COUNT}")))
}

// ---------------------------------------------------------------------------
// GET /mnist/samples?count=N&dataset=train|validation|test
// ---------------------------------------------------------------------------

pub fn handle_samples(query: &str, state: &AppState) -> JsonResponse {
    let pairs = parse_query(query);
    let result = parse_count(query_get(&pairs, "count")).and_then(|count| {
        let partition: Partition = query_get(&pairs, "dataset").unwrap_or("test").parse()?;
        let samples = state.session.samples(partition, count)?;
        Ok(json!({ "count": samples.len(), "samples": samples }))
    });
    respond(200, result)
}
