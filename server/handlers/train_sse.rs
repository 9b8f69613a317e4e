use std::time::Duration;

use log::{info, warn};
use serde_json::json;
use tiny_http::Request;

use neurite::{StreamPoll, TrainingConfig, TrainingEvent};

use crate::routes::{error_response, read_json};
use crate::state::SharedState;
use crate::util::sse::{format_data, write_all, KEEP_ALIVE, SSE_HEAD};

/// Longest silence on the stream before a keep-alive comment is sent.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(500);

/// `POST /network/train`: Server-Sent Events handler.
///
/// Validation failures (no network, no dataset, a run already in progress,
/// a bad config) are answered as ordinary JSON errors. Otherwise this handler
/// consumes `request` (so it can call `into_writer`) and writes one
/// `data: <TrainingProgress>` frame per epoch, followed by
/// `data: {"status":"completed"}`, or `{"status":"failed","detail":...}` if the
/// worker died. Between epochs a `: ping` comment goes out every
/// [`KEEP_ALIVE_INTERVAL`].
///
/// A client that disconnects mid-run does not stop training.
pub fn handle(mut request: Request, state: SharedState) {
    let stream = read_json::<TrainingConfig>(&mut request)
        .and_then(|config| state.session.start_train(config));
    let mut stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = request.respond(error_response(&e));
            return;
        }
    };

    // tiny_http's `into_writer()` gives us the raw TCP stream so we can
    // write the HTTP head and then stream SSE frames directly.
    let mut writer = request.into_writer();
    if write_all(&mut writer, SSE_HEAD.as_bytes()).is_err() {
        return;
    }

    loop {
        let item = match stream.next_timeout(KEEP_ALIVE_INTERVAL) {
            StreamPoll::Event(item) => item,
            StreamPoll::Idle => {
                if write_all(&mut writer, KEEP_ALIVE.as_bytes()).is_err() {
                    info!("training client disconnected, run continues in the background");
                    return;
                }
                continue;
            }
            StreamPoll::Finished => return,
        };
        let frame = match item {
            Ok(TrainingEvent::Progress(progress)) => format_data(&progress),
            Ok(TrainingEvent::Completed) => format_data(&json!({ "status": "completed" })),
            Err(e) => format_data(&json!({ "status": "failed", "detail": e.to_string() })),
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("could not encode training event: {e}");
                continue;
            }
        };
        if write_all(&mut writer, frame.as_bytes()).is_err() {
            info!("training client disconnected, run continues in the background");
            return;
        }
    }
}
