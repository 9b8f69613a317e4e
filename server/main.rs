//! neurite server
//!
//! JSON and Server-Sent Events API around one `TrainingSession`: create a
//! network, stream an MNIST training run, query predictions while it trains,
//! save and load models.
//!
//! Run with:
//!   cargo run --bin server --release
//!
//! Configuration is read from the environment; see `config::ServerConfig`.

mod config;
mod handlers;
mod routes;
mod startup;
mod state;
mod util;

use std::io;
use std::sync::Arc;
use std::thread;

use log::{error, info};
use tiny_http::Server;

use neurite::MnistLoader;

use config::ServerConfig;
use state::{AppState, SharedState};

/// Loads MNIST off the request path; until it finishes, dataset routes
/// answer 503.
fn load_dataset(state: SharedState) {
    let loader = MnistLoader::new(&state.config.data_dir).with_base_url(state.config.mnist_base_url.clone());
    match loader.load() {
        Ok(mnist) => state.session.set_dataset(mnist),
        Err(e) => error!("MNIST unavailable, training disabled: {e}"),
    }
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr();
    let server = Server::http(&addr).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    info!("listening at http://{addr}");

    let state: SharedState = Arc::new(AppState::new(config));
    startup::load_default_model(&state);

    let loader_state = Arc::clone(&state);
    thread::Builder::new()
        .name("mnist-loader".into())
        .spawn(move || load_dataset(loader_state))?;

    // Each request is dispatched on its own thread so the SSE handler
    // (which blocks for the entire training duration) does not stall
    // predictions and health checks.
    for request in server.incoming_requests() {
        let state = Arc::clone(&state);
        thread::spawn(move || routes::dispatch(request, state));
    }
    Ok(())
}
