use log::{info, warn};

use neurite::{NetworkState, Result};

use crate::state::AppState;

/// Installs `DEFAULT_MODEL`, fetched from the model store when `HUB_DIR` is
/// set and read from `MODEL_DIR` otherwise or when the store lacks it.
pub fn load_default_model(state: &AppState) -> Option<NetworkState> {
    let name = state.config.default_model.as_deref()?;

    let from_hub = state.config.hub().map(|hub| {
        hub.fetch(name).and_then(|(model, _)| state.session.install(model))
    });
    let loaded = match from_hub {
        Some(Ok(network)) => {
            info!("default model {} loaded from the model store", name);
            Ok(network)
        }
        Some(Err(e)) => {
            warn!("default model {} not fetched from the model store: {}", name, e);
            load_local(state, name)
        }
        None => load_local(state, name),
    };

    match loaded {
        Ok(network) => {
            info!("default model {} ready ({:?})", name, network.sizes);
            Some(network)
        }
        Err(e) => {
            warn!("default model {} not loaded: {}", name, e);
            None
        }
    }
}

fn load_local(state: &AppState, name: &str) -> Result<NetworkState> {
    state
        .session
        .load_model(state.config.model_path(name))
        .map(|(network, _)| network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use neurite::codec;
    use neurite::{Activation, DirectoryStore, ModelHub, NetworkModel};

    use crate::config::ServerConfig;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("neurite-startup-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn config(root: &PathBuf, hub: bool) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            data_dir: root.join("data"),
            model_dir: root.join("models"),
            hub_dir: hub.then(|| root.join("hub")),
            journal_dir: None,
            mnist_base_url: String::new(),
            default_model: Some("digits".into()),
            seed: Some(1),
        }
    }

    fn saved_model(path: &PathBuf, sizes: Vec<usize>) -> NetworkModel {
        let model = NetworkModel::new(sizes, Activation::Sigmoid).unwrap();
        codec::save(&model, path, None).unwrap();
        model
    }

    #[test]
    fn default_model_comes_from_the_store() {
        let root = temp_dir("hub");
        let staged = root.join("staging/digits.safetensors");
        let model = saved_model(&staged, vec![4, 3, 2]);
        ModelHub::new(DirectoryStore::new(root.join("hub")), root.join("unused"))
            .publish(&staged, "digits", "test digits", Some(91.0))
            .unwrap();

        let state = AppState::new(config(&root, true));
        let network = load_default_model(&state).unwrap();
        assert_eq!(network.sizes, vec![4, 3, 2]);
        assert_eq!(state.session.snapshot().unwrap(), model);
        assert!(root.join("models/cache/digits.safetensors").exists());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn model_dir_is_the_fallback() {
        let root = temp_dir("fallback");
        saved_model(&root.join("models/digits.safetensors"), vec![5, 2]);

        let state = AppState::new(config(&root, true));
        assert_eq!(load_default_model(&state).unwrap().sizes, vec![5, 2]);

        let without_hub = AppState::new(config(&root, false));
        assert_eq!(load_default_model(&without_hub).unwrap().sizes, vec![5, 2]);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_everywhere_leaves_the_session_empty() {
        let root = temp_dir("missing");
        let state = AppState::new(config(&root, true));
        assert!(load_default_model(&state).is_none());
        assert!(!state.session.has_network());
        let _ = fs::remove_dir_all(&root);
    }
}
