pub mod archive;
pub mod metadata;

pub use archive::{decode, encode, load, read_metadata, save, sidecar_path};
pub use metadata::ModelMetadata;
