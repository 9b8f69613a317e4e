pub mod card;
pub mod directory;
pub mod hub;

pub use card::model_card;
pub use directory::{BlobStore, DirectoryStore};
pub use hub::{ModelHub, Published, PublishedModel};
