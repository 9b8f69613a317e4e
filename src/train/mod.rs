pub mod access;
pub mod cost;
pub mod journal;
pub mod logged;
pub mod progress;
pub mod train_config;
pub mod trainer;

pub use access::ModelAccess;
pub use cost::QuadraticCost;
pub use journal::{read_journal, JournalEntry, JournalSummary, TrainingJournal};
pub use logged::LoggedTrainer;
pub use progress::{TrainingEvent, TrainingProgress};
pub use train_config::TrainingConfig;
pub use trainer::{backprop, evaluate, mini_batches, total_cost, update_mini_batch, Gradients, SgdTrainer, Trainer};
