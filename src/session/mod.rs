pub mod guard;
pub mod session;
pub mod stream;

pub use guard::TrainingGuard;
pub use session::{LayerActivations, TrainingSession};
pub use stream::{RunRecord, StreamPoll, TrainingStream};
