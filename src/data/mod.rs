pub mod fetch;
pub mod idx;
pub mod mnist;
pub mod pair;

pub use fetch::{Fetch, HttpFetcher};
pub use idx::parse_idx_pair;
pub use mnist::{sample, Mnist, MnistLoader, Partition, Sample};
pub use pair::{one_hot, DataPair};
