pub mod health;
pub mod mnist;
pub mod network;
pub mod train_sse;
