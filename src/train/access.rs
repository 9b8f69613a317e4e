use crate::network::NetworkModel;

/// How the training loop reaches the network it updates.
///
/// Each call is one critical section: a single mini-batch update or a single
/// evaluation. Implementations that share the network with readers release it
/// between calls, so other work can observe the model only between
/// mini-batches, never in the middle of one.
pub trait ModelAccess {
    fn update<T>(&mut self, f: impl FnOnce(&mut NetworkModel) -> T) -> T;

    fn read<T>(&self, f: impl FnOnce(&NetworkModel) -> T) -> T;
}

impl ModelAccess for NetworkModel {
    fn update<T>(&mut self, f: impl FnOnce(&mut NetworkModel) -> T) -> T {
        f(self)
    }

    fn read<T>(&self, f: impl FnOnce(&NetworkModel) -> T) -> T {
        f(self)
    }
}
