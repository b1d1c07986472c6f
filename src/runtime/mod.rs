//! Runtime adapters: the Tokio spawner and OS signal helpers.

pub mod signals;
pub mod tokio_spawner;

pub use signals::wait_for_shutdown_signal;
pub use tokio_spawner::TokioSpawner;
