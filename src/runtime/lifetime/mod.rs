//! Process lifecycle: restore → open at startup, close → backup at shutdown.

pub mod shutdown;
pub mod startup;

pub use shutdown::{listen_for_shutdown, shutdown_storage};
pub use startup::{StorageContext, prepare_storage};
