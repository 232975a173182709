// Configuration loading

pub mod session;
pub mod settings;

pub use session::Session;
pub use settings::{Settings, StorageBackend};
