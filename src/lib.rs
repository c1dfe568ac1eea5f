pub mod catalog;
pub mod cue;
pub mod error;
pub mod events;
pub mod presenter;
pub mod processing {
    pub mod layout;
    pub mod transform;
}
pub mod session;
pub mod settings;
pub mod tasks {
    pub mod console;
    pub mod render;
    pub mod session;
}

pub use catalog::Catalog;
pub use error::Error;
pub use session::{SessionController, SessionState, SessionStatus};
pub use settings::{Preferences, SettingsStore};
