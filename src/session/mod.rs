pub mod controller;
pub mod state;

pub use controller::{SessionError, SessionOrchestrator};
pub use state::{SessionPhase, SessionSnapshot};

pub(crate) use state::SessionState;
