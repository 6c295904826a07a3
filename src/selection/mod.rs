pub mod events;
pub mod state;

pub use events::{input_channel, InputEvent, InputReleased, InputStream, InputSubscription};
pub use state::{SelectionMachine, SelectionMode, SelectionState, Transition, ViewportSelection};
