pub mod controller;

pub use controller::{RefinementController, RefinementError, RefinementSlot};
