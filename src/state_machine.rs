//! Conversation driver state machine
//!
//! Pure transitions in the Elm style: the executor feeds observations and
//! effect outcomes in as events and performs whatever effects come back.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Event, PassReason, Reply};
pub use state::{DriverState, Observation, TurnCursor};
pub use transition::{transition, TransitionError, TransitionResult};
