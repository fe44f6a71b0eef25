pub mod events;

pub use events::{ChatEvent, ChatStatus};
