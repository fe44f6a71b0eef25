mod user;
mod thread;
mod message;
mod summary;

pub use user::UserRepository;
pub use thread::{DeleteOutcome, ThreadRepository};
pub use message::MessageRepository;
pub use summary::SummaryRepository;
