mod user;
mod thread;
mod message;
mod summary;

pub use user::User;
pub use thread::{Thread, ThreadUpdate};
pub use message::{Message, MessageRole, NewMessage};
pub use summary::MessageSummary;

/// A stored row addressable by its id
///
/// Live views and change feeds key their collections on this.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Thread {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Message {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for MessageSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
