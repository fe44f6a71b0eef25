pub mod memory;
pub mod postgrest;
#[cfg(feature = "mongodb")]
pub mod mongo;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
