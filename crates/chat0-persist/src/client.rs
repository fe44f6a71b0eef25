use std::sync::Arc;

use crate::builder::PersistClientBuilder;
use crate::clock::{Clock, SystemClock};
use crate::repositories::{MessageRepository, SummaryRepository, ThreadRepository, UserRepository};
use crate::trait_client::PersistenceClient;

/// Entry point for the domain CRUD operations
///
/// Built once per process and shared by `Arc`. All repositories talk to the
/// same backend handle and read time from the same clock.
#[derive(Clone)]
pub struct PersistClient {
    backend: Arc<dyn PersistenceClient>,
    clock: Arc<dyn Clock>,
    user_repo: UserRepository,
    thread_repo: ThreadRepository,
    message_repo: MessageRepository,
    summary_repo: SummaryRepository,
}

impl PersistClient {
    pub fn new(backend: Arc<dyn PersistenceClient>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<dyn PersistenceClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            user_repo: UserRepository::new(backend.clone(), clock.clone()),
            thread_repo: ThreadRepository::new(backend.clone(), clock.clone()),
            message_repo: MessageRepository::new(backend.clone(), clock.clone()),
            summary_repo: SummaryRepository::new(backend.clone(), clock.clone()),
            backend,
            clock,
        }
    }

    pub fn builder() -> PersistClientBuilder {
        PersistClientBuilder::new()
    }

    pub fn users(&self) -> &UserRepository {
        &self.user_repo
    }

    pub fn threads(&self) -> &ThreadRepository {
        &self.thread_repo
    }

    pub fn messages(&self) -> &MessageRepository {
        &self.message_repo
    }

    pub fn summaries(&self) -> &SummaryRepository {
        &self.summary_repo
    }

    pub fn backend(&self) -> &Arc<dyn PersistenceClient> {
        &self.backend
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
