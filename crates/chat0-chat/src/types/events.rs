use chat0_llm::ProviderType;
use chat0_persist::{Message, MessageSummary};
use serde::{Deserialize, Serialize};

/// Whether a session is waiting on a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Idle,
    Generating,
}

/// Everything a front end needs to redraw a chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    StatusChanged {
        status: ChatStatus,
    },

    /// Added to the local transcript (persisted or not)
    MessageAppended {
        message: Message,
    },

    /// Dropped from the transcript by regenerate or edit
    MessagesRemoved {
        ids: Vec<String>,
    },

    TitleChanged {
        thread_id: String,
        title: String,
    },

    SummaryCreated {
        summary: MessageSummary,
    },

    /// Selected model's provider has no key configured
    ApiKeyMissing {
        provider: ProviderType,
    },

    /// Transient notification; the persistent banner is on the session
    Toast {
        message: String,
    },
}
