use chat0_chat::{ChatError, ChatEvent, ChatSession, ChatStatus};
use chat0_llm::AI_MODELS;
use chat0_persist::{DeleteOutcome, Message, MessageRole, Mutation, QueryHandle, Session};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::command::{Command, HELP};
use crate::error::{CliError, Result};
use crate::state::AppState;

/// Line-oriented front end over one signed-in user and at most one open chat
pub struct Repl {
    state: AppState,
    user: Option<Session>,
    chat: Option<Arc<ChatSession>>,
    printer: Option<JoinHandle<()>>,
    threads_query: Option<QueryHandle>,
}

impl Repl {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            user: None,
            chat: None,
            printer: None,
            threads_query: None,
        }
    }

    pub fn user(&self) -> Option<&Session> {
        self.user.as_ref()
    }

    pub fn chat(&self) -> Option<&Arc<ChatSession>> {
        self.chat.as_ref()
    }

    /// Pick up the session saved by the last run, if the backend still accepts it
    pub async fn restore_session(&mut self) {
        let saved = match self.state.sessions.load() {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(error = %e, "could not read saved session");
                return;
            }
        };
        let Some(session) = saved else {
            return;
        };

        match self.state.backend.auth.resume(&session).await {
            Ok(()) => {
                tracing::info!(user_id = %session.user_id, "session restored");
                self.user = Some(session);
            }
            Err(e) => {
                tracing::warn!(error = %e, "saved session rejected");
                if let Err(e) = self.state.sessions.clear() {
                    tracing::warn!(error = %e, "could not clear saved session");
                }
            }
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!(
            "Chat0 on the {} backend. Type /help for commands.",
            self.state.persist().backend().backend_name()
        );
        self.restore_session().await;
        if let Some(user) = &self.user {
            println!("Signed in as {}.", user.email);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("error: {e}");
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }

            match self.execute(command).await {
                Ok(output) if !output.is_empty() => println!("{output}"),
                Ok(_) => {}
                Err(e) => println!("error: {e}"),
            }
        }

        self.close_chat();
        Ok(())
    }

    /// Run one command; the returned text is shown to the user
    ///
    /// Chat sends run in the background and report through the session's
    /// events, so they return as soon as the request is on its way.
    pub async fn execute(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Say(text) => {
                let chat = self.busy_checked_chat()?;
                spawn_chat(async move { chat.submit(&text).await });
                Ok(String::new())
            }
            Command::Register {
                email,
                password,
                name,
            } => {
                let session = self.state.backend.auth.register(&email, &password, name).await?;
                self.sign_in(session)
            }
            Command::Login { email, password } => {
                let session = self.state.backend.auth.login(&email, &password).await?;
                self.sign_in(session)
            }
            Command::Logout => {
                let user = self.user.take().ok_or(CliError::NotSignedIn)?;
                self.close_chat();
                self.threads_query = None;
                self.state.sessions.clear()?;
                self.state.backend.auth.logout(&user).await?;
                Ok("Signed out.".to_string())
            }
            Command::New => {
                let user_id = self.user_id()?;
                let chat = self.state.session_builder().user_id(user_id).new_thread().await?;
                let thread_id = chat.thread_id().to_string();
                self.attach(chat);
                Ok(format!("Opened new chat {thread_id}."))
            }
            Command::Threads => self.list_threads().await,
            Command::Open(thread_id) => {
                let user_id = self.user_id()?;
                let chat = self
                    .state
                    .session_builder()
                    .user_id(user_id)
                    .thread_id(thread_id.as_str())
                    .open()
                    .await?;
                let transcript = render_messages(&chat.messages());
                self.attach(chat);
                Ok(transcript)
            }
            Command::Rename(title) => {
                let chat = self.open_chat()?;
                let mutation = Mutation::new(self.state.cache.clone()).invalidates("threads");
                let thread = mutation
                    .run(self.state.persist().threads().rename(chat.thread_id(), title))
                    .await?;
                Ok(format!("Renamed to \"{}\".", thread.title))
            }
            Command::Delete(thread_id) => self.delete_thread(&thread_id).await,
            Command::Messages => Ok(render_messages(&self.open_chat()?.messages())),
            Command::Summaries => {
                let summaries = self.open_chat()?.summaries().await?;
                if summaries.is_empty() {
                    return Ok("No summaries yet.".to_string());
                }
                Ok(summaries
                    .iter()
                    .map(|s| format!("{}  {}", s.message_id, s.content))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Command::Model(None) => Ok(self.render_models()),
            Command::Model(Some(name)) => {
                let model = self.state.models.set_model(&name)?;
                let mut reply = format!("Model set to {} ({}).", model.name, model.provider);
                if self.state.keys.get_key(model.provider).is_none() {
                    reply.push_str(&format!(" Add a key with /key {} <key>.", model.provider));
                }
                Ok(reply)
            }
            Command::Key { provider, key } => {
                self.state.keys.set_key(provider, &key)?;
                if key.is_empty() {
                    Ok(format!("Removed the {provider} key."))
                } else {
                    Ok(format!("Saved the {provider} key."))
                }
            }
            Command::Regenerate(message_id) => {
                let chat = self.busy_checked_chat()?;
                spawn_chat(async move { chat.regenerate(&message_id).await });
                Ok(String::new())
            }
            Command::Edit {
                message_id,
                content,
            } => {
                let chat = self.busy_checked_chat()?;
                spawn_chat(async move { chat.edit(&message_id, &content).await });
                Ok(String::new())
            }
            Command::Stop => {
                self.open_chat()?.stop();
                Ok("Stopped.".to_string())
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }

    fn sign_in(&mut self, session: Session) -> Result<String> {
        self.close_chat();
        self.threads_query = None;
        self.state.sessions.save(&session)?;
        let greeting = format!(
            "Welcome, {}.",
            session.name.as_deref().unwrap_or(session.email.as_str())
        );
        self.user = Some(session);

        if !self.state.keys.has_required_keys() {
            return Ok(format!("{greeting} Add a Google API key with /key google <key> to start chatting."));
        }
        Ok(greeting)
    }

    async fn list_threads(&mut self) -> Result<String> {
        let user_id = self.user_id()?;
        if self.threads_query.is_none() {
            self.threads_query = Some(self.state.cache.handle("threads", &user_id)?);
        }
        let Some(query) = &self.threads_query else {
            return Err(CliError::NotSignedIn);
        };

        let threads = self.state.persist().threads().clone();
        let outcome = query.fetch(move || async move { threads.list(&user_id).await }).await?;
        let Some(threads) = outcome.into_option() else {
            return Ok("Thread list was refreshed a moment ago; try again shortly.".to_string());
        };

        if threads.is_empty() {
            return Ok("No chats yet. Start one with /new.".to_string());
        }
        let open = self.chat.as_ref().map(|c| c.thread_id().to_string());
        Ok(threads
            .iter()
            .map(|t| {
                let marker = if open.as_deref() == Some(t.id.as_str()) { "*" } else { " " };
                format!(
                    "{marker} {}  {}  ({})",
                    t.id,
                    t.title,
                    t.last_message_at.format("%Y-%m-%d %H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn delete_thread(&mut self, thread_id: &str) -> Result<String> {
        let user_id = self.user_id()?;
        let owned = self
            .state
            .persist()
            .threads()
            .get(thread_id)
            .await?
            .is_some_and(|t| t.user_id == user_id);
        if !owned {
            return Ok("No such chat.".to_string());
        }

        if self.chat.as_ref().is_some_and(|c| c.thread_id() == thread_id) {
            self.close_chat();
        }
        let mutation = Mutation::new(self.state.cache.clone()).invalidates("threads");
        match mutation.run(self.state.persist().threads().delete(thread_id)).await? {
            DeleteOutcome::Deleted => Ok("Chat deleted.".to_string()),
            DeleteOutcome::NotFound => Ok("No such chat.".to_string()),
        }
    }

    fn render_models(&self) -> String {
        let selected = self.state.models.selected();
        AI_MODELS
            .iter()
            .map(|m| {
                let marker = if m.name == selected.name { "*" } else { " " };
                let key = if self.state.keys.get_key(m.provider).is_some() {
                    ""
                } else {
                    "  (no key)"
                };
                format!("{marker} {}  [{}]{key}", m.name, m.provider)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn user_id(&self) -> Result<String> {
        self.user
            .as_ref()
            .map(|u| u.user_id.clone())
            .ok_or(CliError::NotSignedIn)
    }

    fn open_chat(&self) -> Result<Arc<ChatSession>> {
        self.chat.clone().ok_or(CliError::NoSession)
    }

    fn busy_checked_chat(&self) -> Result<Arc<ChatSession>> {
        let chat = self.open_chat()?;
        if chat.status() == ChatStatus::Generating {
            return Err(ChatError::Busy.into());
        }
        Ok(chat)
    }

    fn attach(&mut self, chat: ChatSession) {
        self.close_chat();
        let chat = Arc::new(chat);
        let mut rx = chat.subscribe();

        self.printer = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(line) = describe(&event) {
                            println!("{line}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "chat event printer fell behind")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
        self.chat = Some(chat);
    }

    fn close_chat(&mut self) {
        if let Some(printer) = self.printer.take() {
            printer.abort();
        }
        self.chat = None;
    }
}

fn spawn_chat<F>(fut: F)
where
    F: Future<Output = std::result::Result<Option<Message>, ChatError>> + Send + 'static,
{
    tokio::spawn(async move {
        match fut.await {
            // Reported through session events
            Ok(_) | Err(ChatError::Provider(_)) | Err(ChatError::MissingApiKey { .. }) => {}
            Err(e) => println!("error: {e}"),
        }
    });
}

/// Text shown for a session event, if any
pub fn describe(event: &ChatEvent) -> Option<String> {
    match event {
        ChatEvent::MessageAppended { message } if message.role == MessageRole::Assistant => {
            Some(format!("assistant> {}", message.content))
        }
        ChatEvent::StatusChanged {
            status: ChatStatus::Generating,
        } => Some("(thinking)".to_string()),
        ChatEvent::TitleChanged { title, .. } => Some(format!("[chat titled \"{title}\"]")),
        ChatEvent::Toast { message } => Some(format!("! {message}")),
        ChatEvent::ApiKeyMissing { provider } => Some(format!(
            "! API key missing for {provider}. Add one with /key {provider} <key>."
        )),
        _ => None,
    }
}

pub fn render_messages(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "No messages yet.".to_string();
    }
    messages
        .iter()
        .map(|m| {
            let who = match m.role {
                MessageRole::User => "you",
                MessageRole::Assistant => "assistant",
                MessageRole::System => "system",
            };
            format!("[{}] {who}> {}", m.id, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
