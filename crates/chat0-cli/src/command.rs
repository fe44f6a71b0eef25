use chat0_llm::ProviderType;

use crate::error::{CliError, Result};

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text goes to the open chat
    Say(String),
    Register {
        email: String,
        password: String,
        name: Option<String>,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    New,
    Threads,
    Open(String),
    Rename(String),
    Delete(String),
    Messages,
    Summaries,
    /// No argument lists the catalog
    Model(Option<String>),
    Key {
        provider: ProviderType,
        key: String,
    },
    Regenerate(String),
    Edit {
        message_id: String,
        content: String,
    },
    Stop,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /register <email> <password> [name]   create an account
  /login <email> <password>             sign in
  /logout                               sign out
  /new                                  start a new chat
  /threads                              list your chats
  /open <thread-id>                     open a chat
  /rename <title>                       rename the open chat
  /delete <thread-id>                   delete a chat and its messages
  /messages                             show the open chat
  /summaries                            show the message navigator
  /model [name]                         list models or pick one
  /key <provider> <key>                 save an API key (empty key removes it)
  /regen <message-id>                   ask again from a message
  /edit <message-id> <text>             replace a message and resend
  /stop                                 stop waiting for the reply
  /quit                                 exit
Anything else is sent to the open chat.";

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Self::Say(line.to_string())));
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "register" => {
                let mut parts = args.splitn(3, char::is_whitespace);
                let (Some(email), Some(password)) = (parts.next(), parts.next()) else {
                    return Err(CliError::Usage("/register <email> <password> [name]"));
                };
                if email.is_empty() || password.is_empty() {
                    return Err(CliError::Usage("/register <email> <password> [name]"));
                }
                Self::Register {
                    email: email.to_string(),
                    password: password.to_string(),
                    name: parts.next().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
                }
            }
            "login" => match args.split_whitespace().collect::<Vec<_>>().as_slice() {
                [email, password] => Self::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                },
                _ => return Err(CliError::Usage("/login <email> <password>")),
            },
            "logout" => Self::Logout,
            "new" => Self::New,
            "threads" => Self::Threads,
            "open" => Self::Open(required(args, "/open <thread-id>")?),
            "rename" => Self::Rename(required(args, "/rename <title>")?),
            "delete" => Self::Delete(required(args, "/delete <thread-id>")?),
            "messages" => Self::Messages,
            "summaries" => Self::Summaries,
            "model" => Self::Model((!args.is_empty()).then(|| args.to_string())),
            "key" => {
                let (provider, key) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
                if provider.is_empty() {
                    return Err(CliError::Usage("/key <provider> <key>"));
                }
                let provider = ProviderType::parse(provider)
                    .ok_or_else(|| CliError::UnknownProvider(provider.to_string()))?;
                Self::Key {
                    provider,
                    key: key.trim().to_string(),
                }
            }
            "regen" => Self::Regenerate(required(args, "/regen <message-id>")?),
            "edit" => match args.split_once(char::is_whitespace) {
                Some((id, content)) if !content.trim().is_empty() => Self::Edit {
                    message_id: id.to_string(),
                    content: content.trim().to_string(),
                },
                _ => return Err(CliError::Usage("/edit <message-id> <text>")),
            },
            "stop" => Self::Stop,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CliError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn required(args: &str, usage: &'static str) -> Result<String> {
    if args.is_empty() {
        Err(CliError::Usage(usage))
    } else {
        Ok(args.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_plain_text_is_said() {
        assert_eq!(parse("  Hello there "), Command::Say("Hello there".to_string()));
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_register_with_and_without_name() {
        assert_eq!(
            parse("/register ada@example.com pw Ada Lovelace"),
            Command::Register {
                email: "ada@example.com".to_string(),
                password: "pw".to_string(),
                name: Some("Ada Lovelace".to_string()),
            }
        );
        assert!(matches!(
            parse("/register ada@example.com pw"),
            Command::Register { name: None, .. }
        ));
        assert!(matches!(
            Command::parse("/register ada@example.com"),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_key_parses_provider() {
        assert_eq!(
            parse("/key OpenRouter sk-or-1"),
            Command::Key {
                provider: ProviderType::OpenRouter,
                key: "sk-or-1".to_string(),
            }
        );
        assert_eq!(
            parse("/key google"),
            Command::Key {
                provider: ProviderType::Google,
                key: String::new(),
            }
        );
        assert!(matches!(
            Command::parse("/key anthropic abc"),
            Err(CliError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_model_with_spaces_in_name() {
        assert_eq!(parse("/model Gemini 2.5 Pro"), Command::Model(Some("Gemini 2.5 Pro".to_string())));
        assert_eq!(parse("/model"), Command::Model(None));
    }

    #[test]
    fn test_edit_needs_text() {
        assert_eq!(
            parse("/edit m-1 a better question"),
            Command::Edit {
                message_id: "m-1".to_string(),
                content: "a better question".to_string(),
            }
        );
        assert!(matches!(Command::parse("/edit m-1"), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(Command::parse("/frobnicate"), Err(CliError::UnknownCommand(c)) if c == "frobnicate"));
    }
}
