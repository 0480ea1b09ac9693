//! Commands of the assistant's line protocol.
//!
//! A command is a verb optionally followed by `:` and free text. The payload
//! never carries a line break: runs of `\r`/`\n` are collapsed to one space
//! when the command is built, so a command always fits in one frame.

use crate::{BridgeError, Result};
use std::fmt;
use std::str::FromStr;

/// Verbs understood by the assistant process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Ping,
    Version,
    Chat,
    Speak,
    Animation,
    Hide,
    Show,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Ping => "PING",
            Verb::Version => "VERSION",
            Verb::Chat => "CHAT",
            Verb::Speak => "SPEAK",
            Verb::Animation => "ANIMATION",
            Verb::Hide => "HIDE",
            Verb::Show => "SHOW",
        }
    }

    /// Whether the verb carries a text payload.
    pub fn takes_payload(&self) -> bool {
        matches!(self, Verb::Chat | Verb::Speak | Verb::Animation)
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PING" => Some(Verb::Ping),
            "VERSION" => Some(Verb::Version),
            "CHAT" => Some(Verb::Chat),
            "SPEAK" => Some(Verb::Speak),
            "ANIMATION" => Some(Verb::Animation),
            "HIDE" => Some(Verb::Hide),
            "SHOW" => Some(Verb::Show),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: Verb,
    payload: Option<String>,
}

impl Command {
    /// A command with no payload.
    pub fn bare(verb: Verb) -> Self {
        Self {
            verb,
            payload: None,
        }
    }

    /// A command with a payload. Line breaks in `text` are flattened.
    pub fn with_payload(verb: Verb, text: impl AsRef<str>) -> Self {
        Self {
            verb,
            payload: Some(sanitize_payload(text.as_ref())),
        }
    }

    pub fn ping() -> Self {
        Self::bare(Verb::Ping)
    }

    pub fn version() -> Self {
        Self::bare(Verb::Version)
    }

    pub fn chat(prompt: impl AsRef<str>) -> Self {
        Self::with_payload(Verb::Chat, prompt)
    }

    pub fn speak(text: impl AsRef<str>) -> Self {
        Self::with_payload(Verb::Speak, text)
    }

    pub fn animation(name: impl AsRef<str>) -> Self {
        Self::with_payload(Verb::Animation, name)
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// The command line without its terminator.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "{}:{}", self.verb, payload),
            None => f.write_str(self.verb.as_str()),
        }
    }
}

impl FromStr for Command {
    type Err = BridgeError;

    /// Parse `VERB` or `VERB:payload`. The verb is case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim_end_matches(['\r', '\n']);
        let (verb_text, payload) = match line.split_once(':') {
            Some((verb, payload)) => (verb, Some(payload)),
            None => (line, None),
        };

        let verb = Verb::from_str(&verb_text.trim().to_ascii_uppercase()).ok_or_else(|| {
            BridgeError::InvalidCommand {
                message: format!("Unknown verb: {}", verb_text.trim()),
            }
        })?;

        match payload {
            Some(text) => Ok(Command::with_payload(verb, text)),
            None if verb.takes_payload() => Err(BridgeError::InvalidCommand {
                message: format!("{} requires a payload", verb),
            }),
            None => Ok(Command::bare(verb)),
        }
    }
}

/// Collapse every run of CR/LF characters into a single space.
fn sanitize_payload(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for ch in text.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out
}
