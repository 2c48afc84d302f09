//! Plain-text rendering for the terminal chat.

use std::io::{self, Write};

use helia_core::{Message, Notice, NoticeAction, PERSONAS, Persona, Role, UserRecord};

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the text as a user turn
    Say(String),
    History,
    Credits,
    Upgrade,
    Export,
    Bots,
    Help,
    Exit,
}

impl Command {
    /// Parses one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let command = match line.to_ascii_lowercase().as_str() {
            "/history" => Command::History,
            "/credits" => Command::Credits,
            "/upgrade" => Command::Upgrade,
            "/export" => Command::Export,
            "/bots" => Command::Bots,
            "/help" => Command::Help,
            "/exit" | "/quit" | "exit" => Command::Exit,
            _ => Command::Say(line.to_string()),
        };
        Some(command)
    }
}

pub const HELP: &str = "Commands: /history, /credits, /upgrade, /export, /bots, /help, /exit";

/// Balance line shown under the bot name
pub fn account_status(account: Option<&UserRecord>) -> String {
    match account {
        Some(record) if record.is_subscribed => "Premium Access".to_string(),
        Some(record) if record.credits == 1 => "1 credit remaining".to_string(),
        Some(record) => format!("{} credits remaining", record.credits),
        None => "Balance unknown".to_string(),
    }
}

pub fn header(persona: &Persona, account: Option<&UserRecord>) -> String {
    format!("=== {} ===\n{}", persona.name, account_status(account))
}

/// Speaker label followed by the text
pub fn render_message(persona: &Persona, message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Assistant => persona.name,
    };
    format!("{speaker}: {}", message.text)
}

pub fn render_notice(notice: &Notice) -> String {
    let hint = match notice.action {
        Some(NoticeAction::Upgrade) => "\n  Type /upgrade to switch to Premium.",
        Some(NoticeAction::TryAgain) => "\n  Send the message again to retry.",
        None => "",
    };
    format!("[{}] {}{}", notice.title, notice.description, hint)
}

/// One line per bot, marking the current one
pub fn render_bots(current: &Persona) -> String {
    PERSONAS
        .iter()
        .map(|persona| {
            let marker = if persona.id == current.id { "*" } else { " " };
            format!("{marker} {:<18} {}", persona.id, persona.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// History as newline-delimited JSON
pub fn export(messages: &[Message]) -> serde_json::Result<String> {
    messages
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<_>>>()
        .map(|lines| lines.join("\n"))
}

/// Prints one streamed fragment so it shows up before the line ends
pub fn write_fragment<W: Write>(out: &mut W, fragment: &str) -> io::Result<()> {
    out.write_all(fragment.as_bytes())?;
    out.flush()
}
