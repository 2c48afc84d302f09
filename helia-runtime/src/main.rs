use std::io::{self, Write};
use std::sync::Arc;

use helia_core::generation::{GenerationClient, HttpGenerator};
use helia_core::provider::gemini::GeminiProvider;
use helia_core::store::memory::{InMemoryMessageStore, InMemoryUserStore};
use helia_core::{ChatSession, Session, UserRecord};
use helia_runtime::config::{LogFormat, RuntimeConfig};
use helia_runtime::console::{self, Command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type TerminalChat =
    ChatSession<InMemoryMessageStore, InMemoryUserStore, HttpGenerator<GeminiProvider>>;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

/// A simple interactive chat against one Helia bot.
///
/// Messages and the account live in memory for the lifetime of the process;
/// replies stream from Gemini as they are generated.
async fn run_chat(config: RuntimeConfig) -> helia_runtime::Result<()> {
    let users = Arc::new(InMemoryUserStore::with_user(UserRecord {
        id: config.user_id.clone(),
        credits: config.credits,
        is_subscribed: config.subscribed,
    }));
    let messages = Arc::new(InMemoryMessageStore::new());
    let generator = GenerationClient::new(HttpGenerator::new(GeminiProvider::new()));
    let chat: TerminalChat = ChatSession::open(&config.bot, messages, users, generator)?;
    let session = Session::new(config.user_id.clone());

    chat.refresh(Some(&session)).await?;
    println!("{}", console::header(chat.persona(), chat.account().as_ref()));
    println!("{}", console::HELP);
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            prompt()?;
            continue;
        };

        match command {
            Command::Exit => {
                println!("Goodbye!");
                break;
            }
            Command::Help => println!("{}", console::HELP),
            Command::Bots => println!("{}", console::render_bots(chat.persona())),
            Command::History => {
                for message in chat.refresh(Some(&session)).await? {
                    println!("{}", console::render_message(chat.persona(), &message));
                }
            }
            Command::Credits => {
                chat.refresh(Some(&session)).await?;
                println!("{}", console::account_status(chat.account().as_ref()));
            }
            Command::Upgrade => {
                chat.ledger().set_subscription(&session.user_id, true).await?;
                chat.refresh(Some(&session)).await?;
                info!(user = %session.user_id, "subscription enabled");
                println!("{}", console::account_status(chat.account().as_ref()));
            }
            Command::Export => match console::export(&chat.messages()) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("Failed to export history: {}", e),
            },
            Command::Say(text) => {
                print!("{}: ", chat.persona().name);
                io::stdout().flush()?;
                let result = chat
                    .submit_turn(Some(&session), &text, |fragment| {
                        if let Err(e) = console::write_fragment(&mut io::stdout(), fragment) {
                            warn!("Failed to print fragment: {}", e);
                        }
                    })
                    .await;
                println!();
                match result {
                    Ok(outcome) => {
                        if let Some(balance) = outcome.balance {
                            println!("({balance} credits remaining)");
                        }
                    }
                    Err(e) => println!("{}", console::render_notice(&e.notice())),
                }
            }
        }
        println!();
        prompt()?;
    }

    Ok(())
}

#[tokio::main]
pub async fn main() {
    let _ = dotenvy::dotenv();

    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    init_tracing(config.log_format);

    info!(bot = %config.bot, user = %config.user_id, "Starting Helia chat");

    if let Err(e) = run_chat(config).await {
        error!("Chat ended with an error: {}", e);
        eprintln!("Error: {}", e);
    }
}
