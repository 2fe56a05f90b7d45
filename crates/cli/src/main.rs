use clap::{Parser, Subcommand};
use parley::{HttpMessageService, Message, MessageId, MessageStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley CLI", long_about = None)]
struct Cli {
    /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
    #[arg(long, short, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init,

    /// Run the reference message service (echo bot, SQLite storage next to the config file).
    Serve {
        /// HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print every message in the conversation.
    List,

    /// Send a new message and print the bot's reply.
    Send {
        /// Message text
        text: String,
    },

    /// Replace the text of an existing message.
    Edit {
        id: MessageId,
        /// New message text
        text: String,
    },

    /// Delete a message.
    Delete { id: MessageId },

    /// Interactive chat: prints history, then sends each line you type.
    Chat,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init) => run_init(config),
        Some(Commands::Serve { port }) => run_serve(config, port).await,
        Some(Commands::List) => run_list(config).await,
        Some(Commands::Send { text }) => run_send(config, text).await,
        Some(Commands::Edit { id, text }) => run_edit(config, id, text).await,
        Some(Commands::Delete { id }) => run_delete(config, id).await,
        Some(Commands::Chat) => run_chat(config).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(parley::config::default_config_path);
    let dir = parley::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, used_path) = parley::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting message service on {}:{}",
        config.server.bind,
        config.server.port
    );
    parley::server::run_server(config, used_path).await
}

/// Build a store for the configured service and load the current conversation.
async fn open_store(
    config_path: Option<PathBuf>,
) -> anyhow::Result<MessageStore<HttpMessageService>> {
    let (config, _) = parley::config::load_config(config_path)?;
    let base_url = parley::config::resolve_base_url(&config);
    log::debug!("using message service at {}", base_url);
    let mut store = MessageStore::new(HttpMessageService::new(Some(base_url)));
    store.load().await?;
    Ok(store)
}

fn format_message(m: &Message) -> String {
    format!(
        "#{} [{}]\n  you: {}\n  bot: {}",
        m.id, m.timestamp, m.user_message, m.bot_response
    )
}

async fn run_list(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_store(config_path).await?;
    if store.is_empty() {
        println!("no messages");
    }
    for m in store.messages() {
        println!("{}", format_message(m));
    }
    Ok(())
}

/// The edited message, preceded by the text it replaced when that was loaded.
fn format_edit(previous: Option<&str>, edited: &Message) -> String {
    match previous {
        Some(p) => format!("was: {}\n{}", p.trim(), format_message(edited)),
        None => format_message(edited),
    }
}

async fn run_send(config_path: Option<PathBuf>, text: String) -> anyhow::Result<()> {
    let mut store = open_store(config_path).await?;
    let sent = store.send(&text).await?;
    println!("{}", format_message(&sent));
    Ok(())
}

async fn run_edit(config_path: Option<PathBuf>, id: MessageId, text: String) -> anyhow::Result<()> {
    let mut store = open_store(config_path).await?;
    let previous = store.get(id).map(|m| m.user_message.clone());
    let edited = store.edit(id, &text).await?;
    println!("{}", format_edit(previous.as_deref(), edited));
    Ok(())
}

async fn run_delete(config_path: Option<PathBuf>, id: MessageId) -> anyhow::Result<()> {
    let mut store = open_store(config_path).await?;
    store.delete(id).await?;
    println!("deleted #{}", id);
    Ok(())
}

/// One line of input in the interactive chat.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput {
    Send(String),
    Edit(MessageId, String),
    Delete(MessageId),
    List,
    Help,
    Exit,
    Skip,
    Invalid(&'static str),
}

const CHAT_HELP: &str = "commands:\n  /list - reload and print the conversation\n  /edit ID TEXT - replace the text of message ID\n  /delete ID - delete message ID\n  /exit - quit\nanything else is sent as a message";

fn parse_chat_line(line: &str) -> ChatInput {
    let input = line.trim();
    if input.is_empty() {
        return ChatInput::Skip;
    }
    if !input.starts_with('/') {
        return ChatInput::Send(line.trim_end_matches(['\r', '\n']).to_string());
    }
    let (cmd, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
    let rest = rest.trim();
    match cmd.to_ascii_lowercase().as_str() {
        "/exit" | "/quit" => ChatInput::Exit,
        "/list" => ChatInput::List,
        "/help" => ChatInput::Help,
        "/delete" => match rest.parse() {
            Ok(id) => ChatInput::Delete(id),
            Err(_) => ChatInput::Invalid("usage: /delete ID"),
        },
        "/edit" => {
            let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            match id.parse() {
                Ok(id) if !text.trim().is_empty() => ChatInput::Edit(id, text.trim().to_string()),
                _ => ChatInput::Invalid("usage: /edit ID TEXT"),
            }
        }
        _ => ChatInput::Invalid("unknown command; try /help"),
    }
}

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let mut store = open_store(config_path).await?;
    for m in store.messages() {
        println!("{}", format_message(m));
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        match parse_chat_line(&line) {
            ChatInput::Skip => {}
            ChatInput::Exit => break,
            ChatInput::Help => println!("{}", CHAT_HELP),
            ChatInput::Invalid(msg) => eprintln!("{}", msg),
            ChatInput::Send(text) => match store.send(&text).await {
                Ok(m) => println!("< {}", m.bot_response.trim()),
                Err(e) => eprintln!("send error: {}", e),
            },
            ChatInput::Edit(id, text) => match store.edit(id, &text).await {
                Ok(m) => println!("{}", format_message(m)),
                Err(e) => eprintln!("edit error: {}", e),
            },
            ChatInput::Delete(id) => match store.delete(id).await {
                Ok(()) => println!("deleted #{}", id),
                Err(e) => eprintln!("delete error: {}", e),
            },
            ChatInput::List => match store.load().await {
                Ok(()) => {
                    for m in store.messages() {
                        println!("{}", format_message(m));
                    }
                }
                Err(e) => eprintln!("load error: {}", e),
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent_untrimmed_at_start() {
        assert_eq!(
            parse_chat_line("  how are you\n"),
            ChatInput::Send("  how are you".to_string())
        );
        assert_eq!(parse_chat_line("   \n"), ChatInput::Skip);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(parse_chat_line("/exit\n"), ChatInput::Exit);
        assert_eq!(parse_chat_line("/QUIT"), ChatInput::Exit);
        assert_eq!(parse_chat_line("/list"), ChatInput::List);
        assert_eq!(parse_chat_line("/delete 3"), ChatInput::Delete(3));
        assert_eq!(
            parse_chat_line("/edit 1 hey there\n"),
            ChatInput::Edit(1, "hey there".to_string())
        );
    }

    #[test]
    fn malformed_commands_are_invalid() {
        assert!(matches!(parse_chat_line("/delete x"), ChatInput::Invalid(_)));
        assert!(matches!(parse_chat_line("/edit 1"), ChatInput::Invalid(_)));
        assert!(matches!(parse_chat_line("/edit one two"), ChatInput::Invalid(_)));
        assert!(matches!(parse_chat_line("/frobnicate"), ChatInput::Invalid(_)));
    }

    #[test]
    fn message_formatting() {
        let m = Message {
            id: 2,
            user_message: "how are you".to_string(),
            bot_response: "I'm good".to_string(),
            timestamp: "t2".to_string(),
        };
        assert_eq!(
            format_message(&m),
            "#2 [t2]\n  you: how are you\n  bot: I'm good"
        );
    }

    #[test]
    fn edit_output_shows_replaced_text() {
        let m = Message {
            id: 1,
            user_message: "hey".to_string(),
            bot_response: "hey".to_string(),
            timestamp: "t3".to_string(),
        };
        assert_eq!(
            format_edit(Some("hi "), &m),
            "was: hi\n#1 [t3]\n  you: hey\n  bot: hey"
        );
        assert_eq!(format_edit(None, &m), format_message(&m));
    }
}
