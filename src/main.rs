//! Router Chat - chat with OpenRouter models from the terminal.
//!
//! Sign in once with `router-chat login`; the API key is kept in the user
//! data directory and every later session starts straight into the chat.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use router_chat::auth::{
    mask_api_key, CallbackParams, CallbackServer, ConnectionState, FileStore, KeyValueStore,
    OAuthFlow, OpenRouterExchanger,
};
use router_chat::chat::ChatSession;
use router_chat::config::Config;
use router_chat::llm::OpenRouterTransport;
use router_chat::message::{Message, Role};
use router_chat::terminal::{parse_prompt, print_error, print_message, PromptInput, ReplyPrinter};

type StdinLines = Lines<BufReader<Stdin>>;

/// Router Chat - talk to any OpenRouter model
#[derive(Parser, Debug)]
#[command(name = "router-chat")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Model to chat with (overrides config and ROUTER_CHAT_MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Path to an alternative config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Connect an OpenRouter account in the browser
    Login,
    /// Forget the stored API key
    Logout,
    /// Show whether an account is connected
    Status,
    /// Start an interactive chat (default)
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(model) = &cli.model {
        config.chat.model = model.clone();
    }

    let store = open_store(&config)?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Login => {
            login(&config, store).await?;
        }
        Command::Logout => logout(&config, store)?,
        Command::Status => status(&config, store)?,
        Command::Chat => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            run_chat(&config, store, &mut lines).await?;
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose {
        "trace"
    } else if cli.debug {
        "debug"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::load());
    };

    let mut config = Config::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

fn open_store(config: &Config) -> Result<FileStore> {
    let path = config
        .storage
        .resolved_path()
        .context("Could not determine data directory for credentials")?;
    FileStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

fn new_flow(config: &Config, store: FileStore) -> OAuthFlow<FileStore, OpenRouterExchanger> {
    let exchanger = OpenRouterExchanger::new(Some(config.oauth.api_base_url()));
    OAuthFlow::new(store, exchanger)
        .with_base_url(Some(config.oauth.base_url.clone()))
        .with_limit(config.oauth.limit)
}

/// Print a system line.
fn say<W: Write>(out: &mut W, config: &Config, text: impl Into<String>) -> io::Result<()> {
    print_message(out, &config.colors, &Message::system(text), false)
}

/// Run the browser sign-in and hand the store back with the key in it.
async fn login(config: &Config, store: FileStore) -> Result<FileStore> {
    let mut stdout = io::stdout();

    if store.api_key().is_some() {
        say(
            &mut stdout,
            config,
            "Already connected. Run `router-chat logout` to switch accounts.",
        )?;
        return Ok(store);
    }

    let oauth = &config.oauth;
    let server = CallbackServer::bind(oauth.callback_port, oauth.callback_path.as_str())
        .await
        .with_context(|| {
            format!(
                "Failed to listen for the sign-in callback on port {}",
                oauth.callback_port
            )
        })?;
    let callback_url = server.callback_url()?;

    let mut flow = new_flow(config, store);
    let url = flow
        .begin(&callback_url)
        .context("Failed to start authorization")?;

    say(
        &mut stdout,
        config,
        format!("Opening your browser to connect OpenRouter. If it does not open, visit:\n  {url}"),
    )?;
    if let Err(e) = open::that(&url) {
        tracing::warn!("failed to open browser: {e}");
    }

    let params = server
        .wait()
        .await
        .context("Failed to receive the sign-in callback")?;

    match flow.handle_callback(&params).await {
        Ok(()) => match flow.state() {
            ConnectionState::Connected => say(&mut stdout, config, "Connected to OpenRouter.")?,
            ConnectionState::Error(reason) => print_error(
                &mut stdout,
                &config.colors,
                &format!("Authorization was not completed: {reason}"),
            )?,
            state => print_error(
                &mut stdout,
                &config.colors,
                &format!("Authorization did not finish (state: {}).", state.label()),
            )?,
        },
        Err(err) => print_error(&mut stdout, &config.colors, &format!("Sign-in failed: {err}"))?,
    }

    Ok(flow.into_store())
}

fn logout(config: &Config, store: FileStore) -> Result<()> {
    let mut flow = new_flow(config, store);
    flow.disconnect().context("Failed to remove the stored API key")?;
    say(
        &mut io::stdout(),
        config,
        "Disconnected. The stored API key was removed.",
    )?;
    Ok(())
}

fn status(config: &Config, store: FileStore) -> Result<()> {
    let mut flow = new_flow(config, store);
    flow.initialize(&CallbackParams::default())?;

    let mut stdout = io::stdout();
    let text = match flow.store().api_key() {
        Some(key) => format!(
            "{} ({}) via {}",
            flow.state().label(),
            mask_api_key(&key),
            config.oauth.api_base_url()
        ),
        None => format!("{}. Run `router-chat login` to connect.", flow.state().label()),
    };
    say(&mut stdout, config, text)?;
    say(&mut stdout, config, format!("Model: {}", config.chat.model))?;
    Ok(())
}

/// Ask a yes/no question on stdin. Empty input counts as yes.
async fn confirm(lines: &mut StdinLines, question: &str) -> Result<bool> {
    print!("{question} [Y/n] ");
    io::stdout().flush()?;
    let answer = lines.next_line().await?.unwrap_or_default();
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}

async fn run_chat(config: &Config, store: FileStore, lines: &mut StdinLines) -> Result<()> {
    let mut stdout = io::stdout();

    let store = if store.api_key().is_some() {
        store
    } else {
        say(
            &mut stdout,
            config,
            "Connect your OpenRouter account to start chatting.",
        )?;
        if !confirm(lines, "Connect now?").await? {
            return Ok(());
        }
        login(config, store).await?
    };

    let Some(api_key) = store.api_key() else {
        return Ok(());
    };

    let transport = OpenRouterTransport::new(config.oauth.api_base_url(), api_key);
    let mut session = ChatSession::new(config.chat.model.clone(), config.chat.max_tokens)
        .with_greeting(config.chat.greeting.clone());

    say(
        &mut stdout,
        config,
        format!(
            "Chatting with {}. Type /model <name> to switch, /quit to leave.",
            session.model()
        ),
    )?;
    for message in session.messages() {
        print_message(
            &mut stdout,
            &config.colors,
            message,
            session.is_incoming(message),
        )?;
    }

    loop {
        print!("{}", Role::User.prefix());
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let input = match parse_prompt(&line) {
            PromptInput::Quit => break,
            PromptInput::Empty => continue,
            PromptInput::ShowModel => {
                say(&mut stdout, config, format!("Current model: {}", session.model()))?;
                continue;
            }
            PromptInput::SwitchModel(model) => {
                session.set_model(model);
                say(&mut stdout, config, format!("Switched to {model}"))?;
                continue;
            }
            PromptInput::Text(text) => text,
        };

        let mut printer = ReplyPrinter::start(io::stdout(), &config.colors)?;
        let result = session
            .send(&transport, input, |message, loading| {
                printer.update(message, loading)
            })
            .await;
        printer.finish()?;

        if let Err(err) = result {
            print_error(&mut stdout, &config.colors, &format!("Error: {err}"))?;
        }
    }

    Ok(())
}
