//! Palaver CLI: a minimal authenticated chat client.

mod prompt;
mod style;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Color;
use palaver_api::IdentityClient;
use palaver_channel::ChannelClient;
use palaver_config::{CliOverrides, PalaverConfig};
use palaver_core::{AuthSession, ChatController, Route};
use palaver_session::{FileStore, KeyValueStore, SessionId, SessionStore};
use palaver_types::PalaverError;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufRead;

use prompt::Prompter;

#[derive(Parser)]
#[command(name = "palaver", version, about = "A minimal authenticated chat client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Identity service base URL (overrides PALAVER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Chat relay WebSocket URL (overrides PALAVER_CHANNEL_URL)
    #[arg(long, global = true)]
    channel_url: Option<String>,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with a username or email
    Login {
        #[arg(long)]
        identifier: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored credentials
    Logout,
    /// Refresh and show the logged-in user's profile
    Whoami,
    /// List saved chat sessions
    Sessions,
    /// Open the interactive chat (the default)
    Chat {
        /// Reopen a saved session instead of starting a new one
        #[arg(long)]
        session: Option<SessionId>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = PalaverConfig::load(CliOverrides {
        api_url: cli.api_url,
        channel_url: cli.channel_url,
    })
    .map_err(PalaverError::from)?;
    tracing::debug!(
        "Identity service {}, relay {}, data in {}",
        config.api_url,
        config.channel_url,
        config.data_dir.display()
    );

    let (kv, client) = open_services(&config)
        .with_context(|| format!("Failed to start with data in {}", config.data_dir.display()))?;

    let mut auth = AuthSession::new(Arc::new(client), Arc::clone(&kv));
    auth.resume().await;
    let store = SessionStore::new(kv);
    let mut input = Prompter::stdin();

    match cli.command.unwrap_or(Command::Chat { session: None }) {
        Command::Login {
            identifier,
            password,
        } => login(&mut auth, &mut input, identifier, password).await,
        Command::Register {
            username,
            email,
            password,
        } => register(&mut auth, &mut input, username, email, password).await,
        Command::Logout => {
            auth.logout();
            eprintln!("Logged out.");
            Ok(())
        }
        Command::Whoami => whoami(&mut auth).await,
        Command::Sessions => {
            print_sessions(&store.summaries(), None);
            Ok(())
        }
        Command::Chat { session } => {
            if Route::Chat.resolve(auth.state()) == Route::Login {
                eprintln!("Not logged in. Log in to continue, or run `palaver register`.");
                login(&mut auth, &mut input, None, None).await?;
            }
            let controller =
                ChatController::new(store, ChannelClient::new(), config.channel_url.clone());
            chat(auth, controller, input, session).await
        }
    }
}

/// Open the local store and the identity client.
fn open_services(
    config: &PalaverConfig,
) -> Result<(Arc<dyn KeyValueStore>, IdentityClient), PalaverError> {
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.data_dir.join("data"))?);
    let client = IdentityClient::new(
        &config.api_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok((kv, client))
}

async fn login<R: AsyncBufRead + Unpin>(
    auth: &mut AuthSession,
    input: &mut Prompter<R>,
    identifier: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let identifier = input.or_ask(identifier, "Username or email").await?;
    let password = input.or_ask_secret(password, "Password").await?;
    let user = auth
        .login(&identifier, &password)
        .await
        .map_err(PalaverError::from)
        .context("Login failed")?;
    eprintln!("Logged in as {}.", style::bold(&user.username));
    Ok(())
}

async fn register<R: AsyncBufRead + Unpin>(
    auth: &mut AuthSession,
    input: &mut Prompter<R>,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let username = input.or_ask(username, "Username").await?;
    let email = input.or_ask(email, "Email").await?;
    let password = input.or_ask_secret(password, "Password").await?;
    let user = auth
        .register(&username, &email, &password)
        .await
        .map_err(PalaverError::from)
        .context("Registration failed")?;
    eprintln!(
        "Registered and logged in as {}.",
        style::bold(&user.username)
    );
    Ok(())
}

async fn whoami(auth: &mut AuthSession) -> Result<()> {
    if !auth.is_authenticated() {
        return Err(PalaverError::NotAuthenticated.into());
    }
    let user = auth
        .fetch_profile()
        .await
        .map_err(PalaverError::from)
        .context("Session is no longer valid; logged out")?;
    println!("{} <{}> (id {})", style::bold(&user.username), user.email, user.id);
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

async fn chat<R: AsyncBufRead + Unpin>(
    mut auth: AuthSession,
    mut controller: ChatController,
    mut input: Prompter<R>,
    resume: Option<SessionId>,
) -> Result<()> {
    controller
        .start_with(resume)
        .await
        .context("Failed to create chat session")?;

    let username = auth.user().map(|u| u.username.clone()).unwrap_or_default();
    eprintln!(
        "palaver v{} (user: {}, session: {})",
        env!("CARGO_PKG_VERSION"),
        username,
        controller.active_session().unwrap_or_default()
    );
    if !controller.channel().is_open() {
        eprintln!(
            "{}",
            style::fg_color(
                "Chat relay unreachable; messages will be saved locally only.",
                Color::Red
            )
        );
    }
    eprintln!("Type a message. /help for commands, Ctrl+D to exit.\n");
    print_transcript(&controller, auth.user().map(|u| u.username.as_str()));

    loop {
        show_prompt()?;
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    eprintln!();
                    break;
                };
                if let Flow::Quit = handle_line(&line, &mut auth, &mut controller).await {
                    break;
                }
            }
            Some(message) = controller.next_inbound() => {
                let me = auth.user().map(|u| u.username.as_str());
                eprint!("\r");
                println!("{}", style::message_line(&message, me));
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

async fn handle_line(line: &str, auth: &mut AuthSession, controller: &mut ChatController) -> Flow {
    if line.starts_with('/') {
        return handle_slash_command(line.trim(), auth, controller).await;
    }
    if controller.send_message(auth.user(), line).is_some() && !controller.channel().is_open() {
        eprintln!("{}", style::dim("(not connected; saved locally)"));
    }
    Flow::Continue
}

async fn handle_slash_command(
    input: &str,
    auth: &mut AuthSession,
    controller: &mut ChatController,
) -> Flow {
    let (cmd, args) = match input.split_once(' ') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (input, None),
    };

    match cmd {
        "/quit" | "/exit" => Flow::Quit,
        "/help" => {
            print_help();
            Flow::Continue
        }
        "/sessions" => {
            let summaries: Vec<_> = controller
                .sessions()
                .iter()
                .map(|s| s.to_summary())
                .collect();
            print_sessions(&summaries, controller.active_session());
            Flow::Continue
        }
        "/switch" => {
            let Some(id) = args.and_then(|a| a.parse::<SessionId>().ok()) else {
                eprintln!("Usage: /switch <session-id>");
                return Flow::Continue;
            };
            if controller.switch_session(id) {
                eprintln!("Switched to session {id}.");
                print_transcript(controller, auth.user().map(|u| u.username.as_str()));
            } else {
                eprintln!("No saved session {id}; starting with an empty transcript.");
            }
            Flow::Continue
        }
        "/new" => {
            match controller.new_session() {
                Ok(session) => eprintln!("New session {}.", session.id),
                Err(e) => eprintln!("Failed to create session: {e}"),
            }
            Flow::Continue
        }
        "/whoami" => match auth.fetch_profile().await {
            Ok(user) => {
                eprintln!("{} <{}> (id {})", style::bold(&user.username), user.email, user.id);
                Flow::Continue
            }
            Err(e) => {
                eprintln!("Session is no longer valid ({e}); logged out.");
                Flow::Quit
            }
        },
        "/logout" => {
            controller.shutdown().await;
            auth.logout();
            eprintln!("Logged out.");
            Flow::Quit
        }
        _ => {
            eprintln!("Unknown command: {input}. Type /help for available commands.");
            Flow::Continue
        }
    }
}

fn show_prompt() -> io::Result<()> {
    let mut err = io::stderr();
    write!(err, "> ")?;
    err.flush()
}

fn print_transcript(controller: &ChatController, me: Option<&str>) {
    for message in controller.transcript() {
        println!("{}", style::message_line(message, me));
    }
}

fn print_sessions(summaries: &[palaver_session::SessionSummary], active: Option<SessionId>) {
    if summaries.is_empty() {
        eprintln!("No saved sessions.");
        return;
    }
    eprintln!("Saved sessions:");
    for summary in summaries {
        eprintln!("  {}", style::summary_line(summary, active));
    }
}

fn print_help() {
    eprintln!("Available commands:");
    eprintln!("  /help            Show this help");
    eprintln!("  /sessions        List sessions (* marks the active one)");
    eprintln!("  /switch <id>     Switch to a saved session");
    eprintln!("  /new             Start a new session");
    eprintln!("  /whoami          Refresh and show your profile");
    eprintln!("  /logout          Log out and exit");
    eprintln!("  /quit            Exit");
}
