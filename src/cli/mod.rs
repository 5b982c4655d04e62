//! Interactive terminal console.
//!
//! The presentation layer for the session coordinator: reads commands with a
//! line editor, prints the expiry warning and countdown, and returns to the
//! login prompt when the session ends.

mod commands;
mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ConsoleConfig;
use crate::identity::{ApiClient, AuthEvent, AuthState, AuthStore, UserCache};
use crate::session::{CoordinatorOptions, SessionCoordinator, SessionPhase};

pub use commands::{parse_command, Command, HELP};
pub use render::{countdown_line, format_countdown, should_announce, status_line, warning_banner};

const PROMPT: &str = "saintbi> ";

pub async fn run(config: ConsoleConfig) -> Result<()> {
    let api = ApiClient::new(config.base_url()?).context("building HTTP client")?;
    let store = Arc::new(AuthStore::restore(api, UserCache::at(&config.user_cache)));
    let coordinator = SessionCoordinator::mount(store.clone(), CoordinatorOptions::default());

    println!("SAINT BI console, API at {}", config.api_url);
    match store.current_user() {
        Some(u) => println!("Resumed session for '{}'.", u.username),
        None => println!("Not signed in. Use `login <user> <password>`."),
    }

    let renderer = tokio::spawn(render_session_events(coordinator.clone(), store.clone()));
    let mut lines = spawn_line_reader()?;

    while let Some(line) = lines.recv().await {
        match parse_command(&line) {
            Command::Quit => break,
            cmd => handle_command(cmd, &store, &coordinator).await,
        }
    }

    coordinator.teardown();
    renderer.abort();
    Ok(())
}

async fn handle_command(cmd: Command, store: &Arc<AuthStore>, coordinator: &SessionCoordinator<AuthStore>) {
    match cmd {
        Command::Login { username, password } => match store.login(&username, &password).await {
            Ok(user) => {
                coordinator.start();
                println!("Welcome, {}.", user.username);
                if user.first_login {
                    println!("This account still uses its provisioned password; set a new one with `password <new> <confirm>`.");
                }
            }
            Err(e) => println!("login failed: {}", e),
        },
        Command::Logout => {
            if !store.is_authenticated() {
                println!("Not signed in.");
            }
            coordinator.logout().await;
        }
        Command::Extend => {
            if coordinator.phase() == SessionPhase::Idle && !coordinator.is_extending() {
                println!("No active session to extend.");
                return;
            }
            coordinator.extend().await;
            if coordinator.phase() == SessionPhase::Counting {
                println!("Session extended.");
            }
        }
        Command::Status => {
            println!("{}", status_line(store.current_user().as_ref(), coordinator.phase(), coordinator.expires_in()));
        }
        Command::WhoAmI => match store.current_user() {
            Some(u) => println!("{} (id {})", u.username, u.id),
            None => println!("Not signed in."),
        },
        Command::Password { new_password, confirm_password } => {
            match store.change_password(&new_password, &confirm_password).await {
                Ok(()) => println!("Password updated."),
                Err(e) => println!("password change failed: {}", e),
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Usage(usage) => println!("usage: {}", usage),
        Command::Unknown(word) => println!("unknown command '{}'; type `help`", word),
        Command::Empty | Command::Quit => {}
    }
}

/// Prints the warning, the countdown and logout notices as the coordinator publishes them.
async fn render_session_events(coordinator: SessionCoordinator<AuthStore>, store: Arc<AuthStore>) {
    let mut warning = coordinator.subscribe_warning();
    let mut remaining = coordinator.subscribe_remaining();
    let mut auth = store.subscribe();
    let start_value = coordinator.timing().warning_seconds();
    loop {
        tokio::select! {
            changed = warning.changed() => {
                if changed.is_err() { break; }
                if *warning.borrow_and_update() {
                    println!("\n{}", warning_banner(*remaining.borrow()));
                }
            }
            changed = remaining.changed() => {
                if changed.is_err() { break; }
                let secs = *remaining.borrow_and_update();
                if *warning.borrow() && secs != start_value && should_announce(secs) {
                    println!("{}", countdown_line(secs));
                }
            }
            changed = auth.changed() => {
                if changed.is_err() { break; }
                let event = auth.borrow_and_update().clone();
                if event == AuthEvent::LoggedOut {
                    println!("\nSession closed. Use `login <user> <password>` to sign in again.");
                }
            }
        }
    }
    debug!(target: "saintbi::cli", "session renderer stopped");
}

/// Line editing blocks, so it runs on its own thread and feeds lines over a channel.
/// EOF and Ctrl-C both end the console.
fn spawn_line_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("saintbi-readline".into())
        .spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(ed) => ed,
                Err(e) => {
                    warn!(target: "saintbi::cli", "cannot initialise line editor: {}", e);
                    let _ = tx.send("quit".to_string());
                    return;
                }
            };
            read_lines(&mut editor, &tx);
        })
        .context("spawning line reader")?;
    Ok(rx)
}

fn read_lines(editor: &mut DefaultEditor, tx: &mpsc::UnboundedSender<String>) {
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.send("quit".to_string());
                break;
            }
            Err(e) => {
                warn!(target: "saintbi::cli", "line editor failed: {}", e);
                let _ = tx.send("quit".to_string());
                break;
            }
        }
    }
}
