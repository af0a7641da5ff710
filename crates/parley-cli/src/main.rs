//! parley CLI: Command-line interface for conversational sessions

use clap::{Parser, Subcommand};
use parley_engine::{
    ChatStrings, CommandResponder, Config, ConversationController, Message, Responder,
    SendOutcome, Session, SessionStore, SkipReason,
};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Chat with a model CLI from the terminal
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat in the active session (default when no command specified)
    Chat {
        /// Start a fresh session instead of resuming
        #[arg(long)]
        new: bool,
    },

    /// Initialize .parley/ directory and config
    Init,

    /// Send a single message to the active session
    Send {
        /// Message text
        text: String,

        /// Output the appended messages as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the active session transcript
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List saved sessions
    Sessions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a new session and make it active
    New,
}

const PARLEY_DIR: &str = ".parley";

fn main() {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        None => run_async(cmd_chat(false)),
        Some(Commands::Chat { new }) => run_async(cmd_chat(new)),
        Some(Commands::Init) => cmd_init(),
        Some(Commands::Send { text, json }) => run_async(cmd_send(text, json)),
        Some(Commands::History { json }) => cmd_history(json),
        Some(Commands::Sessions { json }) => cmd_sessions(json),
        Some(Commands::New) => cmd_new(),
    }
}

/// Log to stderr so transcript output on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("PARLEY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_async(fut: impl std::future::Future<Output = ()>) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => fail(&format!("Failed to create tokio runtime: {e}")),
    };
    rt.block_on(fut);
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn load_config() -> Config {
    let path = Path::new(PARLEY_DIR).join("config.json");
    match Config::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => fail(&format!("loading {}: {e}", path.display())),
    }
}

fn open_store() -> SessionStore {
    match SessionStore::new(PARLEY_DIR) {
        Ok(store) => store,
        Err(e) => fail(&format!("opening session store: {e}")),
    }
}

/// Resume the active session, or start a new one.
fn open_session(store: &SessionStore, fresh: bool) -> Session {
    if fresh {
        return Session::new();
    }
    match store.load_active() {
        Ok(Some(session)) => session,
        Ok(None) => Session::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Active session could not be loaded, starting fresh");
            Session::new()
        }
    }
}

fn save_session(store: &SessionStore, session: &Session) {
    if let Err(e) = store.save(session).and_then(|()| store.set_active(&session.id)) {
        eprintln!("Warning: failed to save session: {e}");
    }
}

fn build_controller(
    store: &SessionStore,
    config: &Config,
    fresh: bool,
) -> ConversationController<CommandResponder> {
    let responder = CommandResponder::new(config.responder.clone());
    if !responder.is_available() {
        eprintln!(
            "Warning: responder '{}' not found on PATH; replies will fail",
            config.responder.program().unwrap_or("<none>")
        );
    }

    let controller = ConversationController::new(open_session(store, fresh), responder);
    if controller.initialize(&config.strings.welcome) {
        save_session(store, &controller.snapshot());
    }
    controller
}

async fn cmd_chat(fresh: bool) {
    let config = load_config();
    let store = open_store();
    let controller = build_controller(&store, &config, fresh);

    for message in controller.history() {
        print_message(&message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} > ", config.strings.placeholder);
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => fail(&format!("reading input: {e}")),
        };

        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }

        let outcome = send_with_indicator(&controller, &config.strings, &line).await;
        for message in outcome.appended() {
            if message.is_assistant() {
                print_message(message);
            }
        }
        if !outcome.is_skipped() {
            save_session(&store, &controller.snapshot());
        }
    }
}

/// Send while showing the thinking label for as long as the send is pending.
async fn send_with_indicator<R: Responder>(
    controller: &ConversationController<R>,
    strings: &ChatStrings,
    text: &str,
) -> SendOutcome {
    let mut pending = controller.subscribe_pending();
    let send = controller.send(text);
    tokio::pin!(send);

    loop {
        tokio::select! {
            outcome = &mut send => return outcome,
            changed = pending.changed() => {
                if changed.is_err() {
                    return (&mut send).await;
                }
                if *pending.borrow_and_update() {
                    eprintln!("{}", strings.thinking);
                }
            }
        }
    }
}

async fn cmd_send(text: String, json: bool) {
    let config = load_config();
    let store = open_store();
    let controller = build_controller(&store, &config, false);

    let outcome = controller.send(&text).await;
    match &outcome {
        SendOutcome::Skipped(SkipReason::EmptyInput) => fail("message is empty"),
        SendOutcome::Skipped(SkipReason::Busy) => fail("a send is already in progress"),
        SendOutcome::Replied { .. } | SendOutcome::Failed { .. } => {
            save_session(&store, &controller.snapshot());
        }
    }

    if json {
        let appended = outcome.appended();
        match serde_json::to_string_pretty(&appended) {
            Ok(out) => println!("{out}"),
            Err(e) => fail(&format!("serializing messages: {e}")),
        }
        return;
    }

    for message in outcome.appended() {
        print_message(message);
    }
}

fn cmd_init() {
    // Creates .parley/sessions
    let _store = open_store();

    let config_path = Path::new(PARLEY_DIR).join("config.json");
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        match Config::default().save(&config_path) {
            Ok(()) => println!("Created {}", config_path.display()),
            Err(e) => fail(&format!("writing config: {e}")),
        }
    }

    println!("\nInitialization complete!");
    println!("Edit {} to choose a responder", config_path.display());
}

fn cmd_history(json: bool) {
    let store = SessionStore::open(PARLEY_DIR);
    let session = match store.load_active() {
        Ok(Some(session)) => session,
        Ok(None) => {
            if json {
                println!("[]");
            } else {
                println!("No active session");
            }
            return;
        }
        Err(e) => fail(&format!("loading active session: {e}")),
    };

    let history = session.history();
    if json {
        match serde_json::to_string_pretty(&history) {
            Ok(out) => println!("{out}"),
            Err(e) => fail(&format!("serializing history: {e}")),
        }
        return;
    }

    println!("{} ({})\n", session.title, session.id);
    for message in &history {
        print_message(message);
    }
}

fn cmd_sessions(json: bool) {
    let store = SessionStore::open(PARLEY_DIR);
    let sessions = match store.list() {
        Ok(list) => list,
        Err(e) => fail(&format!("listing sessions: {e}")),
    };

    if json {
        match serde_json::to_string_pretty(&sessions) {
            Ok(out) => println!("{out}"),
            Err(e) => fail(&format!("serializing sessions: {e}")),
        }
        return;
    }

    if sessions.is_empty() {
        println!("No saved sessions");
        return;
    }

    for summary in &sessions {
        let marker = if summary.is_active { "*" } else { " " };
        println!(
            "{marker} {}  {}  ({} messages, updated {})",
            summary.id,
            summary.title,
            summary.message_count,
            summary.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn cmd_new() {
    let config = load_config();
    let store = open_store();
    let controller = build_controller(&store, &config, true);
    let session = controller.into_session();
    save_session(&store, &session);
    println!("Started session {}", session.id);
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.timestamp().format("%H:%M:%S"),
        message.role(),
        message.content()
    );
}
