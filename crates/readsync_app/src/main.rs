//! readsync: command-line client for the reading backend's reviews, search
//! and rewards.

mod platform;

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine_logging::engine_info;
use readsync_core::{AwardKey, Msg, ScreenState};
use readsync_engine::EngineHandle;

use platform::app::Session;
use platform::config::AppConfig;
use platform::effects::EffectRunner;
use platform::logging::{self, LogDestination};
use platform::persistence::LedgerStore;

#[derive(Parser)]
#[command(name = "readsync")]
#[command(about = "Keep a reading screen in sync with the backend")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "readsync.ron")]
    config: PathBuf,

    /// Backend base URL (overrides config file)
    #[arg(long, env = "READSYNC_API_URL")]
    api_url: Option<String>,

    /// Bearer token for authenticated calls
    #[arg(long, env = "READSYNC_TOKEN")]
    token: Option<String>,

    /// Data directory for the award ledger
    #[arg(long, env = "READSYNC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Identity the award ledger belongs to
    #[arg(long, env = "READSYNC_NAMESPACE")]
    namespace: Option<String>,

    #[arg(long)]
    page_size: Option<u32>,

    #[arg(long, value_enum)]
    log: Option<LogDestination>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the discussion for a book
    Show { item: String },
    /// Post a top-level review
    Post { item: String, text: String },
    /// Reply to a review or reply
    Reply {
        item: String,
        parent: String,
        text: String,
    },
    /// Change the text of a review
    Edit {
        item: String,
        review: String,
        text: String,
    },
    /// Delete a review and its replies
    Delete { item: String, review: String },
    /// Search books
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Mark a book finished and collect any reward
    Finish { book: String },
    /// Forget the award ledger for this identity
    SignOut,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }
    if let Some(token) = cli.token {
        config.api.bearer_token = Some(token);
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    if let Some(log) = cli.log {
        config.log = log;
    }

    logging::initialize(config.log, &config.log_file, cli.verbose);
    engine_info!("Backend: {}", config.api.base_url);
    engine_info!("Data dir: {}", config.data_dir.display());

    let engine = EngineHandle::with_settings(config.api.to_settings())
        .context("building HTTP client")?;
    let ledger = LedgerStore::new(config.data_dir.clone(), &config.namespace);
    let state = ScreenState::new()
        .with_viewer(config.viewer())
        .with_page_size(config.page_size)
        .with_banner_interval(config.banner_interval());
    let mut session = Session::new(state, EffectRunner::new(engine, ledger));
    let timeout = config.wait_timeout();

    match cli.command {
        Command::Show { item } => {
            open(&mut session, item, timeout);
        }
        Command::Post { item, text } => {
            open(&mut session, item, timeout);
            session.dispatch(Msg::PostRoot { text, at: Utc::now() });
        }
        Command::Reply { item, parent, text } => {
            open(&mut session, item, timeout);
            session.dispatch(Msg::PostReply {
                parent_id: parent,
                text,
                at: Utc::now(),
            });
        }
        Command::Edit { item, review, text } => {
            open(&mut session, item, timeout);
            session.dispatch(Msg::EditRequested {
                node_id: review,
                text,
                at: Utc::now(),
            });
        }
        Command::Delete { item, review } => {
            open(&mut session, item, timeout);
            session.dispatch(Msg::DeleteRequested {
                node_id: review,
                at: Utc::now(),
            });
        }
        Command::Search { query, page } => {
            session.dispatch(Msg::QueryChanged { query });
            session.run_until_idle(timeout);
            if page > 1 {
                session.dispatch(Msg::PageRequested { page });
            }
        }
        Command::Finish { book } => {
            session.dispatch(Msg::FactReported {
                key: AwardKey::new(book, "finished"),
            });
        }
        Command::SignOut => {
            session.dispatch(Msg::SignedOut);
        }
    }

    session.run_until_idle(timeout);
    session.flush_banners();
    session.print();
    Ok(())
}

fn open(session: &mut Session, item: String, timeout: std::time::Duration) {
    session.dispatch(Msg::ItemOpened { item });
    session.run_until_idle(timeout);
}
