//! Command-line surface.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use perplexity_api::cancel::new_cancellation_signal;
use perplexity_api::{CancellationSignal, PerplexityApiConfig, PerplexityClient, DEFAULT_MODEL};
use signal_hook::consts::SIGINT;
use signal_hook::SigId;
use thread_store::{FsThreadStore, ThreadStore};

use crate::completion::{complete, prepare_thread, CompletionOptions};
use crate::config::EnvConfig;
use crate::display::{write_citations, write_thread_detail, write_thread_table};
use crate::pacer::PacerConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "plexctl", version, about = "Stream Perplexity answers and keep thread history")]
pub struct Cli {
    /// Perplexity API token (env PERPLEXITY_API_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Enable debug logs to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Get a completion for a query
    Get(GetArgs),
    /// List threads, or show one with `thread get`
    Thread(ThreadArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    #[arg(required = true, num_args = 1.., value_name = "QUERY")]
    pub query: Vec<String>,

    /// Model name
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Continue an existing thread by ID prefix
    #[arg(long = "thread", value_name = "ID_PREFIX")]
    pub thread: Option<String>,

    /// Max tokens in response (0 for the server default)
    #[arg(long, default_value_t = 0)]
    pub max_tokens: u32,
}

#[derive(Debug, Args)]
pub struct ThreadArgs {
    /// Filter by ID or content substring
    #[arg(long)]
    pub filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<ThreadCommand>,
}

#[derive(Debug, Subcommand)]
pub enum ThreadCommand {
    /// Show a thread's messages
    Get {
        #[arg(value_name = "ID_PREFIX")]
        thread_id: String,
    },
}

pub async fn run(cli: Cli, env: EnvConfig) -> Result<()> {
    let store = match env.thread_dir.as_deref() {
        Some(dir) => FsThreadStore::open(dir),
        None => FsThreadStore::open_default(),
    }
    .context("failed to init store")?;
    tracing::debug!(dir = %store.base().display(), "thread store ready");

    match cli.command {
        Command::Get(args) => {
            let token = env
                .resolve_token(cli.token.as_deref())
                .context("No token provided. Set via --token or PERPLEXITY_API_TOKEN.")?;
            run_get(args, token, &env, &store).await
        }
        Command::Thread(args) => run_thread(args, &store),
    }
}

async fn run_get(
    args: GetArgs,
    token: String,
    env: &EnvConfig,
    store: &FsThreadStore,
) -> Result<()> {
    let query = args.query.join(" ");
    let thread = prepare_thread(store, args.thread.as_deref(), &query)?;

    let client = PerplexityClient::new(client_config(token, env))?;
    let options = CompletionOptions {
        model: args.model,
        max_tokens: args.max_tokens,
    };

    let stdout = io::stdout();
    let pacer = PacerConfig::default().with_hidden_cursor(stdout.is_terminal());
    let cancel = new_cancellation_signal();
    let _interrupt = InterruptGuard::register(&cancel)?;

    let outcome = complete(&client, store, thread, &options, stdout, pacer, &cancel).await;

    let reply = match &outcome {
        Ok(completion) => Some(&completion.reply),
        Err(error) => error.streamed_reply(),
    };
    if let Some(reply) = reply {
        let mut out = io::stdout().lock();
        if !reply.text.is_empty() && reply.citations.is_empty() {
            writeln!(out)?;
        }
        write_citations(&mut out, &reply.citations)?;
    }

    let completion = outcome?;
    tracing::debug!(
        thread_id = %completion.thread.id,
        saved = ?completion.saved,
        "turn complete"
    );
    Ok(())
}

fn client_config(token: String, env: &EnvConfig) -> PerplexityApiConfig {
    let config = PerplexityApiConfig::new(token).with_connect_timeout(CONNECT_TIMEOUT);
    match env.base_url.as_deref() {
        Some(base_url) => config.with_base_url(base_url),
        None => config,
    }
}

fn run_thread(args: ThreadArgs, store: &dyn ThreadStore) -> Result<()> {
    let mut out = io::stdout().lock();
    match args.command {
        Some(ThreadCommand::Get { thread_id }) => {
            if thread_id.trim().is_empty() {
                bail!("thread id prefix must not be empty");
            }
            let thread = store.load(&thread_id)?;
            write_thread_detail(&mut out, &thread)?;
        }
        None => {
            let threads = store.list()?;
            write_thread_table(&mut out, &threads, args.filter.as_deref())?;
        }
    }
    Ok(())
}

/// Joins an error and its causes with `: `, skipping causes whose text the
/// message already carries.
pub fn error_report(error: &anyhow::Error) -> String {
    let mut message = String::new();
    for cause in error.chain() {
        let text = cause.to_string();
        if message.contains(&text) {
            continue;
        }
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(&text);
    }
    message
}

/// Routes Ctrl-C into the call's cancellation signal while alive.
///
/// A second Ctrl-C, or any Ctrl-C after the guard is dropped, terminates the
/// process the default way.
struct InterruptGuard {
    ids: [SigId; 2],
}

impl InterruptGuard {
    fn register(cancel: &CancellationSignal) -> Result<Self> {
        // Registered first so it sees the flag before this delivery sets it.
        let terminate =
            signal_hook::flag::register_conditional_default(SIGINT, Arc::clone(cancel))
                .context("failed to install Ctrl-C handler")?;
        let cancel_id = match signal_hook::flag::register(SIGINT, Arc::clone(cancel)) {
            Ok(id) => id,
            Err(error) => {
                signal_hook::low_level::unregister(terminate);
                return Err(error).context("failed to install Ctrl-C handler");
            }
        };
        Ok(Self {
            ids: [terminate, cancel_id],
        })
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        for id in self.ids {
            signal_hook::low_level::unregister(id);
        }
        let always = Arc::new(AtomicBool::new(true));
        if let Err(error) = signal_hook::flag::register_conditional_default(SIGINT, always) {
            tracing::warn!(%error, "failed to restore default Ctrl-C handling");
        }
    }
}
