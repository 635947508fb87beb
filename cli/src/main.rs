use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use threadline::config::ConfigError;
use threadline::gate::{Navigator, check_session};
use threadline::theme::HeadlessDocument;
use threadline::types::Route;
use threadline::{AppProvider, BackendConfig, BackendError, ProviderView, SupabaseClient};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("missing credentials; pass --email and --password or set THREADLINE_EMAIL and THREADLINE_PASSWORD")]
    MissingCredentials,
    #[error("{0}")]
    Provider(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "threadline", about = "Threadline session and profile CLI")]
struct Cli {
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Default)]
struct CredentialArgs {
    #[arg(long, env = "THREADLINE_EMAIL", global = true)]
    email: Option<String>,

    #[arg(long, env = "THREADLINE_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    email: String,
    password: String,
}

impl CredentialArgs {
    /// Both values, or none. Half a pair is an error.
    fn resolve(&self) -> Result<Option<Credentials>, CliError> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok(Some(Credentials { email: email.clone(), password: password.clone() })),
            (None, None) => Ok(None),
            _ => Err(CliError::MissingCredentials),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the session gate once and print the route it picks.
    Gate,
    /// Sign in, load profile and posts, and print them as JSON.
    Show,
    /// Run the provider loop and log every state change until Ctrl-C.
    Watch,
}

struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn go_to(&self, route: Route) {
        println!("{}", route.path());
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = backend_config(cli.supabase_url, cli.anon_key, |key| std::env::var(key).ok())?;
    let credentials = cli.credentials.resolve()?;
    let client = Arc::new(SupabaseClient::new(config)?);

    match cli.command {
        Command::Gate => run_gate(&client, credentials).await,
        Command::Show => run_show(client, credentials).await,
        Command::Watch => run_watch(client, credentials).await,
    }
}

/// Flags win over the environment for the two connection values; everything
/// else comes from `env`.
fn backend_config<F>(url: Option<String>, anon_key: Option<String>, env: F) -> Result<BackendConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    BackendConfig::from_lookup(|key| match key {
        "SUPABASE_URL" => url.clone().or_else(|| env(key)),
        "SUPABASE_ANON_KEY" => anon_key.clone().or_else(|| env(key)),
        _ => env(key),
    })
}

async fn sign_in(client: &SupabaseClient, credentials: Option<Credentials>) -> Result<(), CliError> {
    if let Some(Credentials { email, password }) = credentials {
        client.sign_in_with_password(&email, &password).await?;
    }
    Ok(())
}

async fn run_gate(client: &SupabaseClient, credentials: Option<Credentials>) -> Result<(), CliError> {
    // A failed sign-in still runs the gate; it reports login.
    if let Err(e) = sign_in(client, credentials).await {
        tracing::warn!(error = %e, "sign-in failed");
    }
    check_session(client, &PrintNavigator).await;
    Ok(())
}

async fn run_show(client: Arc<SupabaseClient>, credentials: Option<Credentials>) -> Result<(), CliError> {
    let credentials = credentials.ok_or(CliError::MissingCredentials)?;
    let document = Arc::new(HeadlessDocument::default());
    let provider = AppProvider::for_supabase(client.clone(), document.clone(), document);

    let mut subscription = provider.start().await;
    sign_in(&client, Some(credentials)).await?;
    while let Some(event) = subscription.try_recv() {
        provider.handle_auth_event(event);
    }
    provider.refresh().await;

    let state = provider.snapshot();
    if let ProviderView::Error(message) = ProviderView::aggregate(&state) {
        return Err(CliError::Provider(message));
    }
    let output = json!({
        "profile": state.profile().status().data(),
        "profile_picture_url": provider.profile_picture_url()?,
        "posts": state.posts(),
    });
    print_json(&output)
}

async fn run_watch(client: Arc<SupabaseClient>, credentials: Option<Credentials>) -> Result<(), CliError> {
    let document = Arc::new(HeadlessDocument::default());
    let provider = Arc::new(AppProvider::for_supabase(client.clone(), document.clone(), document));

    let mut rx = provider.subscribe_state();
    let subscription = provider.start().await;
    provider.refresh().await;
    let runner = tokio::spawn({
        let provider = provider.clone();
        async move { provider.run(subscription).await }
    });
    sign_in(&client, credentials).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let (view, epoch, user_id) = {
                    let state = rx.borrow_and_update();
                    (ProviderView::aggregate(&state), state.epoch(), state.principal_id())
                };
                tracing::info!(?view, epoch, ?user_id, "state changed");
            }
            result = &mut ctrl_c => {
                result?;
                break;
            }
        }
    }

    client.sign_out().await;
    runner.abort();
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
