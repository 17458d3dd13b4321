use anyhow::Context;
use chat_api::{new_cancel_signal, ChatClient};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deepseek_chat::secret::resolve_api_key;
use deepseek_chat::signals::install_interrupt_flag;
use deepseek_chat::{ChatSession, Cli, EnvConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = EnvConfig::from_env();
    let settings = Cli::parse().resolve(&env);

    // RUST_LOG overrides; --verbose raises the default to debug.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let api_key = resolve_api_key(settings.api_key_file.as_deref(), env.api_key.as_deref())?;
    let client = ChatClient::new(settings.client_config(api_key))
        .context("building chat client")?;

    let cancel = new_cancel_signal();
    install_interrupt_flag(&cancel).context("installing signal handlers")?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut session = ChatSession::new(&client, stdin, std::io::stdout(), cancel);
    session.run(settings.history.as_deref()).await?;
    Ok(())
}
