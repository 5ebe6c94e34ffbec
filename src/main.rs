//! Agent Zoo driver process
//!
//! Runs the turn-taking loop against the session directory until a stop is
//! requested, either through the stop marker or Ctrl-C.

use agent_zoo::config::ZooConfig;
use agent_zoo::llm::{LoggingClient, OpenAiClient};
use agent_zoo::runtime::{ProductionDriver, StopSignal};
use agent_zoo::store::FileWorkspace;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_zoo=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ZooConfig::from_env();

    std::fs::create_dir_all(&config.session_dir)?;
    let workspace = FileWorkspace::new(config.session_paths());

    let Some(api_key) = config.openai_api_key.clone() else {
        tracing::error!("No LLM API key configured. Set OPENAI_API_KEY.");
        return Err("OPENAI_API_KEY is not set".into());
    };
    let client = LoggingClient::new(OpenAiClient::new(
        api_key,
        config.openai_base_url.as_deref(),
    )?);

    let mut driver = ProductionDriver::new(workspace.clone(), client, config.driver_options());
    driver.start_session(config.opening_message.as_deref())?;

    // Ctrl-C goes through the same marker the control panel uses
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current turn");
            if let Err(e) = workspace.request_stop() {
                tracing::error!(error = %e, "Failed to raise stop marker");
            }
        }
    });

    let outcome = driver.run().await?;
    tracing::info!(
        transcript = %outcome.transcript.display(),
        messages = outcome.messages,
        "Conversation saved"
    );

    Ok(())
}
