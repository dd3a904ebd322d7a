use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petkat::api::ForecastClient;
use petkat::chat::{ChatAgent, TurnCallback, TurnEvent};
use petkat::config::Config;
use petkat::llm::{ClaudeProvider, LlmProvider, Message, StreamEvent};
use petkat::server;
use petkat::tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "petkat")]
#[command(author, version, about = "Sales-forecast assistant for Petshop Kat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (health, chat SSE, Excel upload)
    Serve {
        /// Port to listen on (overrides PETKAT_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides PETKAT_HOST)
        #[arg(long)]
        host: Option<String>,
    },

    /// Ask the assistant one question from the command line
    Ask {
        /// The question, in Spanish or English
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "petkat=debug"
    } else {
        "petkat=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Fail fast on a missing or malformed backend URL.
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            server::serve(config).await?;
        }
        Commands::Ask { message } => {
            run_ask(&config, message).await?;
        }
    }

    Ok(())
}

async fn run_ask(config: &Config, message: String) -> Result<()> {
    let api = Arc::new(ForecastClient::new(config.api.base_url.clone()));
    let tools = Arc::new(ToolRegistry::with_defaults(api));
    let provider = ClaudeProvider::from_env()?
        .with_model(&config.chat.model)
        .with_max_tokens(config.chat.max_tokens);
    let agent = ChatAgent::new(Arc::new(provider) as Arc<dyn LlmProvider>, tools)
        .with_max_tool_rounds(config.chat.max_tool_rounds);

    let callback: TurnCallback = Arc::new(|event| match event {
        TurnEvent::Stream(StreamEvent::TextDelta(text)) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::ToolResult { name, result, .. } => {
            tracing::info!(tool = %name, tag = result.tag(), "tool finished");
        }
        _ => {}
    });

    let turn = agent
        .run_turn(
            &[Message::user(message)],
            callback,
            Arc::new(AtomicBool::new(false)),
        )
        .await?;
    println!();
    tracing::info!(
        rounds = turn.rounds,
        tool_calls = turn.tool_calls_made,
        input_tokens = turn.usage.input_tokens,
        output_tokens = turn.usage.output_tokens,
        "turn complete"
    );
    Ok(())
}
