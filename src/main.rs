use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand, ValueEnum};
use hjmcp_stdio::{
    client::{McpClient, ServerCommand},
    config::Config,
    demo, logging,
    mcp::server::Router,
    stdio, AppState,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "hjmcp-stdio", version, about = "MCP demo server and client over stdio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP requests on stdin/stdout
    Serve {
        /// Project root exposed to tools and resources (overrides MCP_PROJECT_ROOT)
        #[arg(long)]
        project_root: Option<PathBuf>,
    },
    /// Spawn a server subprocess and run a scripted client session against it
    Demo {
        #[arg(value_enum)]
        scenario: Scenario,

        /// Per-request timeout in milliseconds (overrides MCP_REQUEST_TIMEOUT_MS)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Project root handed to the spawned server
        #[arg(long)]
        project_root: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// Evaluate a series of expressions with the `calculate` tool
    Calculator,
    /// Handshake and list tools, prompts and resources
    Smoke,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { project_root } => {
            if let Some(project_root) = project_root {
                config = config.with_project_root(project_root)?;
            }

            info!(
                project_root = %config.project_root.display(),
                version = env!("CARGO_PKG_VERSION"),
                "server starting"
            );
            let state = Arc::new(AppState::new(config.project_root));
            stdio::serve_stdio(&Router::standard(), state).await?;
        }
        Commands::Demo {
            scenario,
            timeout_ms,
            project_root,
        } => {
            if let Some(timeout_ms) = timeout_ms {
                config = config.with_timeout_ms(timeout_ms)?;
            }
            if let Some(project_root) = project_root {
                config = config.with_project_root(project_root)?;
            }

            let command = ServerCommand::new(std::env::current_exe()?)
                .arg("serve")
                .arg("--project-root")
                .arg(config.project_root.display().to_string())
                .working_dir(&config.project_root);
            let client = McpClient::spawn(&command, config.request_timeout)?;

            let session = match scenario {
                Scenario::Calculator => {
                    demo::calculator_session(&client, &demo::CALCULATOR_EXPRESSIONS).await
                }
                Scenario::Smoke => demo::smoke_session(&client).await,
            };
            let shutdown = client.shutdown().await;

            for line in session? {
                println!("{line}");
            }
            shutdown?;
        }
    }

    Ok(())
}
