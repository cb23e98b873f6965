use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crew_stream::api::{self, AppState};
use crew_stream::channel::BoundedUpdateChannel;
use crew_stream::crew::{development_crew, CrewRunner, LlmCrewRunner, ScriptedCrewRunner};
use crew_stream::lifecycle::worker::STARTED_MESSAGE;
use crew_stream::lifecycle::{ControllerConfig, CrewLifecycleController};
use crew_stream::providers::OpenAIProvider;
use crew_stream::types::update::describe_output;
use crew_stream::types::UpdateMessage;
use crew_stream::Config;

#[derive(Parser)]
#[command(name = "crew-stream")]
#[command(about = "Stream LLM crew progress to a browser", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Path to a TOML config file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard server and the crew worker
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, help = "Use the scripted crew instead of the model")]
        offline: bool,
    },
    /// Run the development crew once and print its output
    Run {
        #[arg(long, help = "Use the scripted crew instead of the model")]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            offline,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.offline |= offline;
            config.validate()?;
            let _guard = init_logging(config.log_file.as_deref());
            serve(config).await?
        }
        Commands::Run { offline } => {
            config.offline |= offline;
            config.validate()?;
            let _guard = init_logging(None);
            run_once(&config).await?
        }
    }

    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crew_stream=info,tower_http=info".into());
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    let Some(path) = log_file else {
        registry.init();
        return None;
    };

    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "crew_server.log".into());
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

fn build_runner(config: &Config) -> Arc<dyn CrewRunner> {
    match (&config.openai_api_key, config.offline) {
        (Some(api_key), false) => {
            let mut provider = OpenAIProvider::new(api_key.clone())
                .with_model(config.model.clone())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.openai_base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Arc::new(LlmCrewRunner::new(Arc::new(provider)))
        }
        _ => {
            tracing::info!("Offline mode: using the scripted crew");
            Arc::new(ScriptedCrewRunner::new().with_task_delay(Duration::from_secs(1)))
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting crew-stream v{}", env!("CARGO_PKG_VERSION"));

    let channel = Arc::new(BoundedUpdateChannel::new(config.queue_capacity));
    let controller = Arc::new(CrewLifecycleController::new(
        channel,
        build_runner(&config),
        config.factory_config()?,
        ControllerConfig {
            stop_timeout: config.stop_timeout()?,
        },
    ));
    controller.start().await?;

    let state = AppState { controller };
    api::serve(state, &config.host, config.port).await
}

async fn run_once(config: &Config) -> Result<()> {
    let crew = development_crew()?;
    let runner = build_runner(config);

    println!("{}", UpdateMessage::status(STARTED_MESSAGE).to_json_line());
    let observer = |role: &str, output: &str| {
        let update = UpdateMessage::task_update(role, output);
        println!("{}", update.to_json_line());
    };

    let result = runner.kickoff(&crew, &observer).await?;
    println!("\nFinal result:\n{}", describe_output(&result));
    Ok(())
}
