use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rasheed_ai::{
    agent::{Agent, ToolRegistry},
    chat::ChatSession,
    config::{self, Config, LogFormat},
    critique::{self, CritiqueRequest, UploadedDocument},
    llm, server, vision,
};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "rasheed", version, about = "Rasheed AI demos")]
struct Cli {
    /// YAML configuration file (defaults to $CONFIG_PATH, then ./config.yaml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal chat with the tool-using agent
    Chat,
    /// HTTP server with the critique and classification demos
    Serve,
    /// Critique a PDF or TXT resume and print the feedback
    Critique {
        file: PathBuf,
        /// Job role to tailor the feedback to
        #[arg(long)]
        role: Option<String>,
    },
    /// Print the top predictions for a JPG or PNG image
    Classify { image: PathBuf },
}

/// Validates that a log level string is valid
fn validate_log_level(level: &str) -> Result<()> {
    level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
                level
            )
        })?;
    Ok(())
}

/// Logs go to stderr so stdout only carries the conversation or results.
fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration first (before logging setup)
    let config = match config::load(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Determine log level: environment variable overrides config
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.server.logs.level.clone());

    if let Err(e) = validate_log_level(&log_level) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // Interactive runs stay quiet unless RUST_LOG asks otherwise.
    let (log_level, log_format) = match cli.command {
        Command::Serve => (log_level, config.server.logs.format),
        _ if std::env::var("RUST_LOG").is_err() => ("warn".to_string(), LogFormat::Pretty),
        _ => (log_level, LogFormat::Pretty),
    };
    init_tracing(&log_level, log_format);

    info!("Configuration loaded, log level: {}", log_level);

    match cli.command {
        Command::Chat => {
            let outcome = run_chat(&config).await;
            // Ctrl-C at the prompt leaves a blocking stdin read behind, which
            // would hold up runtime shutdown.
            if let Err(e) = outcome {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
            std::process::exit(0);
        }
        Command::Serve => {
            info!("Starting Rasheed AI server");
            server::run(config).await?;
            Ok(())
        }
        Command::Critique { file, role } => run_critique(&config, file, role).await,
        Command::Classify { image } => run_classify(&config, image).await,
    }
}

async fn run_chat(config: &Config) -> Result<()> {
    let agent = Agent::new(
        llm::connect(&config.llm),
        ToolRegistry::with_defaults(),
        &config.llm,
        &config.agent,
    );
    let session = ChatSession::new(agent);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    session.run(stdin, &mut stdout).await?;
    Ok(())
}

async fn run_critique(config: &Config, file: PathBuf, role: Option<String>) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("cannot read '{}'", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let request = CritiqueRequest {
        document: UploadedDocument::new(file_name, "", bytes),
        target_role: role,
    };
    let prompt = tokio::task::spawn_blocking(move || critique::prepare(&request)).await??;

    let llm = llm::connect(&config.llm);
    let response = critique::critique(prompt, llm.as_ref(), &config.critique).await?;

    println!("Analysis Results (target role: {})\n", response.target_role);
    println!("{}", response.feedback);
    Ok(())
}

async fn run_classify(config: &Config, image: PathBuf) -> Result<()> {
    let Some(classifier) = vision::load_classifier(&config.classifier).await? else {
        anyhow::bail!(
            "no classifier configured: set classifier.model_path and classifier.labels_path \
             (or CLASSIFIER_MODEL_PATH and CLASSIFIER_LABELS_PATH)"
        );
    };

    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("cannot read '{}'", image.display()))?;

    let top_k = config.classifier.top_k;
    let predictions = tokio::task::spawn_blocking(move || {
        vision::classify_image(classifier.model.as_ref(), &classifier.labels, &bytes, top_k)
    })
    .await??;

    println!("Predictions:");
    for (rank, prediction) in predictions.iter().enumerate() {
        println!("{}. {}", rank + 1, prediction);
    }
    Ok(())
}
