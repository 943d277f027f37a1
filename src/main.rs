use clap::Parser;
use livesense::app;
use livesense::config::Config;

#[derive(Parser, Debug)]
#[command(name = "livesense", version, about = "Live microphone transcription")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run live transcription (default)
    Transcribe,
    /// Run the pipeline against synthetic audio with a mock encoder
    Selftest,
    /// Download the model artifact set
    DownloadModels,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("livesense: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.to_lowercase()),
    )
    .init();

    let result = match cli.command {
        Some(Commands::Selftest) => app::run_selftest().await,
        Some(Commands::DownloadModels) => app::run_download_models().await,
        Some(Commands::Transcribe) | None => app::run_transcribe(config).await,
    };

    if let Err(e) = result {
        eprintln!("livesense: {}", e);
        std::process::exit(e.exit_code());
    }
}
