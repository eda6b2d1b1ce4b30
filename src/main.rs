use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use friday_gateway::daemon::{build_assistant, build_capabilities};
use friday_gateway::voice::Microphone;
use friday_gateway::{Config, Daemon};

/// Friday - voice and text assistant grounded in your documents
#[derive(Parser)]
#[command(name = "friday", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (for headless servers without audio hardware)
    #[arg(long, env = "FRIDAY_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "4")]
        seconds: u64,
    },
    /// Ask one question against the persisted document index
    Ask {
        /// The question
        question: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,friday_gateway=info",
        1 => "info,friday_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_with_options(cli.disable_voice)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { seconds } => test_mic(&config, seconds).await,
            Command::Ask { question } => ask(&config, &question).await,
        };
    }

    tracing::info!(
        port = config.server.port,
        data_dir = %config.server.data_dir.display(),
        voice = config.voice.enabled,
        "starting friday gateway"
    );
    tracing::debug!(?config, "loaded configuration");

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

/// Record one frame and report its levels
async fn test_mic(config: &Config, seconds: u64) -> anyhow::Result<()> {
    let microphone = Microphone::new(config.wake_word.fallback_device_index);
    let sample_rate = config.wake_word.sample_rate;
    let duration = Duration::from_secs(seconds.max(1));

    println!("Recording for {} seconds...", duration.as_secs());
    let frame =
        tokio::task::spawn_blocking(move || microphone.record_blocking(duration, sample_rate))
            .await??;

    println!("Captured {:.1}s at {} Hz", frame.seconds(), frame.sample_rate);
    println!("Peak: {:.4}", frame.peak());
    println!("RMS:  {:.4}", frame.rms());
    if frame.is_silent() {
        println!("No signal detected - check the input device");
    }

    Ok(())
}

/// Answer one question from the command line
async fn ask(config: &Config, question: &str) -> anyhow::Result<()> {
    let assistant = build_assistant(config, build_capabilities(config))?;

    match assistant.restore().await {
        Some(name) => tracing::info!(document = %name, "using indexed document"),
        None => tracing::info!("no document indexed, answering without context"),
    }

    let answer = assistant.answer(question).await?;
    println!("{}", answer.response_text);

    Ok(())
}
