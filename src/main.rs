use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use avatar_gateway::avatar::{HeyGenClient, HttpTokenIssuer, TokenIssuer};
use avatar_gateway::gate::{self, MATCH_THRESHOLD};
use avatar_gateway::llm::{self, GenerationRequest};
use avatar_gateway::{Config, Daemon};

/// Avatar - camera-gated talking avatar gateway
#[derive(Parser)]
#[command(name = "avatar", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Start the avatar session without waiting for a gate match
    #[arg(long, env = "AVATAR_NO_GATE")]
    no_gate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Score a frame against the reference images
    CheckFrame {
        /// Frame image to check
        frame: PathBuf,
        /// Reference images (defaults to the configured set)
        #[arg(short, long = "reference")]
        references: Vec<PathBuf>,
    },
    /// One text generation round-trip with the configured transport
    Chat {
        /// Message to send
        text: String,
    },
    /// Fetch and print an avatar access token
    Token,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,avatar_gateway=info",
        1 => "info,avatar_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
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
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_gate {
        config.gate.enabled = false;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::CheckFrame { frame, references } => check_frame(&config, &frame, references),
            Command::Chat { text } => chat(&config, text).await,
            Command::Token => token(config).await,
        };
    }

    tracing::info!(
        port = config.server.port,
        gate = config.gate.enabled,
        "starting avatar gateway"
    );

    Daemon::new(config).run().await?;

    Ok(())
}

/// Score a frame against references and print the decision
fn check_frame(config: &Config, frame: &Path, references: Vec<PathBuf>) -> anyhow::Result<()> {
    let paths = if references.is_empty() {
        config.gate.reference_images.clone()
    } else {
        references
    };

    let frame_image = image::open(frame)?.to_rgba8();
    let loaded = gate::load_references(&paths)?;

    println!(
        "Frame: {} ({}x{})",
        frame.display(),
        frame_image.width(),
        frame_image.height()
    );
    println!("---");

    let decision = gate::decide(&frame_image, loaded.iter().map(|r| &r.image));
    for (reference, score) in loaded.iter().zip(&decision.scores) {
        let mark = if *score > MATCH_THRESHOLD { "match" } else { "-" };
        println!("{score:.4}  {mark:5}  {}", reference.path.display());
    }
    for reference in loaded.iter().skip(decision.scores.len()) {
        println!("  skip         {}", reference.path.display());
    }

    println!("---");
    match decision.matched {
        Some(index) => println!("Gate: OPEN (reference {})", index + 1),
        None => println!("Gate: closed (threshold {MATCH_THRESHOLD})"),
    }

    Ok(())
}

/// Send one message through the configured text generator
async fn chat(config: &Config, text: String) -> anyhow::Result<()> {
    let generator = llm::build_generator(&config.llm)?;
    println!("Sending to {}...\n", generator.name());

    let reply = generator.generate(&GenerationRequest::new(text)).await?;
    if reply.trim().is_empty() {
        println!("(empty reply)");
    } else {
        println!("{reply}");
    }

    Ok(())
}

/// Fetch an avatar access token
async fn token(config: Config) -> anyhow::Result<()> {
    let issuer: Arc<dyn TokenIssuer> = match config.service.token_url {
        Some(url) => Arc::new(HttpTokenIssuer::new(url)),
        None => Arc::new(HeyGenClient::new(
            config.service.base_url,
            config.service.api_key,
        )),
    };

    let token = issuer.issue().await?;
    println!("{}", token.expose_secret());

    Ok(())
}
