use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facelearn::config::{self, Config};
use facelearn::notify::CommandNotifier;
use facelearn::protocol::{Request, Response};
use facelearn::storage::{FileStorage, ModelStorage};
use facelearn::{
    Embedding, FaceLearner, IdentityStore, LabelOutcome, Matcher, Palette, TrainingOutcome,
};
use log::{debug, info, warn};

#[derive(Parser)]
#[command(name = "facelearn")]
#[command(
    version,
    about = "Live face identity resolution with incremental learning"
)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Learned model file, overrides the config
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process front-end events as JSON lines on stdin, answering on stdout
    Serve,
    /// List learned faces
    List,
    /// Remove the learned model
    Purge,
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        cfg.model_path = model;
    }

    match cli.command {
        Commands::Serve => serve(&cfg),
        Commands::List => list(&cfg),
        Commands::Purge => purge(&cfg),
        Commands::Config => open_config(cli.config),
    }
}

fn open_learner(cfg: &Config) -> Result<FaceLearner> {
    let mut store = IdentityStore::new(
        Box::new(FileStorage::new(&cfg.model_path)),
        cfg.dimension,
    );
    let count = store.load_or_empty();
    info!("Loaded {} learned face(s) from {}", count, cfg.model_path.display());

    let palette = Palette::from_hex(&cfg.palette).context("Invalid palette in config")?;
    let notifier = CommandNotifier::spawn(
        cfg.speech_command.clone(),
        cfg.model_updated_command.clone(),
    )
    .context("Failed to start notification worker")?;

    Ok(FaceLearner::new(
        store,
        Matcher::new(cfg.tolerance),
        palette,
        Box::new(notifier),
    ))
}

fn serve(cfg: &Config) -> Result<()> {
    let mut learner = open_learner(cfg)?;
    info!("Ready, tolerance {:.2}", cfg.tolerance);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Unknown message: {}", e);
                continue;
            }
        };

        for response in handle(&mut learner, request) {
            serde_json::to_writer(&mut out, &response)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn handle(learner: &mut FaceLearner, request: Request) -> Vec<Response> {
    match request {
        Request::Frame { faces } => {
            let start = Instant::now();
            let embeddings: Vec<Embedding> = faces.into_iter().map(Embedding::from).collect();
            debug!("[NEW FRAME] Detected faces: {}", embeddings.len());
            match learner.process_frame(&embeddings) {
                Ok(frame_faces) => vec![
                    Response::Annotated {
                        frame_faces,
                        processing_time: format!("{:.2}", elapsed_ms(start)),
                    },
                    Response::Processed,
                ],
                Err(e) => vec![error(e), Response::Processed],
            }
        }
        Request::Labeled { uuid, name } => match learner.label(uuid, &name) {
            Ok(LabelOutcome::Ignored) => vec![],
            Ok(LabelOutcome::Renamed { uuid, name }) => {
                info!("Labeled {} as {}", uuid, name);
                vec![]
            }
            Ok(LabelOutcome::Merged {
                absorbed,
                into,
                samples,
            }) => {
                info!("Merged {} into {} ({} samples)", absorbed, into, samples);
                vec![]
            }
            Err(e) => vec![error(e)],
        },
        Request::Palette { colors, colors_hex } => {
            let colors = colors.into_iter().map(Into::into).collect();
            match learner.set_palette(colors, colors_hex) {
                Ok(()) => vec![],
                Err(e) => vec![error(e)],
            }
        }
        Request::Training { uuid, mode } => match learner.train(uuid, mode.into()) {
            Ok(TrainingOutcome::Updated { samples, drift, .. }) => {
                info!(
                    "[FACE MODELED] {} samples, distance to previous embedding {:.3}",
                    samples, drift
                );
                vec![]
            }
            Ok(_) => vec![],
            Err(e) => vec![error(e)],
        },
    }
}

fn error(e: impl std::fmt::Display) -> Response {
    warn!("{}", e);
    Response::Error {
        message: e.to_string(),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn list(cfg: &Config) -> Result<()> {
    let mut store = IdentityStore::new(
        Box::new(FileStorage::new(&cfg.model_path)),
        cfg.dimension,
    );
    store.load().context("Failed to load learned model")?;

    for identity in store.learned() {
        println!(
            "{}\t{}\t{} sample(s)",
            identity.uuid, identity.name, identity.sample_count
        );
    }
    Ok(())
}

fn purge(cfg: &Config) -> Result<()> {
    info!("Purging learned model at {}", cfg.model_path.display());

    FileStorage::new(&cfg.model_path)
        .purge()
        .context("Failed to purge learned model")?;

    info!("✓ Learned model purged");
    Ok(())
}

fn open_config(path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(|| config::CONFIG_PATH.clone());
    if !config_path.exists() {
        config::save_config(&Config::default(), Some(&config_path))
            .context("Failed to write default config")?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
