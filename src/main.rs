//! Command-line front end: manage a local workspace and replay recorded
//! gestures against it.

use cellmark::backend::{AnnotationBackend, LocalBackend};
use cellmark::config::{EditorConfig, LogLevel};
use cellmark::constants::DEFAULT_VIEWPORT;
use cellmark::model::ImageId;
use cellmark::render::pixmap_to_rgba;
use cellmark::script::{parse_script, run_script};
use cellmark::session::{EditorSession, Notice, NoticeLevel};
use cellmark::view::Viewport;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cellmark")]
#[command(about = "Cell annotation workspace and gesture replay")]
struct Cli {
    /// Workspace file holding images and annotations
    #[arg(long, default_value = "cellmark-workspace.json")]
    workspace: PathBuf,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register image files in the workspace
    Import {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Open an image, replay a gesture script and optionally render the result
    Replay {
        #[arg(long)]
        image: ImageId,
        #[arg(long)]
        script: PathBuf,
        #[arg(long, default_value_t = DEFAULT_VIEWPORT.0)]
        width: u32,
        #[arg(long, default_value_t = DEFAULT_VIEWPORT.1)]
        height: u32,
        /// PNG file to write the final frame to
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print label and shape counts for an image
    Stats {
        #[arg(long)]
        image: ImageId,
    },
    /// Write an image's annotations as JSON
    Export {
        #[arg(long)]
        image: ImageId,
        /// Output file; printed to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::load_from_default_path().unwrap_or_default(),
    };

    let level = cli.log_level.unwrap_or(config.preferences.log_level);
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .init();

    let backend = LocalBackend::open_or_create(&cli.workspace)?;

    match cli.command {
        Command::Import { images } => {
            for path in &images {
                let info = backend.import_image(path)?;
                println!(
                    "{}\t{}\t{}x{}",
                    info.id, info.original_name, info.width, info.height
                );
            }
            backend.save(&cli.workspace)?;
        }
        Command::Replay {
            image,
            script,
            width,
            height,
            out,
        } => {
            replay(&backend, config, image, &script, (width, height), out.as_deref())?;
            backend.save(&cli.workspace)?;
        }
        Command::Stats { image } => {
            let statistics = pollster::block_on(backend.statistics(image))?;
            println!("{}", serde_json::to_string_pretty(&statistics)?);
        }
        Command::Export { image, out } => {
            let json = serde_json::to_string_pretty(&backend.export(image)?)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    log::info!("Exported image {} to {:?}", image, path);
                }
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}

fn replay(
    backend: &LocalBackend,
    config: EditorConfig,
    image: ImageId,
    script: &Path,
    size: (u32, u32),
    out: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let steps = parse_script(&std::fs::read_to_string(script)?)?;
    let viewport = Viewport::new(f64::from(size.0), f64::from(size.1));

    let mut session = EditorSession::new(backend, config, viewport);
    pollster::block_on(session.open_image(image))?;
    print_notices(session.take_notices());

    let notices = pollster::block_on(run_script(&mut session, &steps));
    print_notices(notices);

    if let Some(statistics) = session.statistics() {
        println!(
            "{} annotations on image {} after {} steps",
            statistics.total,
            image,
            steps.len()
        );
    }

    if let Some(path) = out {
        let frame = session.render()?;
        pixmap_to_rgba(&frame).save(path)?;
        log::info!("Wrote frame to {:?}", path);
    }
    Ok(())
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let level = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        println!("[{}] {}", level, notice.message);
    }
}
