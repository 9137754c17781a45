use clap::{Parser, Subcommand};
use contourtrack_cv::PipelineKind;
use std::path::PathBuf;

mod runner;

#[derive(Parser)]
#[command(name = "contourtrack")]
#[command(about = "Adaptive contour detection and BIG/SMALL temporal tracking")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detector on a single image.
    Detect {
        #[arg(long)]
        image: PathBuf,

        /// Processing profile (JSON). Defaults to the built-in BIG profile.
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Write the detection as JSON here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Save the annotated frame here.
        #[arg(long)]
        overlay: Option<PathBuf>,
    },

    /// Track over an ordered image sequence, one JSON line per frame.
    Track {
        #[arg(long, num_args = 1.., required = true)]
        images: Vec<PathBuf>,

        #[arg(long, default_value = "object")]
        kind: PipelineKind,

        /// Profile for the BIG slot, overriding the pipeline's preset.
        #[arg(long)]
        big: Option<PathBuf>,

        /// Profile for the SMALL slot, overriding the pipeline's preset.
        #[arg(long)]
        small: Option<PathBuf>,

        /// Tracker config (JSON).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Save annotated frames into this directory.
        #[arg(long)]
        overlay_dir: Option<PathBuf>,
    },

    /// Inspect processing profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print a built-in preset as JSON (big, small, face-big, face-small).
    Show { preset: String },

    /// Validate a profile file.
    Check { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            image,
            profile,
            out,
            overlay,
        } => runner::detect(&image, profile.as_deref(), out.as_deref(), overlay.as_deref()),
        Commands::Track {
            images,
            kind,
            big,
            small,
            config,
            overlay_dir,
        } => runner::track(&runner::TrackArgs {
            images,
            kind,
            big,
            small,
            config,
            overlay_dir,
        }),
        Commands::Profile { action } => match action {
            ProfileAction::Show { preset } => runner::show_profile(&preset),
            ProfileAction::Check { path } => runner::check_profile(&path),
        },
    }
}
