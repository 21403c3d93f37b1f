//! layout-extract CLI
//!
//! Rectifies photographed documents, detects text regions and groups
//! segmentation masks by text region.
//!
//! # Usage
//!
//! ```bash
//! layout-extract rectify --input photo.jpg --output document.png
//! layout-extract detect-text --input banner.jpg --output boxes.json
//! layout-extract group --input banner.jpg --masks masks/ --output out/
//! layout-extract batch --input photos/ --output cropped/ --workers 4
//! ```

mod cli;

use clap::{Args, Parser, Subcommand};
use layout_extract::core::ConfigValidator;
use layout_extract::pipeline::PipelineConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "layout-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Document rectification, text detection and mask grouping", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON pipeline configuration
    #[arg(long, env = "LAYOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Write intermediate images into this directory
    #[arg(long = "debug-dir", env = "LAYOUT_DEBUG_DIR")]
    debug_dir: Option<PathBuf>,

    /// Path to the EAST ONNX model
    #[arg(long = "east-model", env = "LAYOUT_EAST_MODEL")]
    east_model: Option<PathBuf>,

    /// URL the EAST model is fetched from when missing
    #[arg(long = "east-url", env = "LAYOUT_EAST_URL")]
    east_url: Option<String>,

    /// Never download the EAST model
    #[arg(long = "no-download", env = "LAYOUT_NO_DOWNLOAD")]
    no_download: bool,
}

impl CommonArgs {
    /// Loads the configuration file, if any, and applies command line overrides.
    fn pipeline_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error + Send + Sync>> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                PipelineConfig::from_json_file(path)?
            }
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.debug_dir {
            config.debug.enabled = true;
            config.debug.dir = dir.clone();
        }
        let east = &mut config.text_detection.east;
        if let Some(model) = &self.east_model {
            east.model_path = model.clone();
        }
        if let Some(url) = &self.east_url {
            east.model_url = Some(url.clone());
        }
        if self.no_download {
            east.allow_download = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Find the document in a photo and warp it upright
    Rectify {
        /// Input image
        #[arg(long)]
        input: PathBuf,

        /// Where to write the rectified document
        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Detect text regions and print them as JSON
    DetectText {
        /// Input image
        #[arg(long)]
        input: PathBuf,

        /// Write the JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Group precomputed segmentation masks by text region
    Group {
        /// Input image
        #[arg(long)]
        input: PathBuf,

        /// Directory of mask_NNN.png files
        #[arg(long)]
        masks: PathBuf,

        /// Directory receiving groups.json, cutouts and the overlay
        #[arg(long, default_value = ".")]
        output: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Rectify every image in a directory
    Batch {
        /// Directory of input images
        #[arg(long)]
        input: PathBuf,

        /// Directory receiving cropped_<name>.png files
        #[arg(long)]
        output: PathBuf,

        /// Number of worker threads (defaults to number of CPUs)
        #[arg(long, env = "LAYOUT_WORKERS")]
        workers: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    layout_extract::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rectify {
            input,
            output,
            common,
        } => cli::rectify(&input, &output, common.pipeline_config()?),
        Commands::DetectText {
            input,
            output,
            common,
        } => cli::detect_text(&input, output.as_deref(), common.pipeline_config()?),
        Commands::Group {
            input,
            masks,
            output,
            common,
        } => cli::group(&input, &masks, &output, common.pipeline_config()?),
        Commands::Batch {
            input,
            output,
            workers,
            common,
        } => {
            let mut config = common.pipeline_config()?;
            if workers.is_some() {
                config.parallel = config.parallel.with_max_threads(workers);
            }
            cli::batch(&input, &output, config)
        }
    }
}
