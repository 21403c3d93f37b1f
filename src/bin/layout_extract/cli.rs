//! Subcommand handlers.

use layout_extract::domain::MaskDirectory;
use layout_extract::pipeline::{LayoutPipeline, PipelineConfig};
use layout_extract::utils::{load_image, write_groups_json, write_mask_outputs};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

fn stem_of(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
}

/// Rectify one image.
pub fn rectify(input: &Path, output: &Path, config: PipelineConfig) -> CliResult {
    let start = Instant::now();
    let pipeline = LayoutPipeline::new(config)?;
    let image = load_image(input)?;
    info!("Loaded {} ({}x{})", input.display(), image.width(), image.height());

    let document = pipeline.normalize_document(&pipeline.prepare(&image), stem_of(input));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    document.save(output)?;
    info!(
        "Wrote {} ({}x{}) in {:.2}ms",
        output.display(),
        document.width(),
        document.height(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

/// Detect text regions and emit them as JSON.
pub fn detect_text(input: &Path, output: Option<&Path>, config: PipelineConfig) -> CliResult {
    let pipeline = LayoutPipeline::new(config)?;
    let image = pipeline.prepare(&load_image(input)?);
    let boxes = pipeline.detect_text(&image, stem_of(input));
    info!("Found {} text regions", boxes.len());

    let json = serde_json::to_string_pretty(&boxes)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Group masks from a directory by the text regions of an image.
pub fn group(input: &Path, masks: &Path, output: &Path, config: PipelineConfig) -> CliResult {
    let start = Instant::now();
    let pipeline = LayoutPipeline::new(config)?;
    let image = load_image(input)?;
    let source = MaskDirectory::new(masks);

    let name = input.to_string_lossy();
    let result = pipeline.run(&image, &name, &source)?;
    let written = write_mask_outputs(output, &result.analysis, &result.masks)?;
    info!("Wrote {} mask files to {}", written.len(), output.display());

    let document_path = output.join(format!("cropped_{}.png", stem_of(input)));
    result.document.save(&document_path)?;

    match write_groups_json(output, &result.groups)? {
        Some(path) => info!("Wrote {} groups to {}", result.groups.len(), path.display()),
        None => info!("No mask overlaps a text region; groups.json not written"),
    }
    info!(
        "Grouping completed in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

/// Rectify every image of a directory in parallel.
pub fn batch(input: &Path, output: &Path, config: PipelineConfig) -> CliResult {
    let start = Instant::now();
    if config.parallel.install_global_thread_pool()? {
        info!("Using {:?} worker threads", config.parallel.max_threads);
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    info!("Processing {} images from {}", paths.len(), input.display());

    let pipeline = LayoutPipeline::new(config)?;
    fs::create_dir_all(output)?;
    let mut failed = 0;
    for (path, result) in paths.iter().zip(pipeline.process_batch(&paths)) {
        let saved = result.and_then(|document| {
            let target = output.join(format!("cropped_{}.png", stem_of(path)));
            document.save(&target)?;
            Ok(target)
        });
        match saved {
            Ok(target) => info!("{} -> {}", path.display(), target.display()),
            Err(e) => {
                failed += 1;
                warn!("{}: {}", path.display(), e);
            }
        }
    }

    info!(
        "Batch finished: {} ok, {} failed in {:.2}ms",
        paths.len() - failed,
        failed,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
