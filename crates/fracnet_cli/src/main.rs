//! fracnet CLI: score X-ray images for fractures and render Grad-CAM overlays.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fracnet::core::backend::{DefaultBackend, NdArray};
use fracnet::models::checkpoint::{checkpoint_file, metadata_path};
use fracnet::models::{save_model, CheckpointMetadata, ARCH_NAME};
use fracnet::vision::save_png;
use fracnet::{FracnetConfig, FracturePipeline, PredictionReport};

#[derive(Parser)]
#[command(name = "fracnet")]
#[command(author, version)]
#[command(about = "Score X-ray images for fractures and show where the model looked")]
#[command(long_about = "fracnet: X-ray fracture scoring with Grad-CAM explanations.

EXAMPLES:
  # Score an image
  fracnet predict wrist.png

  # Score several images and write heatmap overlays
  fracnet predict scans/*.jpg --overlay-dir overlays

  # Explain an earlier layer, print JSON
  fracnet predict wrist.png --layer stage3 --json

  # Write a compatible (untrained) weights file
  fracnet init-weights --output weights/fracnet.mpk

WEIGHTS:
  Fine-tuned weights are read from weights/fracnet.mpk unless the config
  file says otherwise. Without them the classifier head is untrained and
  predictions are not meaningful.")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score images and explain each score
    Predict {
        /// X-ray images (JPEG or PNG)
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,

        /// Write a heatmap overlay PNG per image into this directory
        #[arg(long, value_name = "DIR")]
        overlay_dir: Option<PathBuf>,

        /// Backbone layer to explain (see `fracnet layers`)
        #[arg(long, value_name = "NAME")]
        layer: Option<String>,

        /// Print a JSON report instead of one line per image
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// List the backbone layers that can be explained
    Layers,
    /// Write the configured topology with fresh weights
    InitWeights {
        /// Output checkpoint path
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Predict {
            images,
            overlay_dir,
            layer,
            json,
        } => handle_predict(config, images, overlay_dir, layer, json),
        Commands::Layers => handle_layers(&config),
        Commands::InitWeights { output } => handle_init_weights(&config, &output),
        Commands::Config => handle_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<FracnetConfig> {
    match path {
        Some(path) => FracnetConfig::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display())),
        None => Ok(FracnetConfig::default()),
    }
}

fn handle_predict(
    mut config: FracnetConfig,
    images: Vec<PathBuf>,
    overlay_dir: Option<PathBuf>,
    layer: Option<String>,
    json: bool,
) -> Result<()> {
    if let Some(layer) = layer {
        config.explain.layer = Some(layer);
    }

    let pipeline = FracturePipeline::<DefaultBackend>::new(config, Default::default())
        .context("Invalid configuration")?;
    let classifier = pipeline
        .classifier()
        .context("Failed to build the classifier")?;
    if !classifier.weight_source().is_fine_tuned() && !json {
        eprintln!("Note: no fine-tuned weights loaded, predictions are not meaningful.\n");
    }

    let mut reports: Vec<PredictionReport> = Vec::with_capacity(images.len());
    let mut failures = 0usize;
    let mut overlay_names = overlay_dir.as_deref().map(OverlayNames::new);

    for path in &images {
        let prediction = match pipeline.predict_file(path) {
            Ok(prediction) => prediction,
            Err(e) => {
                // A bad image fails only its own request
                failures += 1;
                eprintln!("{}: error: {e}", path.display());
                continue;
            }
        };

        let overlay = match overlay_names.as_mut() {
            Some(names) => {
                let out = names.claim(path);
                let written = pipeline
                    .render(&prediction)
                    .map_err(anyhow::Error::from)
                    .and_then(|rendered| {
                        save_png(&rendered, &out).with_context(|| {
                            format!("Failed to write overlay '{}'", out.display())
                        })
                    });
                if let Err(e) = written {
                    failures += 1;
                    eprintln!("{}: error: {e:#}", path.display());
                    continue;
                }
                Some(out)
            }
            None => None,
        };

        if !json {
            match &overlay {
                Some(out) => println!(
                    "{}: {}  [overlay: {}]",
                    path.display(),
                    prediction.summary(),
                    out.display()
                ),
                None => println!("{}: {}", path.display(), prediction.summary()),
            }
            if prediction.heatmap.is_degenerate() {
                println!("  (heatmap is blank: no region increased the score)");
            }
        }
        reports.push(prediction.report(path, overlay.as_deref()));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if failures > 0 {
        bail!("{} of {} images could not be scored", failures, images.len());
    }
    Ok(())
}

/// Hands out overlay file names within one batch.
///
/// `<dir>/<stem>_overlay.png`, or `<dir>/<stem>_overlay_<n>.png` when an
/// earlier image in the batch already took that name.
struct OverlayNames {
    dir: PathBuf,
    taken: HashSet<PathBuf>,
}

impl OverlayNames {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            taken: HashSet::new(),
        }
    }

    fn claim(&mut self, image: &Path) -> PathBuf {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let mut out = self.dir.join(format!("{stem}_overlay.png"));
        let mut n = 2usize;
        while self.taken.contains(&out) {
            out = self.dir.join(format!("{stem}_overlay_{n}.png"));
            n += 1;
        }
        self.taken.insert(out.clone());
        out
    }
}

fn handle_layers(config: &FracnetConfig) -> Result<()> {
    config.model.validate().context("Invalid model configuration")?;
    let names = config.model.backbone.layer_names();
    let default = config
        .explain
        .layer
        .clone()
        .or_else(|| names.last().cloned())
        .unwrap_or_default();

    println!("Layers (feature-map shape for a 224x224 input):");
    println!("─────────────────────────────────────────");
    for (name, shape) in config.model.backbone.feature_shapes() {
        let marker = if name == default { "  [default]" } else { "" };
        println!(
            "  {:<8} {:>4} x {:>3} x {:>3}{}",
            name,
            shape.channels(),
            shape.height(),
            shape.width(),
            marker
        );
    }
    Ok(())
}

fn handle_init_weights(config: &FracnetConfig, output: &Path) -> Result<()> {
    config.model.validate().context("Invalid model configuration")?;

    let device = Default::default();
    let model = config.model.init::<NdArray>(&device);
    save_model(&model, output)
        .with_context(|| format!("Failed to write weights to '{}'", output.display()))?;

    let metadata = metadata_path(output);
    CheckpointMetadata::new(ARCH_NAME)
        .with_config(&config.model)
        .context("Failed to record the model configuration")?
        .with_extra("source", "init-weights")
        .with_extra("version", env!("CARGO_PKG_VERSION"))
        .save(&metadata)
        .with_context(|| format!("Failed to write metadata to '{}'", metadata.display()))?;

    println!("Wrote {}", checkpoint_file(output).display());
    println!("Wrote {}", metadata.display());
    println!("\nThese weights are untrained; fine-tune them before relying on predictions.");
    Ok(())
}

fn handle_config(config: &FracnetConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predict() {
        let cli = Cli::try_parse_from([
            "fracnet", "-vv", "predict", "a.png", "b.jpg", "--overlay-dir", "out", "--layer",
            "stage3", "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Predict {
                images,
                overlay_dir,
                layer,
                json,
            } => {
                assert_eq!(images, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
                assert_eq!(overlay_dir, Some(PathBuf::from("out")));
                assert_eq!(layer.as_deref(), Some("stage3"));
                assert!(json);
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_predict_requires_an_image() {
        assert!(Cli::try_parse_from(["fracnet", "predict"]).is_err());
    }

    #[test]
    fn test_overlay_path() {
        let mut names = OverlayNames::new(Path::new("out"));
        assert_eq!(
            names.claim(Path::new("scans/left wrist.jpeg")),
            PathBuf::from("out/left wrist_overlay.png")
        );
    }

    #[test]
    fn test_same_stem_overlays_get_distinct_names() {
        let mut names = OverlayNames::new(Path::new("out"));
        let claimed: Vec<PathBuf> = ["left/wrist.png", "right/wrist.png", "wrist.jpg", "ankle.png"]
            .iter()
            .map(|image| names.claim(Path::new(image)))
            .collect();

        assert_eq!(
            claimed,
            vec![
                PathBuf::from("out/wrist_overlay.png"),
                PathBuf::from("out/wrist_overlay_2.png"),
                PathBuf::from("out/wrist_overlay_3.png"),
                PathBuf::from("out/ankle_overlay.png"),
            ]
        );
    }
}
