use burn::{
    config::Config,
    tensor::{backend::Backend, Device, Tensor},
};
use clap::{Parser, Subcommand};
use firegan::{
    utils::{image_to_tensor, load_image, mosaic, tensor_to_image},
    FireGan, FireGanConfig, MyBackend,
};
use std::{
    collections::HashMap,
    error::Error,
    ffi::OsString,
    path::{Path, PathBuf},
};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "firegan", about = "Visible/infrared image fusion with FIRe-GAN")]
struct Cli {
    /// JSON model config, defaults to the published architecture
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding g1.mpk and g2.mpk
    #[arg(long, global = true)]
    weights: Option<PathBuf>,

    /// Build generator 2 with spectral normalization
    #[arg(long, global = true)]
    spectral_norm: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print both generators' layers and parameter counts
    Summary,
    /// Write the default config as JSON
    InitConfig {
        #[arg(long)]
        output: PathBuf,
    },
    /// Fuse one visible/infrared pair
    Fuse {
        #[arg(long)]
        visible: PathBuf,
        #[arg(long)]
        infrared: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Also write visible | infrared | fused side by side
        #[arg(long)]
        comparison: Option<PathBuf>,
    },
    /// Synthesize an infrared image from a visible one (generator 1 only)
    Infrared {
        #[arg(long)]
        visible: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Fuse every pair of equally named images in two directories
    FuseDir {
        #[arg(long)]
        visible_dir: PathBuf,
        #[arg(long)]
        infrared_dir: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FireGanConfig::load(path)?,
        None => FireGanConfig::new(),
    };
    if cli.spectral_norm {
        config.g2.spectral_norm = true;
    }

    if let Command::InitConfig { output } = &cli.command {
        config.save(output)?;
        tracing::info!(path = %output.display(), "wrote config");
        return Ok(());
    }

    let device = Default::default();
    let model = build_model::<MyBackend>(&config, cli.weights.as_deref(), &device)?;

    match cli.command {
        Command::Summary => model.summary(),
        Command::InitConfig { .. } => {}
        Command::Fuse {
            visible,
            infrared,
            output,
            comparison,
        } => {
            fuse_pair(
                &model,
                &config,
                &device,
                &visible,
                &infrared,
                &output,
                comparison.as_deref(),
            )?;
        }
        Command::Infrared { visible, output } => {
            let visible = load_image(&visible, config.width as u32, config.height as u32)?;
            let visible: Tensor<MyBackend, 4> = image_to_tensor(&visible, &device).unsqueeze();
            let infrared = model.synthesize_infrared(visible)?;

            tensor_to_image(infrared.squeeze(0))?.save(&output)?;
            tracing::info!(path = %output.display(), "wrote infrared image");
        }
        Command::FuseDir {
            visible_dir,
            infrared_dir,
            output_dir,
        } => {
            std::fs::create_dir_all(&output_dir)?;

            let infrared = images_by_name(&infrared_dir);
            let mut fused = 0;
            for (name, visible) in images_by_name(&visible_dir) {
                let Some(infrared) = infrared.get(&name) else {
                    tracing::warn!(image = ?name, "no infrared counterpart, skipping");
                    continue;
                };
                let output = output_dir.join(&name).with_extension("png");
                fuse_pair(&model, &config, &device, &visible, infrared, &output, None)?;
                fused += 1;
            }
            tracing::info!(fused, dir = %output_dir.display(), "done");
        }
    }

    Ok(())
}

fn build_model<B: Backend>(
    config: &FireGanConfig,
    weights: Option<&Path>,
    device: &B::Device,
) -> Result<FireGan<B>, Box<dyn Error>> {
    let model = config.init::<B>(device)?;

    match weights {
        Some(dir) => Ok(model.load(dir, device)?),
        None => {
            tracing::warn!("no --weights given, generators are randomly initialized");
            Ok(model)
        }
    }
}

fn fuse_pair<B: Backend>(
    model: &FireGan<B>,
    config: &FireGanConfig,
    device: &Device<B>,
    visible: &Path,
    infrared: &Path,
    output: &Path,
    comparison: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let (width, height) = (config.width as u32, config.height as u32);
    let visible_image = load_image(visible, width, height)?;
    let infrared_image = load_image(infrared, width, height)?;

    let visible: Tensor<B, 4> = image_to_tensor(&visible_image, device).unsqueeze();
    let infrared: Tensor<B, 4> = image_to_tensor(&infrared_image, device).unsqueeze();
    let fused = tensor_to_image(model.fuse(visible, infrared)?.squeeze(0))?;

    fused.save(output)?;
    tracing::info!(path = %output.display(), "wrote fused image");

    if let Some(path) = comparison {
        mosaic(&[visible_image, infrared_image, fused]).save(path)?;
        tracing::info!(path = %path.display(), "wrote comparison");
    }

    Ok(())
}

fn images_by_name(root: &Path) -> HashMap<OsString, PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            let ext = entry.path().extension().and_then(|ext| ext.to_str());
            matches!(ext, Some("jpg") | Some("jpeg") | Some("png"))
        })
        .filter_map(|entry| {
            let name = entry.path().file_stem()?.to_os_string();
            Some((name, entry.into_path()))
        })
        .collect()
}
