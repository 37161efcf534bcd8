//! isoray CLI - ray casting accuracy experiment
//!
//! Renders the reference scene with direct and voxelized sampling and
//! reports how far each is from a supersampled reference.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use isoray_raycast::plot::emit_run;
use isoray_raycast::{LookupTable, RecordingSink, RenderSettings, Renderer};
use isoray_spline::scene;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

mod strip;

#[derive(Parser)]
#[command(name = "isoray")]
#[command(about = "Direct vs. voxelized ray casting of isogeometric scalar fields", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the experiment on the reference scene
    Render {
        /// TOML settings file (defaults are used for missing keys)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output resolution in pixels
        #[arg(short, long)]
        pixels: Option<usize>,
        /// Voxel texture size, e.g. 10x10
        #[arg(long, value_parser = parse_texture_size)]
        texture: Option<(usize, usize)>,
        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write a PNG strip of pixel colors and diffs
        #[arg(long)]
        image: Option<PathBuf>,
        /// Size of one pixel in the PNG strip
        #[arg(long, default_value_t = 16)]
        scale: u32,
    },
    /// Print the default settings as TOML
    Config,
    /// Run the experiment and write the draw commands as JSON
    Plot {
        /// TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            config,
            pixels,
            texture,
            output,
            image,
            scale,
        } => {
            let mut settings = load_settings(config.as_deref())?;
            if let Some(n) = pixels {
                settings.screen.num_pixels = n;
            }
            if let Some((w, h)) = texture {
                settings.texture.width = w;
                settings.texture.height = h;
            }
            render(settings, output.as_deref(), image.as_deref(), scale)?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&RenderSettings::default())?);
        }
        Commands::Plot { config, output } => {
            plot(load_settings(config.as_deref())?, &output)?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<RenderSettings> {
    let Some(path) = path else {
        return Ok(RenderSettings::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let settings: RenderSettings =
        toml::from_str(&text).with_context(|| format!("invalid settings in {}", path.display()))?;
    Ok(settings)
}

fn render(
    settings: RenderSettings,
    output: Option<&Path>,
    image: Option<&Path>,
    scale: u32,
) -> Result<()> {
    let phi = scene::reference_geometry()?;
    let rho = scene::reference_scalar_field()?;
    let lut = LookupTable::default_ramp(settings.transfer_resolution)?;
    let renderer = Renderer::new(&phi, &rho, &lut, settings)?;

    let report = renderer.run()?;

    println!(
        "{:>10} {:>12} {:>12}",
        "pass", "mean diff", "max diff"
    );
    for (name, summary) in [
        ("direct", report.direct_summary),
        ("voxelized", report.voxelized_summary),
    ] {
        println!("{:>10} {:>12.6} {:>12.6}", name, summary.mean, summary.max);
    }

    if let Some(path) = output {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("wrote report to {}", path.display());
    }
    if let Some(path) = image {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !ext.eq_ignore_ascii_case("png") {
            bail!("Unsupported image format: {} (expected .png)", ext);
        }
        strip::render_strip(&report, scale).save(path)?;
        info!("wrote strip to {}", path.display());
    }
    Ok(())
}

fn plot(settings: RenderSettings, output: &Path) -> Result<()> {
    let phi = scene::reference_geometry()?;
    let rho = scene::reference_scalar_field()?;
    let lut = LookupTable::default_ramp(settings.transfer_resolution)?;
    let renderer = Renderer::new(&phi, &rho, &lut, settings)?;

    let report = renderer.run()?;
    let mut sink = RecordingSink::default();
    emit_run(&renderer, &report, &mut sink);

    fs::write(output, serde_json::to_string(&sink)?)?;
    info!(
        "wrote {} draw commands to {}",
        sink.commands.len(),
        output.display()
    );
    Ok(())
}

fn parse_texture_size(s: &str) -> std::result::Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid texture size {s:?}: {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}
