use brisk_cli::{draw_keypoints, grid_keypoints, load_keypoints, pattern_summary, BriskPipeline, Config, DescriptorFile, MatchMode};
use clap::{Parser, Subcommand};
use image::ImageReader;
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "brisk", version, about = "BRISK binary descriptors and Hamming matching")]
struct Cli {
    /// Worker threads (defaults to the config's `n_threads`)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute descriptors for keypoints of a grayscale image
    Describe {
        #[arg(long)]
        image: PathBuf,
        /// JSON array of keypoints; a grid is used when omitted
        #[arg(long, conflicts_with = "grid")]
        keypoints: Option<PathBuf>,
        /// Grid spacing in pixels
        #[arg(long, default_value_t = 16)]
        grid: usize,
        /// Keypoint size for grid keypoints
        #[arg(long, default_value_t = 12.0)]
        size: f32,
        /// Extractor config (.json or .toml)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Write the image with kept keypoints drawn on it
        #[arg(long)]
        draw: Option<PathBuf>,
    },
    /// Match two descriptor files
    Match {
        #[arg(long)]
        query: PathBuf,
        #[arg(long)]
        train: PathBuf,
        #[arg(long, default_value_t = 2)]
        k: usize,
        /// Radius search instead of k-NN
        #[arg(long)]
        radius: Option<f32>,
        /// Leave out queries without matches
        #[arg(long)]
        compact: bool,
        /// Write matches as JSON instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print statistics of the pattern a config produces
    Pattern {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn Error>> {
    match path {
        None => Ok(Config::default()),
        Some(p) if p.extension().is_some_and(|e| e == "toml") => Config::load_toml(p),
        Some(p) => Config::load_json(p),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Describe { image, keypoints, grid, size, config, output, draw } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(n) = cli.threads {
                cfg.n_threads = n;
            }
            let pipeline = BriskPipeline::with_thread_pool(cfg)?;
            info!("{}", pipeline.config().summary());

            let img = ImageReader::open(&image)?.decode()?;
            let (w, h) = (img.width(), img.height());
            let kps = match keypoints {
                Some(path) => load_keypoints(path)?,
                None => grid_keypoints(w as usize, h as usize, grid, size),
            };
            let requested = kps.len();

            let t0 = Instant::now();
            let file = pipeline.describe_to_file(&img, kps, Some(image.display().to_string()))?;
            let elapsed = t0.elapsed();

            println!("Time taken: {:.2?}", elapsed);
            println!(
                "Described {} of {} keypoints ({} bytes each)",
                file.keypoints.len(),
                requested,
                file.descriptors.cols()
            );

            file.save_json(&output)?;
            println!("Saved descriptors to {}", output.display());

            if let Some(path) = draw {
                draw_keypoints(&img.to_luma8(), &file.keypoints).save(&path)?;
                println!("Saved keypoint image to {}", path.display());
            }
        }
        Command::Match { query, train, k, radius, compact, output } => {
            if let Some(n) = cli.threads {
                brisk_cli::brisk_core::init_thread_pool(n)?;
            }
            let query = DescriptorFile::load_json(&query)?;
            let train = DescriptorFile::load_json(&train)?;
            let mode = match radius {
                Some(r) => MatchMode::Radius(r),
                None => MatchMode::Knn(k),
            };

            let t0 = Instant::now();
            let matches = BriskPipeline::match_descriptors(&query.descriptors, &train.descriptors, mode, compact)?;
            let elapsed = t0.elapsed();

            let total: usize = matches.iter().map(Vec::len).sum();
            println!("Time taken: {:.2?}", elapsed);
            println!(
                "{} queries x {} train rows: {} matches in {} lists",
                query.descriptors.rows(),
                train.descriptors.rows(),
                total,
                matches.len()
            );

            match output {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string(&matches)?)?;
                    println!("Saved matches to {}", path.display());
                }
                None => {
                    for m in matches.iter().filter_map(|row| row.first()).take(10) {
                        println!("  query {} -> train {} (distance {})", m.query_idx, m.train_idx, m.distance);
                    }
                }
            }
        }
        Command::Pattern { config } => {
            let cfg = load_config(config.as_deref())?;
            let pipeline = BriskPipeline::new(cfg)?;
            println!("{}", pipeline.config().summary());
            println!("{}", pattern_summary(pipeline.pattern()));
        }
    }
    Ok(())
}
