//! Command-line front end for the OCR pipeline.
//!
//! # Usage
//!
//! ```bash
//! ppocr --image page.jpg
//! ppocr --task reg --image line.png --rec-model models/rec/inference.onnx --rec-yaml models/rec/inference.yml
//! ppocr --task dec --image page.jpg --infer-backend ORTCUDA --bench --thread-sweep
//! ```

use clap::Parser;
use ppocr_onnx::core::config::{ConfigValidator, StageConfig};
use ppocr_onnx::core::{InferBackend, StageTimings, TaskKind, init_tracing_with_level};
use ppocr_onnx::pipeline::{
    BenchmarkLabel, BenchmarkStats, ConfigLoader, Pipeline, PipelineConfig, PipelineResult,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Intra-op thread counts tried by `--thread-sweep`.
const THREAD_SWEEP: [usize; 4] = [1, 2, 4, 8];

#[derive(Parser, Debug)]
#[command(name = "ppocr")]
#[command(about = "Text detection, orientation and recognition on ONNX Runtime")]
struct Args {
    /// Image to process.
    #[arg(long)]
    image: PathBuf,

    /// What to run: dec, angle, reg or ocr.
    #[arg(long, default_value = "ocr")]
    task: TaskKind,

    /// Pipeline configuration file (TOML or JSON). Overrides the model flags.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the standard model layout.
    #[arg(long, default_value = "models")]
    model_root: PathBuf,

    #[arg(long)]
    det_model: Option<PathBuf>,
    #[arg(long)]
    det_yaml: Option<PathBuf>,
    #[arg(long)]
    angle_model: Option<PathBuf>,
    #[arg(long)]
    angle_yaml: Option<PathBuf>,
    #[arg(long)]
    rec_model: Option<PathBuf>,
    #[arg(long)]
    rec_yaml: Option<PathBuf>,

    /// ORTCPU, ORTCUDA or TRT.
    #[arg(long, default_value = "ORTCPU")]
    infer_backend: InferBackend,

    /// Write intermediate detection images (off unless set to 1/true).
    #[arg(
        long,
        default_value = "0",
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    save_image: bool,

    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 1)]
    intra_threads: usize,

    #[arg(long, default_value_t = 1)]
    inter_threads: usize,

    /// 0 trace, 1 debug, 2 info, 3 warn, 4 error, 5 off. `RUST_LOG` wins when set.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=5))]
    log_level: u8,

    /// Measure latency instead of printing results.
    #[arg(long)]
    bench: bool,

    #[arg(long, default_value_t = 10)]
    warmup: usize,

    #[arg(long, default_value_t = 100)]
    iters: usize,

    /// Benchmark once per intra-op thread count in 1, 2, 4, 8.
    #[arg(long)]
    thread_sweep: bool,
}

fn level_name(level: u8) -> &'static str {
    match level {
        0 => "trace",
        1 => "debug",
        2 => "info",
        3 => "warn",
        4 => "error",
        _ => "off",
    }
}

fn stage_override(stage: &mut StageConfig, model: &Option<PathBuf>, yaml: &Option<PathBuf>) {
    if let Some(model) = model {
        stage.model_path = model.clone();
    }
    if let Some(yaml) = yaml {
        stage.config_path = yaml.clone();
    }
}

fn pipeline_config(args: &Args) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => {
            let mut config = PipelineConfig::for_task(args.task, &args.model_root)
                .with_backend(args.infer_backend)
                .with_threads(args.intra_threads, args.inter_threads)
                .with_save_images(args.save_image, &args.output_dir);
            if let Some(stage) = config.stage_mut(TaskKind::Detection) {
                stage_override(stage, &args.det_model, &args.det_yaml);
            }
            if let Some(stage) = config.stage_mut(TaskKind::Orientation) {
                stage_override(stage, &args.angle_model, &args.angle_yaml);
            }
            if let Some(stage) = config.stage_mut(TaskKind::Recognition) {
                stage_override(stage, &args.rec_model, &args.rec_yaml);
            }
            config
        }
    };
    config.validate()?;
    Ok(config)
}

fn print_result(task: TaskKind, result: &PipelineResult) {
    match task {
        TaskKind::Detection => {
            for (i, region) in result.regions.iter().enumerate() {
                let points: Vec<String> = region
                    .points
                    .iter()
                    .map(|p| format!("({:.0}, {:.0})", p.x, p.y))
                    .collect();
                println!("Batch[{i}] Region: {} score {:.3}", points.join(" "), region.score);
            }
        }
        TaskKind::Orientation => {
            for (i, flag) in result.flags.iter().enumerate() {
                let angle = if *flag == 0 { 0 } else { 180 };
                println!("Batch[{i}] Angle: {angle}");
            }
        }
        TaskKind::Recognition | TaskKind::Combined => {
            for (i, (text, score)) in result.texts.iter().zip(&result.text_scores).enumerate() {
                println!("Batch[{i}] OCR Result: {text} ({score:.3})");
            }
        }
    }
    print_timings(&result.timings);
}

fn print_timings(t: &StageTimings) {
    println!(
        "Pre-process: {:.3} ms, Inference: {:.3} ms, Post-process: {:.3} ms",
        t.pre.as_secs_f64() * 1e3,
        t.infer.as_secs_f64() * 1e3,
        t.post.as_secs_f64() * 1e3
    );
}

fn bench_task_name(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Detection => "Detection",
        TaskKind::Orientation => "Anglecls",
        TaskKind::Recognition => "Recognize",
        TaskKind::Combined => "OCR",
    }
}

fn run_bench(
    args: &Args,
    config: &PipelineConfig,
    intra_threads: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config
        .clone()
        .with_threads(intra_threads, args.inter_threads)
        .with_save_images(false, &args.output_dir);
    let pipeline = Pipeline::from_config(&config)?;
    let image = ppocr_onnx::utils::load_image(&args.image)?;

    for _ in 0..args.warmup {
        pipeline.run_image(image.clone())?;
    }
    let mut stats = BenchmarkStats::with_capacity(args.iters);
    for _ in 0..args.iters {
        stats.record(pipeline.run_image(image.clone())?.timings);
    }

    let backend = config
        .stages
        .first()
        .map(|s| s.backend)
        .unwrap_or(args.infer_backend);
    let label = BenchmarkLabel {
        task: bench_task_name(pipeline.task().unwrap_or(args.task)).to_string(),
        image: file_name(&args.image),
        backend: backend.to_string(),
        intra_threads,
        inter_threads: args.inter_threads,
    };
    println!("{}", stats.report(&label));
    let csv_dir = args.output_dir.join("benchmark");
    if let Err(e) = stats.write_csv(&csv_dir, &label) {
        warn!(dir = %csv_dir.display(), error = %e, "could not write benchmark csv");
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing_with_level(level_name(args.log_level));

    if !args.image.exists() {
        error!(image = %args.image.display(), "image file not found");
        return Err(format!("image file not found: {}", args.image.display()).into());
    }

    let config = pipeline_config(&args)?;

    if args.bench {
        let sweep: Vec<usize> = if args.thread_sweep {
            THREAD_SWEEP.to_vec()
        } else {
            vec![args.intra_threads]
        };
        for intra in sweep {
            info!(intra_threads = intra, "benchmark run");
            run_bench(&args, &config, intra)?;
        }
        return Ok(());
    }

    let pipeline = Pipeline::from_config(&config)?;
    let result = pipeline.run_path(&args.image)?;
    print_result(pipeline.task().unwrap_or(args.task), &result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intermediate_images_are_opt_in() {
        let args = Args::try_parse_from(["ppocr", "--image", "page.png"]).unwrap();
        assert!(!args.save_image);

        let args =
            Args::try_parse_from(["ppocr", "--image", "page.png", "--save-image", "1"]).unwrap();
        assert!(args.save_image);
    }
}
