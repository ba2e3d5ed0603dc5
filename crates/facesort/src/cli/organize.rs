//! The `facesort organize` command: sort a directory of photos and, via
//! `--undo`, reverse a previous run.

use clap::{Args, ValueEnum};
use facesort_core::{undo, Config, Engine, EngineError, RunOptions, VisionError};
use std::path::PathBuf;

/// Arguments for the `organize` command.
#[derive(Args, Debug)]
pub struct OrganizeArgs {
    /// Directory of photos to sort
    #[arg(required = true)]
    pub source: PathBuf,

    /// Destination directory for the sorted layout
    #[arg(short, long, default_value = "./organized_photos")]
    pub output: PathBuf,

    /// Classification strategy: match against a roster, or auto-cluster on the fly
    #[arg(long, value_enum, default_value = "database")]
    pub mode: Mode,

    /// Place files by copying or moving them
    #[arg(long = "copy-or-move", value_enum, default_value = "copy")]
    pub copy_or_move: CopyOrMoveArg,

    /// Resolve the placement plan without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Walk subdirectories of SOURCE_DIR
    #[arg(short = 'r', long, default_value_t = true, action = clap::ArgAction::Set)]
    pub recursive: bool,

    /// Override the match/cluster confidence threshold
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Concurrency width of the vision analysis stage
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Reverse a previous run recorded at --output, ignoring SOURCE_DIR
    #[arg(long)]
    pub undo: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Database,
    AutoCluster,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOrMoveArg {
    Copy,
    Move,
}

mod exit {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 1;
    pub const VISION_FATAL: i32 = 2;
    pub const PARTIAL_FAILURE: i32 = 3;
}

/// Execute the organize command, returning the process exit code.
pub async fn execute(args: OrganizeArgs, mut config: Config) -> anyhow::Result<i32> {
    if args.undo {
        return Ok(execute_undo(&args));
    }

    if !args.source.exists() {
        eprintln!(
            "source directory does not exist: {}",
            args.source.display()
        );
        return Ok(exit::USER_ERROR);
    }

    if let Some(confidence) = args.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            eprintln!("--confidence must be within [0, 1], got {confidence}");
            return Ok(exit::USER_ERROR);
        }
        match args.mode {
            Mode::Database => config.vision.match_threshold = confidence,
            Mode::AutoCluster => config.vision.cluster_threshold = confidence,
        }
    }
    config.output.copy_mode = matches!(args.copy_or_move, CopyOrMoveArg::Copy);
    if let Some(parallel) = args.parallel {
        if parallel == 0 {
            eprintln!("--parallel must be at least 1");
            return Ok(exit::USER_ERROR);
        }
        config.processing.parallel = parallel;
    }

    let engine = match Engine::new(config).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to start engine: {e}");
            return Ok(classify_engine_error(&e));
        }
    };

    let run_options = RunOptions {
        dry_run: args.dry_run,
        recursive: args.recursive,
    };

    let result = match args.mode {
        Mode::Database => {
            engine
                .run_database_match(&args.source, &args.output, &run_options)
                .await
        }
        Mode::AutoCluster => {
            engine
                .run_auto_cluster(&args.source, &args.output, &run_options)
                .await
        }
    };

    let (summary, placements) = match result {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("run failed: {e}");
            return Ok(classify_engine_error(&e));
        }
    };

    if args.dry_run {
        println!("dry run: {} placement(s) planned", placements.len());
        for placement in &placements {
            let destination = placement
                .destination_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unresolved>".to_string());
            println!("  {} -> {destination}", placement.source_path.display());
        }
    } else {
        println!(
            "placed {} of {} file(s) ({} single-subject, {} multi-subject, {} unknown, {} no-faces)",
            summary.placements_succeeded,
            summary.placements_succeeded + summary.placements_failed,
            summary.single_subject,
            summary.multiple_subjects,
            summary.unknown_subjects,
            summary.no_faces,
        );
        if summary.decode_errors > 0 {
            eprintln!("{} image(s) failed to decode and were skipped", summary.decode_errors);
        }
        if summary.vision_errors > 0 {
            eprintln!("{} image(s) failed vision analysis and were routed to No_Faces_Detected", summary.vision_errors);
        }
    }

    if summary.had_partial_failure() {
        Ok(exit::PARTIAL_FAILURE)
    } else {
        Ok(exit::SUCCESS)
    }
}

fn execute_undo(args: &OrganizeArgs) -> i32 {
    let manifest_path = args.output.join(".original_paths.json");
    match undo(&manifest_path) {
        Ok(result) => {
            println!(
                "undo complete: {} restored, {} failed",
                result.succeeded, result.failed
            );
            if result.failed > 0 {
                exit::PARTIAL_FAILURE
            } else {
                exit::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("undo failed: {e}");
            exit::USER_ERROR
        }
    }
}

/// Map an engine error to its documented exit code: 2 for a fatal,
/// non-retryable vision-backend failure, 1 for everything a user can fix
/// (bad config, missing manifest, transport setup failure).
fn classify_engine_error(error: &EngineError) -> i32 {
    match error {
        EngineError::Vision(VisionError::Auth(_))
        | EngineError::Vision(VisionError::Quota(_))
        | EngineError::Vision(VisionError::InvalidArgument(_)) => exit::VISION_FATAL,
        _ => exit::USER_ERROR,
    }
}
