// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// Layer 2 use case. Query results are printed as JSON on stdout;
// errors bubble up to main and end the process with a non-zero
// status ("user 'x' not in model" for an unknown user).
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ExportArgs, FoldInArgs, RecommendArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "hybrid-recommender",
    version,
    about = "Train a hybrid latent-factor recommender on ratings and genres, then query or export it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand; the CLI layer never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Recommend(args) => run_recommend(args),
            Commands::FoldIn(args)    => run_fold_in(args),
            Commands::Export(args)    => run_export(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on ratings in: {}", args.ratings);
    let checkpoint_dir = args.checkpoint_dir.clone();
    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete. Best eval RMSE {:.4} at epoch {}; checkpoint in '{}'.",
        report.best_rmse, report.best_epoch, checkpoint_dir
    );
    Ok(())
}

fn run_recommend(args: RecommendArgs) -> Result<()> {
    use crate::application::recommend_use_case::RecommendUseCase;

    let use_case = RecommendUseCase::new(&args.checkpoint_dir)?;
    let response = use_case.recommend(&args.user, args.top_k, &args.exclude)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_fold_in(args: FoldInArgs) -> Result<()> {
    use crate::application::recommend_use_case::RecommendUseCase;

    let use_case = RecommendUseCase::new(&args.checkpoint_dir)?;
    let response = use_case.fold_in(&args.genres, args.top_k, &args.exclude)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    use crate::application::export_use_case::ExportUseCase;
    use crate::infra::export::JsonDirSink;

    let mut sink = JsonDirSink::new(&args.out_dir);
    let summary  = ExportUseCase::new(args.checkpoint_dir).execute(&mut sink)?;
    println!(
        "Exported {} items, {} users{} to '{}'.",
        summary.items,
        summary.users,
        if summary.genre_layer { " and the genre layer" } else { "" },
        args.out_dir
    );
    Ok(())
}
