//! karbin: command-line front end for the job recommender.
//!
//! Subcommands build the vector index snapshot, inspect a user's candidate
//! pool, produce recommendations and run the offline evaluation.

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use karbin_core::{PairwiseScorer, Recommendations, RecommenderConfig, UserId};
use karbin_db::Database;
use karbin_inference::{HttpCrossEncoder, OllamaEmbedder};
use karbin_search::{
    EvaluationConfig, EvaluationHarness, EvaluationSummary, RecommendationEngine, SnapshotBuilder,
};

/// Exit code when recommendations are switched off because the index did
/// not load.
const EXIT_UNAVAILABLE: u8 = 3;

#[derive(Parser)]
#[command(name = "karbin")]
#[command(author, version, about = "Job recommendations from profile embeddings and hard filters")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost/karbin")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Embed active jobs and write the index snapshot
    BuildIndex {
        /// Embed at most this many jobs (newest first)
        #[arg(long)]
        limit: Option<i64>,

        /// Snapshot path (default: configured snapshot_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the job ids passing a user's hard filters
    Candidates {
        #[arg(short, long)]
        user_id: UserId,
    },

    /// Recommend jobs for a user
    Recommend {
        #[arg(short, long)]
        user_id: UserId,

        /// Number of results (default: configured top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Shortlist size for re-ranking (default: configured retrieval_k)
        #[arg(long)]
        retrieval_k: Option<usize>,

        /// Re-rank the shortlist with the pairwise scorer
        #[arg(long)]
        rerank: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run persona users through the pipeline and report quality metrics
    Evaluate {
        /// Persona user ids
        #[arg(long, value_delimiter = ',', default_values_t = karbin_core::defaults::EVAL_PERSONAS)]
        users: Vec<UserId>,

        /// List length scored by the metrics
        #[arg(long, default_value_t = karbin_core::defaults::EVAL_TOP_K)]
        evaluate_k: usize,

        /// Results shown per persona
        #[arg(long, default_value_t = karbin_core::defaults::EVAL_DISPLAY_K)]
        display_k: usize,

        /// Print JSON instead of a report
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cli = Cli::parse();
    let config = RecommenderConfig::load()?;
    let db = Database::connect(&cli.database_url).await?;

    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
            info!("Database migrations complete");
            println!("Migrations applied");
        }
        Commands::BuildIndex { limit, output } => {
            let path = output.unwrap_or_else(|| config.snapshot_path.clone());
            let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
            let snapshot = SnapshotBuilder::new(db.jobs.clone(), embedder)
                .build_to(limit, &path)
                .await?;
            println!(
                "Indexed {} jobs ({}, dim {}) -> {}",
                snapshot.count,
                snapshot.model,
                snapshot.dimension,
                path.display()
            );
        }
        Commands::Candidates { user_id } => {
            let engine = engine(&db, config, false)?;
            let mut ids: Vec<_> = engine.get_candidate_ids(user_id).await?.into_iter().collect();
            ids.sort_unstable();
            println!("{} candidate jobs for user {}", ids.len(), user_id);
            for id in ids {
                println!("{id}");
            }
        }
        Commands::Recommend {
            user_id,
            top_k,
            retrieval_k,
            rerank,
            json,
        } => {
            let top_k = top_k.unwrap_or(config.top_k);
            let retrieval_k = retrieval_k.unwrap_or(config.retrieval_k);
            let engine = engine(&db, config, true)?;

            let outcome = match engine.recommend(user_id, top_k, retrieval_k, rerank).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_unavailable() => {
                    eprintln!("{e}");
                    return Ok(ExitCode::from(EXIT_UNAVAILABLE));
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_recommendations(user_id, &outcome);
            }
        }
        Commands::Evaluate {
            users,
            evaluate_k,
            display_k,
            json,
        } => {
            let engine = engine(&db, config, true)?;
            let harness = EvaluationHarness::new(
                &engine,
                EvaluationConfig {
                    personas: users,
                    evaluate_k,
                    display_k,
                    ..Default::default()
                },
            );

            let summary = match harness.run().await {
                Ok(summary) => summary,
                Err(e) if e.is_unavailable() => {
                    eprintln!("{e}");
                    return Ok(ExitCode::from(EXIT_UNAVAILABLE));
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_evaluation(&summary);
            }
        }
    }

    db.log_pool_health();
    Ok(ExitCode::SUCCESS)
}

/// Wire the engine to the database and model backends. The snapshot is only
/// loaded when the command ranks.
fn engine(
    db: &Database,
    config: RecommenderConfig,
    load_index: bool,
) -> anyhow::Result<RecommendationEngine> {
    let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
    let scorer: Option<Arc<dyn PairwiseScorer>> = match &config.reranker {
        Some(reranker) => Some(Arc::new(HttpCrossEncoder::new(reranker)?)),
        None => None,
    };

    let mut engine =
        RecommendationEngine::new(db.jobs.clone(), db.users.clone(), embedder, config);
    if let Some(scorer) = scorer {
        engine = engine.with_scorer(scorer);
    }
    if load_index {
        engine = engine.with_snapshot();
    }
    Ok(engine)
}

fn print_recommendations(user_id: UserId, outcome: &Recommendations) {
    match outcome {
        Recommendations::IncompleteProfile => {
            println!("User {user_id}: profile incomplete. Add a title, skills or experience.");
        }
        Recommendations::Results(results) if results.is_empty() => {
            println!("User {user_id}: no matching jobs yet.");
        }
        Recommendations::Results(results) => {
            println!("Recommendations for user {user_id}:");
            for (rank, r) in results.iter().enumerate() {
                let marker = if r.reranked { "*" } else { " " };
                println!(
                    "{:>3}. [{:.3}]{} {} @ {} ({})",
                    rank + 1,
                    r.score,
                    marker,
                    r.title,
                    r.company,
                    r.location
                );
                println!("       {}", r.reason);
                if let Some(link) = &r.link {
                    println!("       {link}");
                }
            }
        }
    }
}

fn fmt_recall(recall: Option<f64>) -> String {
    recall.map_or_else(|| "N/A".to_string(), |r| format!("{r:.3}"))
}

fn print_evaluation(summary: &EvaluationSummary) {
    println!(
        "Evaluation @{} ({} reports)",
        summary.evaluate_k,
        summary.reports.len()
    );

    for report in &summary.reports {
        println!();
        println!(
            "User {} [{}]: {} results, {} relevant",
            report.user_id,
            report.variant.as_str(),
            report.result_count,
            report.ground_truth_size
        );
        match (&report.metrics, &report.error) {
            (_, Some(error)) => println!("  failed: {error}"),
            (None, None) if report.incomplete_profile => println!("  profile incomplete, skipped"),
            (None, None) => println!("  no recommendations, skipped"),
            (Some(m), None) => {
                println!(
                    "  precision {:.3}  recall {}  diversity {:.3}  novelty {:.3}  serendipity {:.3}",
                    m.precision,
                    fmt_recall(m.recall),
                    m.diversity,
                    m.novelty,
                    m.serendipity
                );
                for r in &report.top {
                    println!("    [{:.3}] {} @ {}", r.score, r.title, r.company);
                }
            }
        }
    }

    println!();
    println!(
        "{:<10} {:>8} {:>9} {:>8} {:>9} {:>8} {:>11}",
        "variant", "personas", "precision", "recall", "diversity", "novelty", "serendipity"
    );
    for v in &summary.variants {
        println!(
            "{:<10} {:>8} {:>9.3} {:>8} {:>9.3} {:>8.3} {:>11.3}",
            v.variant.as_str(),
            v.personas,
            v.precision,
            fmt_recall(v.recall),
            v.diversity,
            v.novelty,
            v.serendipity
        );
    }
}
