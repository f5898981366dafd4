use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use matchmaker_core::cluster::kmeans::{kmeans, language_points, KMeansOptions};
use matchmaker_core::query::explain::{explain, parse_result_line};
use matchmaker_core::{
    write_results, Engine, EngineConfig, IndexBuilder, IndexNeighbors, IndexSet, MatrixKind,
    MatrixStore, NeighborSource,
};

#[derive(Parser, Debug)]
#[command(name = "matchmaker", about = "Repository recommendations from watch history")]
struct Cli {
    /// Directory holding data.txt, repos.txt, lang.txt and test.txt
    #[arg(long, global = true, default_value = ".")]
    data_dir: PathBuf,
    /// Path to config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Ignore and do not write the index snapshot
    #[arg(long, global = true)]
    no_snapshot: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score every user in test.txt and write the result file.
    Recommend {
        /// Output file, one `user:repo,...` line per user
        #[arg(long, default_value = "results.txt")]
        output: PathBuf,
        /// Worker threads; defaults to the global rayon pool
        #[arg(long)]
        workers: Option<usize>,
        /// Serve co-occurrence neighbors from an exported SQLite store
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Print index cardinalities as JSON.
    Stats,

    /// Cluster repositories by language profile.
    Cluster {
        #[arg(long, default_value_t = 3)]
        k: usize,
        #[arg(long, default_value_t = 0.5)]
        cutoff: f64,
        #[arg(long, default_value_t = 300)]
        max_iterations: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },

    /// Show a result line's watch list and additions with repo details.
    Explain {
        /// A `user:repo,...` line, optionally prefixed by `+` or `-`
        #[arg(allow_hyphen_values = true)]
        line: String,
    },

    /// Write the co-occurrence matrices to a SQLite store.
    ExportMatrix {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, default_value_t = 10_000)]
        batch_size: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())
        .with_context(|| "loading engine configuration")?;
    let index = build_index(&cli.data_dir, &config, cli.no_snapshot)?;

    match cli.command {
        Commands::Recommend {
            output,
            workers,
            store,
        } => cmd_recommend(&index, &config, &output, workers, store.as_deref()),
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&index.summary())?);
            Ok(())
        }
        Commands::Cluster {
            k,
            cutoff,
            max_iterations,
            seed,
        } => cmd_cluster(
            &index,
            KMeansOptions {
                k,
                cutoff,
                max_iterations,
            },
            seed,
        ),
        Commands::Explain { line } => {
            let (user, repos) = parse_result_line(&line)?;
            println!("{}", explain(&index, user, &repos));
            Ok(())
        }
        Commands::ExportMatrix { db, batch_size } => cmd_export(&index, &db, batch_size),
    }
}

fn build_index(data_dir: &Path, config: &EngineConfig, no_snapshot: bool) -> anyhow::Result<IndexSet> {
    let mut builder = IndexBuilder::new(data_dir, config.index.clone());
    if no_snapshot {
        builder = builder.without_snapshot();
    }
    builder
        .build()
        .with_context(|| format!("building index from {}", data_dir.display()))
}

fn cmd_recommend(
    index: &IndexSet,
    config: &EngineConfig,
    output: &Path,
    workers: Option<usize>,
    store: Option<&Path>,
) -> anyhow::Result<()> {
    let in_memory = IndexNeighbors::new(index);
    let sqlite = match store {
        Some(path) => Some(
            MatrixStore::open(path)
                .with_context(|| format!("opening matrix store {}", path.display()))?,
        ),
        None => None,
    };
    let neighbors: &dyn NeighborSource = match &sqlite {
        Some(s) => s,
        None => &in_memory,
    };

    let engine = Engine::new(index, neighbors, config.weights.clone());
    let results = engine.score_all(index.test_users(), workers);
    write_results(output, &results)
        .with_context(|| format!("writing results to {}", output.display()))?;
    info!(users = results.len(), "results written to {}", output.display());
    Ok(())
}

fn cmd_cluster(index: &IndexSet, options: KMeansOptions, seed: u64) -> anyhow::Result<()> {
    let (languages, points) = language_points(index);
    info!(
        repos = points.len(),
        dimensions = languages.len(),
        "clustering language vectors"
    );
    let mut rng = StdRng::seed_from_u64(seed);
    let result = kmeans(points, options, &mut rng)?;
    info!(iterations = result.iterations, "k-means converged");
    for (i, cluster) in result.clusters.iter().enumerate() {
        let sample: Vec<String> = cluster
            .points()
            .iter()
            .take(10)
            .map(|p| p.reference.to_string())
            .collect();
        println!("cluster {i}: {} repos [{}]", cluster.len(), sample.join(","));
    }
    Ok(())
}

fn cmd_export(index: &IndexSet, db: &Path, batch_size: usize) -> anyhow::Result<()> {
    let store = MatrixStore::open(db).with_context(|| format!("opening {}", db.display()))?;
    let repos = store.export_matrix(MatrixKind::Repo, index.repo_matrix(), batch_size)?;
    let users = store.export_matrix(MatrixKind::User, index.user_matrix(), batch_size)?;
    println!("exported {repos} repo pairs and {users} user pairs to {}", db.display());
    Ok(())
}
