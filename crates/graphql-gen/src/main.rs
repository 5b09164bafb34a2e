//! `gqlgen` — ingest a GraphQL schema and dynamically generate operations
//! against it from natural-language input.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graphql_gen::config;
use graphql_gen::embedding::create_embedding_client;
use graphql_gen::llm::create_llm_provider;
use graphql_gen::sqlite_store::SqliteVectorStore;
use graphql_gen_core::embedding_service;
use graphql_gen_core::generator::{self, GeneratorConfig, StructuralSchemaValidator};
use graphql_gen_core::models::GenerationContext;
use graphql_gen_core::store::VectorStore;

#[derive(Parser)]
#[command(name = "gqlgen", about = "Schema ingestion and dynamic GraphQL operation generation", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./gqlgen.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    Init,

    /// Embed a GraphQL SDL file into the vector store
    Embed {
        /// Path to a `.graphql`/`.gql` SDL file
        schema_file: PathBuf,

        /// Force a full re-embed instead of an incremental diff
        #[arg(long)]
        full: bool,
    },

    /// Generate a GraphQL operation from natural-language input
    Generate {
        /// Natural-language description of the desired operation
        query: String,

        /// Disable structural schema validation of the generated operation
        #[arg(long)]
        no_validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            graphql_gen::migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Embed { schema_file, full } => {
            let pool = graphql_gen::db::connect(&cfg).await?;
            let store = SqliteVectorStore::new(pool);
            let provider = create_embedding_client(&cfg.embedding)?;
            let sdl = std::fs::read_to_string(&schema_file)?;

            if full {
                embedding_service::clear(&store, &cfg.db.table).await?;
            }
            let report =
                embedding_service::embed_and_store_incremental(&*provider, &store, &cfg.db.table, &sdl, cfg.chunking.max_content_length)
                    .await?;
            println!(
                "Embedded {} added, {} deleted, {} unchanged ({} ms).",
                report.added, report.deleted, report.unchanged, report.duration_ms
            );
            store.close().await?;
        }
        Commands::Generate { query, no_validate } => {
            let pool = graphql_gen::db::connect(&cfg).await?;
            let store = SqliteVectorStore::new(pool);
            let embedder = create_embedding_client(&cfg.embedding)?;
            let llm = create_llm_provider(&cfg.llm)?;

            let input_vector = embedder.embed(&query).await?;
            let context = GenerationContext { input_vector, input_text: query };
            let generator_config: GeneratorConfig = (&cfg.generator).into();

            let validator = StructuralSchemaValidator;
            let result = generator::generate(
                &store,
                &*llm,
                if no_validate { None } else { Some(&validator as &dyn generator::SchemaValidator) },
                &cfg.db.table,
                &context,
                &generator_config,
            )
            .await?;

            println!("{}", result.operation);
            println!("{}", serde_json::to_string_pretty(&result.variables)?);
            store.close().await?;
        }
    }

    Ok(())
}
