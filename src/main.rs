use clap::{Parser, Subcommand, ValueEnum};
use limoncello::cli::Repl;
use limoncello::types::Config;
use limoncello::vector::embedding::{EmbeddingConfig, DEFAULT_OPENAI_MODEL};
use limoncello::Database;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "limoncello")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Limoncello Contributors")]
#[command(about = "Limoncello - an embedded vector store for text embeddings", long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(long, global = true, default_value = "data.db")]
    db: PathBuf,

    /// Embedding provider
    #[arg(long, global = true, value_enum, default_value_t = Provider::Hashing)]
    provider: Provider,

    /// Dimensions for the hashing and mock providers
    #[arg(long, global = true, default_value_t = 384)]
    dimensions: usize,

    /// API key for the OpenAI provider
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Model for the OpenAI provider
    #[arg(long, global = true, default_value = DEFAULT_OPENAI_MODEL)]
    openai_model: String,

    /// Skip fsync after each write
    #[arg(long, global = true)]
    no_sync: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Hashing,
    Mock,
    Openai,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a collection (no-op if it exists)
    CreateCollection {
        name: String,
    },

    /// Drop a collection and all of its documents
    DropCollection {
        name: String,
    },

    /// Embed a text and store it under a key
    Ingest {
        collection: String,
        key: String,
        text: String,
    },

    /// Find the documents most similar to a query
    Search {
        /// Comma-separated collection names
        #[arg(long, short = 'c', value_delimiter = ',', required = true)]
        colls: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        query: String,
    },

    /// Print a stored embedding as JSON
    Get {
        collection: String,
        key: String,
    },

    /// Delete a document
    Delete {
        collection: String,
        key: String,
    },

    /// List collections with document counts
    Collections,

    /// Show storage statistics
    Stats,

    /// Rewrite the data file without obsolete records
    Compact,

    /// Open interactive shell (basic REPL)
    Shell,
}

impl Cli {
    fn embedding_config(&self) -> anyhow::Result<EmbeddingConfig> {
        Ok(match self.provider {
            Provider::Hashing => EmbeddingConfig::Hashing {
                dimensions: self.dimensions,
            },
            Provider::Mock => EmbeddingConfig::Mock {
                dimensions: self.dimensions,
            },
            Provider::Openai => EmbeddingConfig::OpenAi {
                api_key: self
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?,
                model: self.openai_model.clone(),
                base_url: None,
            },
        })
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = Config::default().with_sync_on_write(!cli.no_sync);
    let db = Database::open_with_config(&cli.db, config, cli.embedding_config()?)?;

    // With no command, drop into the shell
    let command = cli.command.unwrap_or(Commands::Shell);

    match command {
        Commands::CreateCollection { name } => {
            db.create_collection(&name)?;
            println!("Collection {} created", name);
        }

        Commands::DropCollection { name } => {
            db.drop_collection(&name)?;
            println!("Collection {} dropped", name);
        }

        Commands::Ingest { collection, key, text } => {
            db.ingest(&collection, &key, &text)?;
            println!("Document {} embedded", key);
        }

        Commands::Search { colls, limit, query } => {
            let results = db.search(&colls, &query, limit)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Commands::Get { collection, key } => match db.get_embedding(&collection, &key)? {
            Some(vector) => println!("{}", serde_json::to_string(&vector)?),
            None => {
                eprintln!("Error: Document {} not found in {}", key, collection);
                std::process::exit(1);
            }
        },

        Commands::Delete { collection, key } => {
            if db.delete(&collection, &key)? {
                println!("Document {} deleted", key);
            } else {
                println!("Document {} not found", key);
            }
        }

        Commands::Collections => {
            let collections = db.list_collections();
            if collections.is_empty() {
                println!("No collections found");
            }
            for (name, count) in collections {
                println!("{} - {} documents", name, count);
            }
        }

        Commands::Stats => {
            let stats = db.stats();
            let file_size_mb = stats.file_bytes as f64 / 1024.0 / 1024.0;

            println!("Database: {}", cli.db.display());
            println!("Size: {:.2} MB", file_size_mb);
            println!("Collections: {}", stats.collections);
            println!("Total Documents: {}", stats.documents);
            println!("Obsolete Records: {}", stats.obsolete_records);
        }

        Commands::Compact => {
            let before = db.stats().file_bytes;
            db.compact()?;
            println!("Compacted {} -> {} bytes", before, db.stats().file_bytes);
        }

        Commands::Shell => {
            let mut repl = Repl::new(db);
            repl.run()?;
        }
    }

    Ok(())
}
