use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use idsmith::contracts::{scope_key, RecordStore, SequenceAllocator};
use idsmith::guard::{Collection, GuardConfig, RecordDraft, UniquenessGuard};
use idsmith::storage::{RocksDbConfig, RocksDbStorage};
use idsmith::template::{preview, Template};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "idsmith", version, about = "Generate per-collection custom identifiers")]
struct Cli {
    /// RocksDB data directory
    #[arg(long, env = "IDSMITH_DATA_DIR", default_value = "./data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create records with generated identifiers and print them
    Generate {
        /// Collection (inventory) id
        #[arg(long)]
        collection: String,
        /// Template JSON file; the bare-sequence default is used when omitted
        #[arg(long)]
        template: Option<PathBuf>,
        /// Number of records to create
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Record fields as a JSON object
        #[arg(long, default_value = "{}")]
        fields: String,
        /// Use this identifier instead of generating one
        #[arg(long, conflicts_with = "count")]
        custom_id: Option<String>,
        /// Overrides IDSMITH_MAX_ATTEMPTS
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Render a sample identifier without writing anything
    Preview {
        #[arg(long)]
        template: PathBuf,
        /// Read the next sequence number from this collection's counter
        #[arg(long)]
        collection: Option<String>,
        /// Sequence number to render (default: counter + 1, or 1)
        #[arg(long)]
        seq: Option<u64>,
        /// Reference date, YYYY-MM-DD (default: today)
        #[arg(long)]
        at: Option<NaiveDate>,
    },
    /// List records of a collection as JSON lines
    List {
        #[arg(long)]
        collection: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show a collection's sequence counter
    Counter {
        #[arg(long)]
        collection: String,
    },
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("idsmith=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            collection,
            template,
            count,
            fields,
            custom_id,
            max_attempts,
        } => {
            let storage = open_storage(&cli.data_dir)?;
            let config = match max_attempts {
                Some(n) => GuardConfig::with_max_attempts(n),
                None => GuardConfig::from_env(),
            };
            let guard = UniquenessGuard::with_storage(storage, config);

            let mut collection = Collection::new(collection);
            if let Some(path) = template {
                collection = collection.with_template(load_template(&path)?);
            }
            let fields: serde_json::Value = serde_json::from_str(&fields)?;

            for _ in 0..count {
                let mut draft = RecordDraft::new(fields.clone());
                if let Some(ref id) = custom_id {
                    draft = draft.with_custom_id(id.clone());
                }
                let record = guard.create_with_generated_id(&collection, draft)?;
                println!("{}", record.custom_id);
            }
            tracing::debug!(metrics = %guard.metrics().format_prometheus(), "Generation finished");
        }
        Command::Preview {
            template,
            collection,
            seq,
            at,
        } => {
            let template = load_template(&template)?;
            let next = match (seq, collection) {
                (Some(seq), _) => seq,
                (None, Some(collection)) => {
                    let storage = open_storage(&cli.data_dir)?;
                    storage
                        .current_sequence(&scope_key(&collection))?
                        .saturating_add(1)
                }
                (None, None) => 1,
            };
            let at = at
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|midnight| Utc.from_utc_datetime(&midnight))
                .unwrap_or_else(Utc::now);
            println!("{}", preview(&template, at, next, &mut rand::rng())?);
        }
        Command::List {
            collection,
            offset,
            limit,
        } => {
            let storage = open_storage(&cli.data_dir)?;
            for record in storage.list(&collection, offset, limit)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Command::Counter { collection } => {
            let storage = open_storage(&cli.data_dir)?;
            match storage.counter(&scope_key(&collection))? {
                Some(counter) => println!(
                    "{} seq={} updated_at_ms={}",
                    counter.key, counter.seq, counter.updated_at_ms
                ),
                None => println!("{} seq=0 (no counter yet)", scope_key(&collection)),
            }
        }
    }

    Ok(())
}

fn open_storage(data_dir: &Path) -> Result<Arc<RocksDbStorage>, BoxError> {
    let storage = RocksDbStorage::open_with_config(data_dir, &RocksDbConfig::from_env())?;
    Ok(Arc::new(storage))
}

fn load_template(path: &Path) -> Result<Template, BoxError> {
    let json = std::fs::read_to_string(path)?;
    let template = Template::from_json(&json)?;
    tracing::debug!(path = %path.display(), elements = template.elements.len(), "Loaded template");
    Ok(template)
}
