//! Command-line front end driving a standalone fetch cache through a
//! scripted sequence of fetch/read/unreserve calls, for manual inspection
//! and as a worked example of the library's public API.

use std::fs;

use clap::{Parser, Subcommand};
use fetchcache::{CountingSink, FetchCache, FetchCacheConfig, StatKey};
use log::info;

#[derive(Parser, Debug)]
#[command(name = "fcsim", author, version, about = "Fetch-cache family simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a fixed cold-miss/read/unreserve sequence against a fetch cache
    /// built from `--config`, printing its statistics afterward.
    Run {
        /// Path to a JSON-serialized `FetchCacheConfig`.
        #[arg(short, long)]
        config: Option<String>,

        /// Number of distinct line addresses to fetch, read, and unreserve.
        #[arg(short, long, default_value_t = 8)]
        addresses: u64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, addresses } => run(config.as_deref(), addresses),
    }
}

fn default_config() -> FetchCacheConfig {
    FetchCacheConfig {
        ways: 4,
        lines: 256,
        bytes_per_line: 64,
        request_queue_size: 16,
    }
}

fn load_config(path: Option<&str>) -> FetchCacheConfig {
    let Some(path) = path else {
        return default_config();
    };
    let contents = fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("could not read config at {path}: {err}");
        std::process::exit(1);
    });
    serde_json::from_str(&contents).unwrap_or_else(|err| {
        eprintln!("could not parse config at {path}: {err}");
        std::process::exit(1);
    })
}

fn run(config_path: Option<&str>, addresses: u64) {
    let config = load_config(config_path);
    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        std::process::exit(1);
    }

    let mut cache = FetchCache::<u64>::new(config.ways, config.lines, config.bytes_per_line, config.request_queue_size)
        .unwrap_or_else(|err| {
            eprintln!("could not construct fetch cache: {err}");
            std::process::exit(1);
        });
    let mut stats = CountingSink::new("");

    for i in 0..addresses {
        let address = i << cache.layout().tag_shift;
        let outcome = match cache.fetch(address, 0, false, &mut stats) {
            Ok(outcome) => outcome,
            Err(failure) => {
                info!("fetch {address:#x} failed: {failure:?}");
                continue;
            }
        };
        if outcome.miss {
            if let Some((id, _request)) = cache.get_request() {
                cache.free_request(id, false, true);
            }
        }
        let data = vec![0u8; 4];
        let mut out = vec![0u8; 4];
        cache.write(address, outcome.way, outcome.set, 4, &data, &mut stats);
        cache.read(address, outcome.way, outcome.set, 4, &mut out, &mut stats);
        cache.unreserve(outcome.way, outcome.set, &mut stats);
    }

    println!("HitsFetch:    {}", stats.get(StatKey::HitsFetch));
    println!("MissesFetch:  {}", stats.get(StatKey::MissesFetch));
    println!("MissOKFetch:  {}", stats.get(StatKey::MissOkFetch));
    println!("ReadsOK:      {}", stats.get(StatKey::ReadsOk));
    println!("WritesOK:     {}", stats.get(StatKey::WritesOk));
    println!("Unreserves:   {}", stats.get(StatKey::Unreserves));
}
