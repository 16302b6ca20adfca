use anyhow::bail;
use clap::Parser;
use dhpool::SizeClass;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the `dhpool-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is honored), with defaults suitable for a single-host deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dhpool-server",
    version,
    about = "Serves pre-generated Diffie-Hellman parameters from a replenished pool"
)]
pub struct CliArgs {
    /// Directory holding the parameter files.
    ///
    /// Created on startup if missing. Its contents are the only persisted
    /// state: on restart the pool is rebuilt from whatever valid files it
    /// holds.
    ///
    /// Environment variable: `STORAGE_DIR`
    #[arg(long, env = "STORAGE_DIR", default_value = "dhparam_storage")]
    pub storage_dir: PathBuf,

    /// Parameter sizes, in bits, to keep on hand and serve.
    ///
    /// Environment variable: `SIZE_CLASSES` (comma separated)
    #[arg(
        long,
        env = "SIZE_CLASSES",
        value_delimiter = ',',
        default_value = "2048,4096"
    )]
    pub size_classes: Vec<u32>,

    /// Minimum number of files to keep per size class.
    ///
    /// The pool converges toward this count, one generation per class per
    /// tick; it is not guaranteed at every instant.
    ///
    /// Environment variable: `MIN_AVAILABLE`
    #[arg(long, env = "MIN_AVAILABLE", default_value_t = 10)]
    pub min_available: usize,

    /// Milliseconds between two replenishment passes.
    ///
    /// Environment variable: `TICK_MS`
    #[arg(long, env = "TICK_MS", default_value_t = 1_000)]
    pub tick_ms: u64,

    /// Milliseconds between two listings of the storage directory.
    ///
    /// Bounds the delay between a file appearing and it being served.
    ///
    /// Environment variable: `WATCH_INTERVAL_MS`
    #[arg(long, env = "WATCH_INTERVAL_MS", default_value_t = 1_000)]
    pub watch_interval_ms: u64,

    /// Path or name of the `openssl` executable.
    ///
    /// Environment variable: `OPENSSL_BIN`
    #[arg(long, env = "OPENSSL_BIN", default_value = "openssl")]
    pub openssl_bin: PathBuf,

    /// Delete parameter files that fail validation instead of leaving them
    /// on disk untracked.
    ///
    /// Environment variable: `REAP_ORPHANS`
    #[arg(long, env = "REAP_ORPHANS", default_value_t = false)]
    pub reap_orphans: bool,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:5001" or "/tmp/dhpool.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:5001"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Emit logs as JSON lines instead of the human-readable format.
    ///
    /// Environment variable: `LOG_JSON`
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub storage_dir: PathBuf,
    pub size_classes: Vec<SizeClass>,
    pub min_available: usize,
    pub tick: Duration,
    pub watch_interval: Duration,
    pub openssl_bin: PathBuf,
    pub reap_orphans: bool,
    pub server_addr: String,
    pub uds: bool,
    pub log_json: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.size_classes.is_empty() {
            bail!("SIZE_CLASSES must name at least one size class");
        }

        let mut seen = HashSet::with_capacity(args.size_classes.len());
        for &bits in &args.size_classes {
            if bits == 0 {
                bail!("SIZE_CLASSES must not contain 0");
            }
            if !seen.insert(bits) {
                bail!("SIZE_CLASSES lists {bits} more than once");
            }
        }

        if args.tick_ms == 0 {
            bail!("TICK_MS must be greater than 0");
        }

        if args.watch_interval_ms == 0 {
            bail!("WATCH_INTERVAL_MS must be greater than 0");
        }

        Ok(Self {
            storage_dir: args.storage_dir,
            size_classes: args.size_classes.into_iter().map(SizeClass::new).collect(),
            min_available: args.min_available,
            tick: Duration::from_millis(args.tick_ms),
            watch_interval: Duration::from_millis(args.watch_interval_ms),
            openssl_bin: args.openssl_bin,
            reap_orphans: args.reap_orphans,
            server_addr: args.server_addr,
            uds: args.uds,
            log_json: args.log_json,
        })
    }
}
