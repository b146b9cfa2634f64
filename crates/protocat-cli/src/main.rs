//! protocat CLI
//!
//! - `serve`: load a descriptor set once and expose it over HTTP
//! - `resolve`: explain what a source-location path points at
//! - `comments`: dump the comment table

use std::io::Write as _;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use protocat_catalog::{Catalog, CatalogOptions, PathResolver, SnapshotFormat, Strictness};

mod cors;
mod server;

#[derive(Parser)]
#[command(name = "protocat")]
#[command(
    author,
    version,
    about = "protocat: read-only catalog over a compiled protobuf schema"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve messages, services and their comments over HTTP.
    ///
    /// Routes:
    /// - `/messages/{name}`, `/services/{name}`: definitions as protobuf JSON
    /// - `/comments/{name}`: `{"text": ...}` (empty when undocumented)
    /// - `/settings`: service names, gateway URL and the raw descriptor set
    /// - `/healthz`, `/status`
    Serve(ServeArgs),

    /// Resolve one source-location path and print the result as JSON.
    Resolve {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        /// File name inside the descriptor set (as recorded by the compiler).
        #[arg(long)]
        file: String,
        /// Comma-separated path, e.g. `4,0,2,1`.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        path: Vec<i32>,
    },

    /// Print every recorded leading comment as a JSON object.
    Comments {
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct SnapshotArgs {
    /// Descriptor set to load (`protoc --descriptor_set_out` or `buf build -o`).
    #[arg(long, env = "PROTOCAT_DESCRIPTOR", default_value = "./api_descriptor.pb")]
    descriptor: PathBuf,

    /// Snapshot encoding.
    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    format: FormatArg,

    /// Fail on source locations the resolver does not understand instead of
    /// recording them under a `path:[...]` fallback name.
    #[arg(long)]
    strict: bool,
}

impl SnapshotArgs {
    fn options(&self) -> CatalogOptions {
        CatalogOptions {
            format: self.format.into(),
            strictness: if self.strict {
                Strictness::Strict
            } else {
                Strictness::Lenient
            },
        }
    }

    fn load(&self) -> Result<Catalog> {
        load_catalog(&self.descriptor, self.options())
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Auto,
    Binary,
    Json,
}

impl From<FormatArg> for SnapshotFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Auto => SnapshotFormat::Auto,
            FormatArg::Binary => SnapshotFormat::Binary,
            FormatArg::Json => SnapshotFormat::Json,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    /// Interface to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Port to listen on (`0` picks a free port).
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Gateway URL advertised to clients in `/settings`.
    #[arg(long, default_value = "localhost:8080")]
    gateway_url: String,

    /// Cross-origin requests are allowed from origins whose host starts with
    /// this prefix.
    #[arg(long, default_value = "localhost")]
    cors_host_prefix: String,

    /// If set, write a small JSON file once the server is listening.
    ///
    /// Useful for scripts/tests to learn the chosen port when `--port 0`.
    #[arg(long)]
    ready_file: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => cmd_serve(args),
        Commands::Resolve {
            snapshot,
            file,
            path,
        } => cmd_resolve(&snapshot, &file, &path),
        Commands::Comments { snapshot } => cmd_comments(&snapshot),
    }
}

fn load_catalog(path: &Path, options: CatalogOptions) -> Result<Catalog> {
    Catalog::load(path, options)
        .with_context(|| format!("failed to load schema catalog from `{}`", path.display()))
}

fn cmd_serve(args: ServeArgs) -> Result<()> {
    let config = server::ServerConfig {
        listen: SocketAddr::new(args.host, args.port),
        descriptor: args.snapshot.descriptor.clone(),
        options: args.snapshot.options(),
        gateway_url: args.gateway_url,
        cors: cors::CorsPolicy::new(args.cors_host_prefix),
        ready_file: args.ready_file,
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    rt.block_on(server::serve(config))
}

fn cmd_resolve(snapshot: &SnapshotArgs, file_name: &str, path: &[i32]) -> Result<()> {
    let catalog = snapshot.load()?;
    let file = catalog
        .snapshot()
        .descriptor_set()
        .file
        .iter()
        .find(|f| f.name() == file_name)
        .ok_or_else(|| anyhow!("no file named `{file_name}` in the descriptor set"))?;

    let resolved = PathResolver::new(snapshot.options().strictness).resolve(file, path)?;
    let report = serde_json::json!({
        "file": file_name,
        "path": path,
        "name": resolved.qualified_name(),
        "components": resolved.components,
        "kind": resolved.kind,
        "unresolved": resolved.unresolved(),
        "comment": catalog.comment(&resolved.qualified_name()),
    });
    print_json(&report)
}

fn cmd_comments(snapshot: &SnapshotArgs) -> Result<()> {
    let catalog = snapshot.load()?;
    let table: serde_json::Map<String, serde_json::Value> = catalog
        .comments()
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    print_json(&table)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
