mod logging;
mod output;

use anyhow::{Context, Result};
use castree_core::{
    Algorithm, ContentId, DirectoryRecord, FileEntry, MemoryStore, ObjectType, Persist,
    Persisted, Store, flush_tree,
};
use clap::{ArgAction, Parser, Subcommand};
use output::{
    BlobStatInfo, DirectoryStatInfo, FlushOutput, InitOutput, LinkInfo, LsOutput, OutputWriter,
    StatData, StatOutput, record_line,
};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;

/// Exit code for failures caused by a broken internal invariant.
const INTERNAL_FAULT: u8 = 2;

/// Castree - build content-addressed directory trees
#[derive(Parser)]
#[command(name = "castree")]
#[command(about = "Build content-addressed directory trees from stored files", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory (defaults to CASTREE_ROOT env var or ./castree-store)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new store
    Init {
        /// Hash algorithm to use
        #[arg(long, default_value = "blake3")]
        algo: String,
    },

    /// Store a file or directory and build its directory tree
    Add {
        /// Path to add
        path: PathBuf,
    },

    /// Build a directory tree from a manifest of already stored files
    Import {
        /// Newline-delimited JSON file entries ({"path", "size", "cid"}), or - for stdin
        manifest: PathBuf,

        /// Compute ids in memory without writing directory objects
        #[arg(long)]
        dry_run: bool,
    },

    /// List the links of a directory
    Ls {
        /// Content id of the directory
        cid: String,

        /// Show sizes and content ids
        #[arg(short, long)]
        long: bool,
    },

    /// Show object metadata
    Stat {
        /// Content id of the object
        cid: String,
    },

    /// Output blob content to stdout
    Cat {
        /// Content id of the blob
        cid: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let out = OutputWriter::new(cli.json);

    // Determine store root: CLI arg > CASTREE_ROOT env var > ./castree-store default
    let root = cli
        .root
        .or_else(|| std::env::var("CASTREE_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./castree-store"));
    tracing::debug!(root = %root.display(), "resolved store root");

    let result = match cli.command {
        Commands::Init { algo } => cmd_init(&root, &algo, &out),
        Commands::Add { path } => cmd_add(&root, &path, &out).await,
        Commands::Import { manifest, dry_run } => {
            cmd_import(&root, &manifest, dry_run, &out).await
        }
        Commands::Ls { cid, long } => cmd_ls(&root, &cid, long, &out),
        Commands::Stat { cid } => cmd_stat(&root, &cid, &out),
        Commands::Cat { cid } => cmd_cat(&root, &cid),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = result_code(&err);
            if code == INTERNAL_FAULT {
                tracing::error!(error = %format!("{:#}", err), "internal fault");
            }
            out.write_error(&err, code);
            ExitCode::from(code)
        }
    }
}

/// Result code for a failed command: `INTERNAL_FAULT` when any cause is an
/// internal castree error, `1` otherwise.
fn result_code(err: &anyhow::Error) -> u8 {
    let internal = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<castree_core::Error>())
        .any(castree_core::Error::is_internal);
    if internal { INTERNAL_FAULT } else { 1 }
}

fn open_store(root: &Path) -> Result<Store> {
    Store::open(root).with_context(|| format!("Failed to open store at {}", root.display()))
}

fn parse_cid(cid: &str) -> Result<ContentId> {
    ContentId::from_hex(cid).with_context(|| format!("Invalid content id: {}", cid))
}

fn cmd_init(root: &Path, algo: &str, out: &OutputWriter) -> Result<()> {
    let algorithm = match algo {
        "blake3" => Algorithm::Blake3,
        _ => anyhow::bail!("Unsupported algorithm: {}", algo),
    };

    Store::init(root, algorithm)
        .with_context(|| format!("Failed to initialize store at {}", root.display()))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        algorithm: algorithm.as_str().to_string(),
    };
    out.write(&data, || {
        format!(
            "Initialized castree store at {}\nAlgorithm: {}\n",
            root.display(),
            algorithm.as_str()
        )
    })
}

async fn cmd_add(root: &Path, path: &Path, out: &OutputWriter) -> Result<()> {
    let store = open_store(root)?;

    let entries = store
        .collect_entries(path)
        .with_context(|| format!("Failed to store files under {}", path.display()))?;

    flush_and_report(&store, &entries, &path.display().to_string(), false, out).await
}

async fn cmd_import(root: &Path, manifest: &Path, dry_run: bool, out: &OutputWriter) -> Result<()> {
    let entries = read_manifest(manifest)?;
    let source = manifest.display().to_string();

    if dry_run {
        let memory = MemoryStore::new();
        flush_and_report(&memory, &entries, &source, true, out).await
    } else {
        let store = open_store(root)?;
        flush_and_report(&store, &entries, &source, false, out).await
    }
}

/// Read newline-delimited JSON file entries from a file or, for `-`, stdin.
fn read_manifest(manifest: &Path) -> Result<Vec<FileEntry>> {
    let reader: Box<dyn BufRead> = if manifest == Path::new("-") {
        if atty::is(atty::Stream::Stdin) {
            anyhow::bail!("Refusing to read a manifest from an interactive terminal");
        }
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(manifest)
            .with_context(|| format!("Failed to open manifest {}", manifest.display()))?;
        Box::new(BufReader::new(file))
    };

    parse_manifest(reader)
}

fn parse_manifest<R: BufRead>(reader: R) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read manifest line {}", number + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: FileEntry = serde_json::from_str(line)
            .with_context(|| format!("Invalid file entry on manifest line {}", number + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Flush `entries` through `persist`, printing directory records as they
/// are produced and the root at the end.
async fn flush_and_report<P: Persist>(
    persist: &P,
    entries: &[FileEntry],
    source: &str,
    dry_run: bool,
    out: &OutputWriter,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DirectoryRecord>();

    let flush = async move {
        let result = flush_tree(entries, persist, &tx).await;
        drop(tx);
        result
    };

    let report = async {
        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            out.progress(|| record_line(&record))?;
            records.push(record);
        }
        Ok::<_, anyhow::Error>(records)
    };

    let (flushed, reported) = tokio::join!(flush, report);
    let root = flushed.with_context(|| format!("Failed to build directory tree for {}", source))?;
    let directories = reported?;

    let data = FlushOutput {
        success: true,
        result_code: 0,
        source: source.to_string(),
        files: entries.len(),
        dry_run,
        root,
        directories,
    };
    out.write(&data, || match root {
        Some(cid) => format!("{} {}\n", cid, source),
        None => format!("No directories to build ({} files)\n", entries.len()),
    })
}

fn cmd_ls(root: &Path, cid_str: &str, long: bool, out: &OutputWriter) -> Result<()> {
    let store = open_store(root)?;
    let cid = parse_cid(cid_str)?;

    let directory = store
        .get_directory(&cid)
        .with_context(|| format!("Failed to read directory {}", cid))?;

    let links: Vec<LinkInfo> = directory
        .into_links()
        .into_iter()
        .map(|link| LinkInfo {
            name: link.name,
            size: link.size,
            cid: link.cid,
        })
        .collect();

    let text = links
        .iter()
        .map(|link| {
            if long {
                format!("{} {:>12} {}\n", link.cid, link.size, link.name)
            } else {
                format!("{}\n", link.name)
            }
        })
        .collect::<String>();

    let data = LsOutput {
        success: true,
        result_code: 0,
        cid,
        links,
    };
    out.write(&data, || text)
}

fn cmd_stat(root: &Path, cid_str: &str, out: &OutputWriter) -> Result<()> {
    let store = open_store(root)?;
    let cid = parse_cid(cid_str)?;

    let header = store
        .read_header(&cid)
        .with_context(|| format!("Failed to read object {}", cid))?;
    let obj_path = store.object_path(&cid);
    let size_on_disk = std::fs::metadata(&obj_path)
        .with_context(|| "Failed to read object metadata")?
        .len();

    let data = match header.object_type {
        ObjectType::Directory => {
            let directory = store
                .get_directory(&cid)
                .with_context(|| format!("Failed to read directory {}", cid))?;
            StatData::Directory(DirectoryStatInfo {
                cid,
                link_count: directory.links().len(),
                cumulative_size: Persisted::seal(&directory)
                    .with_context(|| format!("Failed to measure directory {}", cid))?
                    .0
                    .size,
                size_on_disk,
                path: obj_path.display().to_string(),
            })
        }
        ObjectType::Blob => StatData::Blob(BlobStatInfo {
            cid,
            size: header.payload_len,
            size_on_disk,
            path: obj_path.display().to_string(),
        }),
    };

    let text = match &data {
        StatData::Directory(info) => format!(
            "Content id: {}\nType: directory\nLinks: {}\nCumulative size: {} bytes\nSize (on disk): {} bytes\nPath: {}\n",
            info.cid, info.link_count, info.cumulative_size, info.size_on_disk, info.path
        ),
        StatData::Blob(info) => format!(
            "Content id: {}\nType: blob\nSize: {} bytes\nSize (on disk): {} bytes\nPath: {}\n",
            info.cid, info.size, info.size_on_disk, info.path
        ),
    };

    out.write(
        &StatOutput {
            success: true,
            result_code: 0,
            data,
        },
        || text,
    )
}

fn cmd_cat(root: &Path, cid_str: &str) -> Result<()> {
    let store = open_store(root)?;
    let cid = parse_cid(cid_str)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    store
        .blob_to_writer(&cid, &mut handle)
        .with_context(|| format!("Failed to output blob {}", cid))?;

    Ok(())
}
