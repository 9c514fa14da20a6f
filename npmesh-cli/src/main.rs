//! npmesh CLI
//!
//! Command-line interface for retrieving, checking and publishing nanopubs on
//! the registry federation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use npmesh_core::traits::{FetchListener, NanopubCodec, NanopubSink};
use npmesh_core::{CodecTable, ContentAddress, Nanopub, NpmeshError, DEFAULT_CODEC};
use npmesh_directory::{DirectoryMode, RegistryDirectory};
use npmesh_fetch::{ContentFetcher, FetchConfig, WriterSink};
use npmesh_publish::{PublishConfig, Publisher};
use npmesh_store::DirStore;

/// Registries checked concurrently by `status -r`.
const STATUS_CONCURRENCY: usize = 8;

/// npmesh - client for the nanopublication registry federation
#[derive(Parser)]
#[command(name = "npmesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Serialization codec
    #[arg(long, global = true, default_value = DEFAULT_CODEC, env = "NPMESH_CODEC")]
    codec: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve nanopubs by URI or artifact code
    Get {
        /// Nanopub URIs or artifact codes
        #[arg(required = true)]
        ids: Vec<String>,
        /// Retrieve the index for the given index nanopubs
        #[arg(short, long)]
        index: bool,
        /// Retrieve the content of the given indexes
        #[arg(short, long)]
        content: bool,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write fetch errors into this file
        #[arg(short, long)]
        errors: Option<PathBuf>,
        /// Show a report at the end
        #[arg(short, long)]
        report: bool,
        /// Try this registry before all others, e.g. http://localhost:7880/
        #[arg(short, long, env = "NPMESH_LOCAL_REGISTRY")]
        local: Option<String>,
        /// Directory of locally stored nanopubs, consulted first
        #[arg(long)]
        local_store: Option<PathBuf>,
    },

    /// Publish nanopub files
    Publish {
        /// Nanopub files, one nanopub per file
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Use these registries instead of the directory
        #[arg(short = 'u', long = "url")]
        urls: Vec<String>,
        /// Run all checks without posting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show which registries hold a nanopub
    Status {
        /// Nanopub URI or artifact code
        id: String,
        /// Check the entire content of an index
        #[arg(short, long)]
        recursive: bool,
        /// Check all registries instead of stopping at the first one
        #[arg(short, long)]
        all: bool,
    },

    /// List the registries of the federation
    Registries {
        /// Ignore the peer cache and crawl from the bootstrap list
        #[arg(long)]
        reload: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "npmesh=debug,info" } else { "warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let codecs = CodecTable::default();
    let codec = codecs
        .resolve(&cli.codec)
        .with_context(|| format!("Cannot use codec '{}'", cli.codec))?;

    match cli.command {
        Commands::Get {
            ids,
            index,
            content,
            output,
            errors,
            report,
            local,
            local_store,
        } => {
            let options = GetOptions {
                index,
                content,
                report,
                local,
                local_store,
            };
            cmd_get(&ids, options, output.as_deref(), errors.as_deref(), codec).await
        }
        Commands::Publish { files, urls, dry_run } => {
            cmd_publish(&files, urls, dry_run, &codecs, &cli.codec, codec).await
        }
        Commands::Status { id, recursive, all } => cmd_status(&id, recursive, all, codec).await,
        Commands::Registries { reload } => cmd_registries(reload).await,
    }
}

fn parse_address(id: &str) -> Result<ContentAddress> {
    ContentAddress::parse_rdf(id).with_context(|| format!("Not a nanopub URI or artifact code: {}", id))
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Progress and error reporting for `get`.
struct CliListener {
    bar: ProgressBar,
    errors: Option<Mutex<BufWriter<File>>>,
}

impl CliListener {
    fn log_error(&self, address: &ContentAddress, registry: Option<&str>, message: &str) {
        if let Some(errors) = &self.errors {
            let mut file = errors.lock();
            let _ = writeln!(file, "{}\t{}\t{}", address, registry.unwrap_or("-"), message);
        }
    }
}

impl FetchListener for CliListener {
    fn on_progress(&self, written: u64) {
        self.bar.set_message(format!("Retrieved {}", written));
    }

    fn on_exception(&self, error: &NpmeshError, registry: Option<&str>, address: &ContentAddress) {
        self.log_error(address, registry, &error.to_string());
    }
}

struct GetOptions {
    index: bool,
    content: bool,
    report: bool,
    local: Option<String>,
    local_store: Option<PathBuf>,
}

/// Retrieve nanopubs
async fn cmd_get(
    ids: &[String],
    options: GetOptions,
    output: Option<&Path>,
    errors: Option<&Path>,
    codec: Arc<dyn NanopubCodec>,
) -> Result<()> {
    let addresses = ids.iter().map(|id| parse_address(id)).collect::<Result<Vec<_>>>()?;

    let tree = options.index || options.content;
    let mut config = FetchConfig::new();
    if tree {
        config = config.write(options.index, options.content);
    }
    if let Some(url) = options.local {
        config = config.local_registry(url);
    }

    let directory = Arc::new(RegistryDirectory::from_env());
    let mut fetcher = ContentFetcher::with_config(directory, Arc::clone(&codec), config);
    if let Some(dir) = &options.local_store {
        let store = DirStore::open(dir, Arc::clone(&codec))
            .with_context(|| format!("Failed to open local store {}", dir.display()))?;
        fetcher = fetcher.with_store(Arc::new(store));
    }

    let writer: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };
    let mut sink = WriterSink::new(writer, Arc::clone(&codec));

    let errors = match errors {
        Some(path) => Some(Mutex::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ))),
        None => None,
    };
    let listener = CliListener {
        bar: spinner("Retrieving")?,
        errors,
    };

    let mut failed = Vec::new();
    for address in &addresses {
        if tree {
            let report = fetcher
                .fetch(address, true, &mut sink, &listener)
                .await
                .with_context(|| format!("Failed to retrieve {}", address))?;
            failed.extend(report.failed);
        } else {
            match fetcher.get_nanopub(address).await? {
                Some(nanopub) => {
                    sink.write(&nanopub).context("Failed to write output")?;
                    listener.on_progress(sink.written());
                }
                None => {
                    listener.log_error(address, None, "not found");
                    failed.push(address.clone());
                }
            }
        }
    }

    let written = sink.written();
    sink.into_inner().context("Failed to flush output")?;
    if let Some(errors) = &listener.errors {
        errors.lock().flush().context("Failed to flush error file")?;
    }
    listener.bar.finish_and_clear();

    for address in &failed {
        eprintln!("{} {}", "✗ Not retrieved:".red(), address);
    }

    if options.report {
        eprintln!("\n{}", "Report:".yellow().bold());
        eprintln!("   {} {}", "Retrieved:".dimmed(), written);
        eprintln!("   {} {}", "Failed:".dimmed(), failed.len());
        print_usage(&fetcher.usage());
    }

    if !failed.is_empty() {
        anyhow::bail!("{} nanopub(s) could not be retrieved", failed.len());
    }
    Ok(())
}

fn print_usage(usage: &HashMap<String, u64>) {
    let mut rows: Vec<_> = usage.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (registry, count) in rows {
        eprintln!("   {:>6}  {}", count, registry);
    }
}

/// Publish nanopub files
async fn cmd_publish(
    files: &[PathBuf],
    urls: Vec<String>,
    dry_run: bool,
    codecs: &CodecTable,
    codec_name: &str,
    codec: Arc<dyn NanopubCodec>,
) -> Result<()> {
    let nanopubs = files
        .iter()
        .map(|path| {
            let body = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let file_codec = codecs.resolve_for_file(path, codec_name)?;
            let np = Nanopub::decode(file_codec.as_ref(), Bytes::from(body))
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            // Posted bodies must match the Content-Type of the publishing codec
            if file_codec.format() == codec.format() {
                Ok(np)
            } else {
                Ok(Nanopub::from_quads(codec.as_ref(), np.quads().to_vec())?)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let mut config = PublishConfig::new();
    if !urls.is_empty() {
        config = config.registries(urls);
    }
    if dry_run {
        println!("{}", "Dry run: nothing will be posted".yellow());
        config = config.dry_run();
    }

    let directory = Arc::new(RegistryDirectory::from_env());
    let mut publisher = Publisher::with_config(directory, codec, config);

    let pb = ProgressBar::new(nanopubs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );
    let bar = pb.clone();

    let receipts = match publisher
        .publish_batch(&nanopubs, Some(Box::new(move |n| bar.set_position(n as u64))))
        .await
    {
        Ok(receipts) => receipts,
        Err(e) => {
            pb.abandon();
            let published: u64 = publisher.usage().values().sum();
            eprintln!("{} {} nanopub(s) published before the failure", "✗".red(), published);
            return Err(e).context("Publication stopped");
        }
    };
    pb.finish_and_clear();

    for receipt in &receipts {
        if receipt.dry_run {
            println!("{} {}", "Would publish:".yellow(), receipt.nanopub_url);
        } else {
            println!("{} {}", "✅ Published:".green(), receipt.nanopub_url);
        }
    }

    if !dry_run {
        println!("\n{} {}", "Published nanopubs:".cyan().bold(), receipts.len());
        print_usage(publisher.usage());
    }
    Ok(())
}

/// Collects an index and everything it references.
async fn index_tree(fetcher: &ContentFetcher, root: &ContentAddress) -> Result<Vec<ContentAddress>> {
    let mut seen = HashSet::new();
    let mut tree = Vec::new();
    let mut queue = VecDeque::from([root.clone()]);

    while let Some(address) = queue.pop_front() {
        if !seen.insert(address.clone()) {
            continue;
        }
        tree.push(address.clone());

        let Some(nanopub) = fetcher.get_nanopub(&address).await? else {
            continue;
        };
        if let Some(index) = nanopub.index() {
            for element in &index.elements {
                if seen.insert(element.clone()) {
                    tree.push(element.clone());
                }
            }
            queue.extend(index.sub_indexes.iter().cloned());
            queue.extend(index.appended_index.iter().cloned());
        }
    }
    Ok(tree)
}

/// Show which registries hold a nanopub
async fn cmd_status(id: &str, recursive: bool, all: bool, codec: Arc<dyn NanopubCodec>) -> Result<()> {
    let address = parse_address(id)?;
    let directory = Arc::new(RegistryDirectory::from_env());
    let fetcher = ContentFetcher::new(directory, codec);

    let targets = if recursive {
        let pb = spinner("Walking index")?;
        let tree = index_tree(&fetcher, &address).await?;
        pb.finish_and_clear();
        tree
    } else {
        vec![address]
    };

    let fetcher = &fetcher;
    let results: Vec<_> = stream::iter(targets)
        .map(|address| async move {
            let holders = fetcher.check_status(&address, all).await;
            (address, holders)
        })
        .buffered(STATUS_CONCURRENCY)
        .collect()
        .await;

    let mut missing = 0usize;
    for (address, holders) in results {
        let holders = holders.with_context(|| format!("Failed to check {}", address))?;
        if holders.is_empty() {
            missing += 1;
            println!("{} {}", "✗ Not found:".red(), address);
            continue;
        }
        println!("{} {} ({} registries)", "✅ Found:".green(), address, holders.len());
        for registry in holders {
            println!("   {}", registry.dimmed());
        }
    }

    if missing > 0 {
        anyhow::bail!("{} nanopub(s) not found on any registry", missing);
    }
    Ok(())
}

/// List the registries of the federation
async fn cmd_registries(reload: bool) -> Result<()> {
    let directory = RegistryDirectory::from_env();
    let mode = match directory.default_mode() {
        DirectoryMode::Default if reload => DirectoryMode::ForceReload,
        mode => mode,
    };

    let pb = spinner("Crawling registries")?;
    let registries = directory.collect(mode).await;
    pb.finish_and_clear();

    println!("{} {}", "🌐 Registries:".cyan().bold(), registries.len());
    for registry in &registries {
        println!("\n   {}", registry.public_url.bold());
        println!(
            "   {} {}",
            "Protocol:".dimmed(),
            registry.protocol_version.as_deref().unwrap_or("-")
        );
        println!(
            "   {} {}",
            "Accepts nanopubs:".dimmed(),
            if registry.post_nanopubs_enabled { "yes".green() } else { "no".red() }
        );
        if let Some(pattern) = &registry.uri_pattern {
            println!("   {} {}", "URI pattern:".dimmed(), pattern);
        }
        if let Some(pattern) = &registry.hash_pattern {
            println!("   {} {}", "Hash pattern:".dimmed(), pattern);
        }
        if let Some(description) = &registry.description {
            println!("   {} {}", "Description:".dimmed(), description);
        }
    }
    Ok(())
}
