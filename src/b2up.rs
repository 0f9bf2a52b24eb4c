mod b2;
mod config;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use object_store::ObjectStore;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use b2::{B2Client, UploadOptions, bucket_store, stream_count, upload_file};
use config::Config;

/// Flags the tool has always accepted with a single dash, e.g. `-keyID=...`
const SINGLE_DASH_FLAGS: [&str; 6] = ["keyID", "appID", "bucketName", "src", "dst", "writers"];

#[derive(Parser, Debug)]
#[command(
    name = "b2up",
    version = env!("CARGO_PKG_VERSION"),
    about = "Upload a file or every file in a directory to a Backblaze B2 bucket",
    long_about = "Uploads a single file, or the immediate entries of a directory, to a Backblaze B2 bucket \
                  through its S3-compatible API. Files are uploaded one after another; each file is sent \
                  in parts with up to --writers parts in flight. The first failure aborts the run.",
    after_help = "Examples:\n  \
                  b2up --keyID=K --appID=A --bucketName=backups --src=/tmp/onefile.txt --dst=backup\n  \
                  b2up --keyID=K --appID=A --bucketName=backups --src=/tmp/dir --dst=backup --writers=4\n\n\
                  Configuration (.env):\n  \
                  B2_KEY_ID=...\n  \
                  B2_APP_ID=...\n  \
                  B2_BUCKET=backups\n  \
                  B2_REGION=us-west-004"
)]
pub struct Cli {
    /// B2 key ID
    #[arg(long = "keyID", env = "B2_KEY_ID", default_value = "", hide_env_values = true)]
    key_id: String,

    /// B2 application ID
    #[arg(long = "appID", env = "B2_APP_ID", default_value = "", hide_env_values = true)]
    app_id: String,

    /// B2 bucket name
    #[arg(long = "bucketName", env = "B2_BUCKET", default_value = "")]
    bucket_name: String,

    /// Source (file or folder)
    #[arg(long, env = "B2_SRC", default_value = "")]
    src: String,

    /// Destination prefix inside the bucket
    #[arg(long, env = "B2_DST", default_value = "")]
    dst: String,

    /// Number of concurrent upload streams per file
    #[arg(long, env = "B2_WRITERS", default_value_t = 10, allow_negative_numbers = true)]
    writers: i64,

    /// B2 region, used to derive the endpoint
    #[arg(long, env = "B2_REGION", default_value = "us-west-004")]
    region: String,

    /// S3-compatible endpoint (overrides the one derived from --region)
    #[arg(long, env = "B2_ENDPOINT")]
    endpoint: Option<String>,

    /// Size of each uploaded part in MiB (5 to 5120, grown for very large files)
    #[arg(long, env = "B2_PART_SIZE_MIB", default_value_t = 10)]
    part_size_mib: usize,

    /// Never draw per-file progress bars
    #[arg(long)]
    no_progress: bool,
}

#[derive(Debug, Default, PartialEq)]
struct UploadSummary {
    files: usize,
    bytes: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file early to get LOG_LEVEL and B2_* defaults
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Rewrite `-keyID=...` style flags to the `--keyID=...` form clap expects
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(s) if is_single_dash_flag(s) => OsString::from(format!("-{}", s)),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_flag(arg: &str) -> bool {
    let Some(rest) = arg.strip_prefix('-') else {
        return false;
    };
    if rest.starts_with('-') {
        return false;
    }
    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
    SINGLE_DASH_FLAGS.contains(&name)
}

async fn run(cli: Cli) -> Result<()> {
    let show_progress = !cli.no_progress && console::user_attended_stderr();
    let config = Config::from_cli(cli)?;
    debug!("b2up v{} with {:?}", env!("CARGO_PKG_VERSION"), config);

    let files = source::resolve_sources(&config.src)?;

    let client = B2Client::new(&config).await;
    client.check_bucket(&config.bucket).await?;
    let store = bucket_store(&config)?;

    debug!(
        "Target: b2://{}/{} ({} file(s))",
        config.bucket,
        config.dst,
        files.len()
    );

    upload_all(
        &store,
        &files,
        &config.dst,
        config.writers,
        config.part_size,
        show_progress,
    )
    .await?;

    Ok(())
}

/// Upload `files` one after another, stopping at the first failure
async fn upload_all(
    store: &dyn ObjectStore,
    files: &[PathBuf],
    dst: &str,
    writers: i64,
    part_size: usize,
    show_progress: bool,
) -> Result<UploadSummary> {
    let options = UploadOptions {
        concurrency: stream_count(writers),
        part_size,
    };
    if writers < 1 {
        warn!(
            "writers = {} is not positive, using a single upload stream",
            writers
        );
    }

    let total = files.len();
    let mut summary = UploadSummary::default();

    for (i, file) in files.iter().enumerate() {
        let key = source::object_key(dst, file)?;
        info!("{}", progress_line(i + 1, total, file));

        let pb = show_progress.then(new_progress_bar);
        let result = upload_file(store, file, &key, options, pb.as_ref()).await;
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        let bytes = result.with_context(|| format!("could not upload {}", file.display()))?;
        summary.files += 1;
        summary.bytes += bytes;
    }

    debug!(
        "Uploaded {} file(s), {}",
        summary.files,
        HumanBytes(summary.bytes)
    );
    info!("done");

    Ok(summary)
}

fn progress_line(position: usize, total: usize, file: &Path) -> String {
    format!("[{}/{}] - uploading: {}", position, total, file.display())
}

fn new_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
