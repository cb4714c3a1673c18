use clap::{Parser, ValueEnum};
use imgsim_api::{QueryService, RestApi, ServerConfig};
use imgsim_vision::{NormalizationParams, Pipeline, PreprocessConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Normalization {
    /// RGB scaled to [0, 1], ImageNet mean/std
    Imagenet,
    /// BGR 0..255, ImageNet mean pixel subtracted
    Caffe,
}

/// Content-based image retrieval server
#[derive(Parser, Debug)]
#[command(name = "imgsim")]
#[command(about = "Rank a reference image collection by similarity to an uploaded image", long_about = None)]
struct Args {
    /// Root of the reference collection
    #[arg(short, long, default_value = "./dataset")]
    dataset_dir: PathBuf,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP API port
    #[arg(long, default_value_t = 8000)]
    http_port: u16,

    /// Matches returned per query
    #[arg(long, default_value_t = imgsim_api::DEFAULT_TOP_K)]
    top_k: usize,

    /// Square input size for the extractor
    #[arg(long, default_value_t = imgsim_vision::DEFAULT_IMAGE_SIZE)]
    image_size: u32,

    /// Pixel normalization preset
    #[arg(long, value_enum, default_value_t = Normalization::Imagenet)]
    normalization: Normalization,

    /// Per-query limit on decode + feature extraction
    #[arg(long, default_value_t = 10_000)]
    query_timeout_ms: u64,

    /// Largest accepted upload
    #[arg(long, default_value_t = 20 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting imgsim v{}", env!("CARGO_PKG_VERSION"));
    info!("Dataset directory: {:?}", args.dataset_dir);

    let normalization = match args.normalization {
        Normalization::Imagenet => NormalizationParams::imagenet(),
        Normalization::Caffe => NormalizationParams::caffe(),
    };
    let pipeline = Pipeline::from_config(PreprocessConfig {
        image_size: args.image_size,
        normalization,
    })?;

    let config = ServerConfig {
        dataset_dir: args.dataset_dir,
        host: args.host,
        http_port: args.http_port,
        top_k: args.top_k,
        query_timeout: Duration::from_millis(args.query_timeout_ms),
        max_upload_bytes: args.max_upload_bytes,
    };

    // Index is complete before the server accepts anything
    let build_config = config.clone();
    let service = tokio::task::spawn_blocking(move || QueryService::bootstrap(&build_config, pipeline))
        .await??;
    let service = Arc::new(service);

    let http_handle = std::thread::spawn(move || {
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(service, &config).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
