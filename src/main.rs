//! # NanoImage 命令行入口
//!
//! 本文件只负责参数解析、配置合并与结果输出，流程逻辑见 `client` 模块。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use nano_image_client::image_prep::{ImagePreprocessor, PrepProfile, SourceImage};
use nano_image_client::job::{FEATURES, HttpJobApi, JobApi, find_feature};
use nano_image_client::present::{self, ConsoleObserver};
use nano_image_client::{AppError, ClientConfig, JobClient};

#[derive(Parser)]
#[command(name = "nano-image")]
#[command(about = "Submit images to a NanoImage server and watch the jobs", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL (overrides config and NANO_IMAGE_SERVER)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess an image, submit a job and poll until it ends
    Run {
        /// Feature type, see `features`
        #[arg(short, long)]
        feature: String,
        /// Image file to upload
        #[arg(long)]
        file: PathBuf,
        /// Parameters as a JSON object
        #[arg(short, long, default_value = "")]
        params: String,
        /// Preprocessing profile: quality, balanced or speed
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        max_dim: Option<u32>,
        /// JPEG quality in (0, 1]
        #[arg(long)]
        quality: Option<f32>,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        max_attempts: Option<u32>,
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Download results into this directory
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
    /// Query a job once
    Status {
        job_id: String,
    },
    /// Check that the server is up
    Health,
    /// List known feature types
    Features,
}

struct RunArgs {
    feature: String,
    file: PathBuf,
    params: String,
    download_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ [{}] {}", err.code(), err);
            eprintln!("❌ [{}] {}", err.code(), err);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<(), AppError> {
    let config = ClientConfig::load(cli.config.as_deref())?.with_server_override(cli.server);

    match cli.command {
        Commands::Run {
            feature,
            file,
            params,
            profile,
            max_dim,
            quality,
            interval_ms,
            max_attempts,
            timeout_secs,
            download_dir,
        } => {
            let mut config = config;
            if let Some(profile) = profile {
                let profile =
                    PrepProfile::parse(&profile).map_err(|e| AppError::Config(e.to_string()))?;
                config.prep.apply_profile(profile);
            }
            if let Some(max_dim) = max_dim {
                config.prep.max_dim = max_dim;
            }
            if let Some(quality) = quality {
                config.prep.quality = quality;
            }
            if let Some(interval_ms) = interval_ms {
                config.poll.interval_ms = interval_ms;
            }
            if max_attempts.is_some() {
                config.poll.max_attempts = max_attempts;
            }
            if timeout_secs.is_some() {
                config.poll.timeout_secs = timeout_secs;
            }

            let args = RunArgs {
                feature,
                file,
                params,
                download_dir,
            };
            run_job(config, args).await
        }
        Commands::Status { job_id } => {
            config.validate()?;
            let (api, client) = build_client(&config)?;
            let status = client.query_once(&job_id).await?;
            println!("{}", present::render_status(&job_id, &status));
            for result in &status.results {
                println!("  url: {}", present::resolve_result_url(api.base_url(), result)?);
            }
            Ok(())
        }
        Commands::Health => {
            config.validate()?;
            let api = HttpJobApi::new(&config.server)?;
            api.health().await?;
            println!("✅ 服务端正常：{}", api.base_url());
            Ok(())
        }
        Commands::Features => {
            for feature in FEATURES {
                println!("{:<18} {}  params: {}", feature.id, feature.title, feature.params_hint);
            }
            Ok(())
        }
    }
}

fn build_client(config: &ClientConfig) -> Result<(Arc<HttpJobApi>, JobClient), AppError> {
    let api = Arc::new(HttpJobApi::new(&config.server)?);
    let preprocessor = ImagePreprocessor::new(config.prep.clone())?;
    let client = JobClient::new(
        Arc::clone(&api) as Arc<dyn JobApi>,
        preprocessor,
        config.poll.clone(),
    )?;
    Ok((api, client))
}

async fn run_job(config: ClientConfig, args: RunArgs) -> Result<(), AppError> {
    config.validate()?;

    if find_feature(&args.feature).is_none() {
        log::warn!("⚠️ 未知的功能类型 {}，仍按原样提交", args.feature);
    }

    let source = SourceImage::load(&args.file, config.prep.max_file_size)?;
    let (api, client) = build_client(&config)?;

    let submitted = client
        .submit(&args.feature, &args.params, source, Arc::new(ConsoleObserver))
        .await?;

    println!("🆔 job_id: {}", submitted.job());
    if let Some((before, after)) = submitted.size_reduction() {
        println!(
            "📉 已压缩：{:.1} KB → {:.1} KB",
            before as f64 / 1024.0,
            after as f64 / 1024.0
        );
    }
    if let Some(reason) = &submitted.degraded {
        println!("⚠️ 预处理未生效，已上传原图：{}", reason);
    }

    let canceller = submitted.poll.canceller();
    let join = submitted.poll.join();
    tokio::pin!(join);

    let outcome = tokio::select! {
        outcome = &mut join => outcome,
        Ok(()) = tokio::signal::ctrl_c() => {
            canceller.cancel();
            join.await
        }
    };

    let results = outcome.into_result()?;

    match args.download_dir {
        Some(dir) => {
            let saved =
                present::download_results(api.client(), api.base_url(), &results, &dir).await?;
            for path in saved {
                println!("💾 {}", path.display());
            }
        }
        None => {
            for result in &results {
                println!("🔗 {}", present::resolve_result_url(api.base_url(), result)?);
            }
        }
    }

    Ok(())
}
