use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use doodle::stylize::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use doodle::{
    ComposeOpts, CompositionSettings, ExtractedFrame, ExtractorOpts, FrameExtractor, ImageRef,
    Pacing, PollOpts, StylizeClient, StylizeConfig, TaskState, VideoAsset,
};

#[derive(Parser, Debug)]
#[command(name = "doodle", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture the first frame of a video as a JPEG and print its metadata.
    Extract(ExtractArgs),
    /// Stylize an image through the remote provider.
    Stylize(StylizeArgs),
    /// Compose a cover image with a video (requires `ffmpeg` on PATH).
    Compose(ComposeArgs),
    /// Extract, stylize and compose in one go.
    Pipeline(PipelineArgs),
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output JPEG path.
    #[arg(long)]
    out: PathBuf,

    /// Give up if the video does not load within this many seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
struct ProviderArgs {
    /// Provider bearer token.
    #[arg(long, env = "STYLIZE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Provider API root.
    #[arg(long, env = "STYLIZE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Provider model path.
    #[arg(long, env = "STYLIZE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Polls before giving up.
    #[arg(long, default_value_t = 60)]
    max_attempts: u32,

    /// Milliseconds between polls.
    #[arg(long, default_value_t = 3000)]
    interval_ms: u64,
}

impl ProviderArgs {
    fn client(&self) -> StylizeClient {
        StylizeClient::new(StylizeConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            ..StylizeConfig::new(self.api_key.clone())
        })
    }

    fn poll_opts(&self) -> PollOpts {
        PollOpts {
            max_attempts: self.max_attempts,
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

#[derive(Parser, Debug)]
struct StylizeArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Where to write the stylized image.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
struct TimingArgs {
    /// Seconds the cover is held before the footage starts.
    #[arg(long, default_value_t = 1.5)]
    hold: f64,

    /// Seconds of cover-to-footage crossfade.
    #[arg(long, default_value_t = 0.5)]
    transition: f64,

    /// Output frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Encode as fast as possible instead of in real time.
    #[arg(long, default_value_t = false)]
    unpaced: bool,
}

impl TimingArgs {
    fn compose_opts(&self) -> ComposeOpts {
        ComposeOpts {
            settings: CompositionSettings {
                cover_hold_secs: self.hold,
                transition_secs: self.transition,
                target_fps: self.fps,
            },
            pacing: if self.unpaced {
                Pacing::Unpaced
            } else {
                Pacing::Realtime
            },
            ..ComposeOpts::default()
        }
    }
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Cover image.
    #[arg(long)]
    cover: PathBuf,

    /// Output path; its extension is replaced by the produced container's.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    timing: TimingArgs,
}

#[derive(Parser, Debug)]
struct PipelineArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory receiving `frame.jpg`, `cover.*` and `doodle.*`.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,

    #[command(flatten)]
    timing: TimingArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doodle=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Extract(args) => cmd_extract(args),
        Command::Stylize(args) => cmd_stylize(args),
        Command::Compose(args) => cmd_compose(args),
        Command::Pipeline(args) => cmd_pipeline(args),
    }
}

fn cmd_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let asset = VideoAsset::from_path(&args.in_path)?;
    let frame = extract(&asset, Duration::from_secs(args.timeout_secs))?;
    write_file(&args.out, &frame.image)?;
    println!("{}", serde_json::to_string_pretty(&frame.metadata)?);
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_stylize(args: StylizeArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let image = ImageRef::Bytes {
        mime_type: image_mime(&args.in_path).to_string(),
        bytes,
    };
    let (cover, result_url) = runtime()?.block_on(stylize(&args.provider, &image))?;
    write_file(&args.out, &cover)?;
    eprintln!("stylized {result_url}");
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let asset = VideoAsset::from_path(&args.in_path)?;
    let cover = std::fs::read(&args.cover)
        .with_context(|| format!("read cover '{}'", args.cover.display()))?;
    let out = compose(&asset, &cover, &args.timing, &args.out)?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_pipeline(args: PipelineArgs) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let asset = VideoAsset::from_path(&args.in_path)?;
    let frame = extract(&asset, Duration::from_secs(10))?;
    let frame_path = args.out_dir.join("frame.jpg");
    write_file(&frame_path, &frame.image)?;
    eprintln!(
        "[1/3] extracted {}x{} ({}) to {}",
        frame.metadata.width,
        frame.metadata.height,
        frame.metadata.aspect_ratio,
        frame_path.display()
    );

    let image = ImageRef::Bytes {
        mime_type: frame.mime_type.to_string(),
        bytes: frame.image.clone(),
    };
    let (cover, result_url) = runtime()?.block_on(stylize(&args.provider, &image))?;
    let cover_path = args
        .out_dir
        .join(format!("cover.{}", url_extension(&result_url)));
    write_file(&cover_path, &cover)?;
    eprintln!("[2/3] stylized cover to {}", cover_path.display());

    let out = compose(&asset, &cover, &args.timing, &args.out_dir.join("doodle"))?;
    eprintln!("[3/3] wrote {}", out.display());
    Ok(())
}

fn extract(asset: &VideoAsset, load_timeout: Duration) -> anyhow::Result<ExtractedFrame> {
    let opts = ExtractorOpts {
        load_timeout,
        ..ExtractorOpts::default()
    };
    Ok(FrameExtractor::new(opts).extract(asset)?)
}

async fn stylize(provider: &ProviderArgs, image: &ImageRef) -> anyhow::Result<(Vec<u8>, String)> {
    let task = provider
        .client()
        .stylize(image, provider.poll_opts())
        .await?;
    let url = match (task.state, task.result_url) {
        (TaskState::Completed, Some(url)) => url,
        _ => anyhow::bail!(
            "stylization {} failed: {}",
            task.request_id,
            task.error_detail.as_deref().unwrap_or("no result")
        ),
    };
    let cover = doodle::fetch_cover(&reqwest::Client::new(), &url).await?;
    Ok((cover, url))
}

fn compose(
    asset: &VideoAsset,
    cover: &[u8],
    timing: &TimingArgs,
    out: &Path,
) -> anyhow::Result<PathBuf> {
    let opts = timing.compose_opts();
    let mut next_report = 0.0;
    let video = doodle::compose(asset, cover, &opts, &mut |pct| {
        if pct >= next_report {
            eprint!("\rcomposing {pct:5.1}%");
            next_report = pct + 5.0;
        }
    })?;
    eprintln!();

    let out = out.with_extension(&video.container_extension);
    write_file(&out, &video.bytes)?;
    Ok(out)
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn url_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).as_deref() {
        Some("jpg" | "jpeg") => "jpg",
        Some("webp") => "webp",
        _ => "png",
    }
}
