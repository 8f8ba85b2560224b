use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mimi", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the resting face, optionally with the mouth shape active at a given time.
    Frame(FrameArgs),
    /// Play a recorded utterance in real time and write periodic PNG snapshots.
    Speak(SpeakArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Sprite directory.
    #[arg(long)]
    assets: PathBuf,

    /// Viseme frames JSON (`[{"id": .., "offset": ..}]`).
    #[arg(long, requires = "at_ms")]
    visemes: Option<PathBuf>,

    /// Audio time in milliseconds used to select the mouth shape.
    #[arg(long, requires = "visemes")]
    at_ms: Option<f64>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SpeakArgs {
    /// Sprite directory.
    #[arg(long)]
    assets: PathBuf,

    /// Directory holding `<id>.wav` and `<id>.json`.
    #[arg(long)]
    utterances: PathBuf,

    /// Utterance id.
    #[arg(long)]
    id: String,

    /// Voice identifier.
    #[arg(long, default_value = "en-US-JennyNeural")]
    voice: String,

    /// Expressive style.
    #[arg(long, default_value = "cheerful")]
    style: String,

    /// Phrase text.
    #[arg(long, default_value = "recorded utterance")]
    phrase: String,

    /// Rate offset in percent, -100..100. Zero suppresses playback.
    #[arg(long, allow_hyphen_values = true)]
    rate: String,

    /// Pitch offset in percent, -100..100. Zero suppresses playback.
    #[arg(long, allow_hyphen_values = true)]
    pitch: String,

    /// Snapshot directory.
    #[arg(long)]
    out_dir: PathBuf,

    /// Milliseconds between snapshots.
    #[arg(long, default_value_t = 100)]
    snapshot_ms: u64,

    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    match cli.cmd {
        Command::Frame(args) => rt.block_on(cmd_frame(args)),
        Command::Speak(args) => rt.block_on(cmd_speak(args)),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<mimi::AvatarConfig> {
    match path {
        Some(p) => Ok(mimi::AvatarConfig::from_json_file(p)?),
        None => Ok(mimi::AvatarConfig::default()),
    }
}

fn read_visemes(path: &Path) -> anyhow::Result<mimi::VisemeSequence> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("open visemes '{}'", path.display()))?;
    let frames: Vec<mimi::RecordedFrame> =
        serde_json::from_str(&text).with_context(|| "parse visemes JSON")?;
    let events = frames
        .iter()
        .map(|f| mimi::VisemeEvent::new(f.offset, f.id))
        .collect::<mimi::MimiResult<Vec<_>>>()?;
    Ok(mimi::VisemeSequence::from_unordered(events))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

async fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    config.validate()?;

    let cache = mimi::SpriteCache::new(Arc::new(mimi::FsSpriteLoader::new(&args.assets)));
    let compositor = mimi::Compositor::new(config.canvas, config.geometry.clone());
    let scheduler = mimi::VisemeScheduler::new(
        compositor.clone(),
        cache.clone(),
        config.sprites.clone(),
        &config.lip_sync,
    );

    let sprites = &config.sprites;
    let layers = cache
        .get_all(&[
            sprites.body.as_str(),
            sprites.eye_left.as_str(),
            sprites.eye_right.as_str(),
        ])
        .await?;
    compositor.paint(|f| {
        for layer in &layers {
            f.draw_sprite(layer);
        }
    });

    let mut shape = config.lip_sync.neutral_shape_id;
    if let (Some(path), Some(at_ms)) = (&args.visemes, args.at_ms) {
        let events = read_visemes(path)?;
        match events.select(at_ms, scheduler.transition_delay_ms()) {
            Some(event) => shape = event.shape_id(),
            None => tracing::info!(at_ms, "no viseme at this time; keeping neutral mouth"),
        }
    }
    scheduler.draw_mouth(shape).await?;

    ensure_parent(&args.out)?;
    compositor.save_png(&args.out)?;
    eprintln!("wrote {} (mouth {shape})", args.out.display());
    Ok(())
}

async fn cmd_speak(args: SpeakArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let loader = Arc::new(mimi::FsSpriteLoader::new(&args.assets));
    let synthesizer = Arc::new(mimi::RecordedSynthesizer::new(&args.utterances, &args.id));
    let mut avatar = mimi::Avatar::new(
        config,
        loader,
        Arc::new(mimi::ClockAudioBackend::default()),
        synthesizer,
    )?;
    avatar.mount().await?;

    let request = mimi::SynthesisRequest {
        voice: args.voice,
        express_style: args.style,
        phrase: args.phrase,
        rate: args.rate,
        pitch: args.pitch,
    };
    match avatar.activate(&request).await {
        mimi::Activation::Playing { events } => {
            tracing::info!(events, id = %args.id, "speaking");
        }
        mimi::Activation::Suppressed(issue) => {
            avatar.teardown().await;
            anyhow::bail!("request suppressed: {issue}");
        }
        mimi::Activation::Failed(message) => {
            avatar.teardown().await;
            anyhow::bail!("activation failed: {message}");
        }
    }
    let audio = avatar
        .session()
        .audio()
        .context("no audio after successful activation")?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    let mut ticker = tokio::time::interval(Duration::from_millis(args.snapshot_ms.max(1)));
    let mut written = 0usize;
    loop {
        ticker.tick().await;
        let path = args.out_dir.join(format!("frame-{written:05}.png"));
        avatar.compositor().save_png(&path)?;
        written += 1;
        if audio.is_paused() {
            break;
        }
    }

    avatar.teardown().await;
    eprintln!("wrote {written} frames to {}", args.out_dir.display());
    Ok(())
}
