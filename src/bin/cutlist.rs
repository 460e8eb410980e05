use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cutlist", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the structure of a saved project without resolving its assets.
    Inspect(InspectArgs),
    /// Open a project, resolve its assets and print the rebuilt timeline.
    Load(LoadArgs),
    /// Open a project and write it back out.
    Resave(ResaveArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input project file.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct MediaArgs {
    /// JSON manifest mapping media URIs to stream info.
    #[arg(long)]
    media: Option<PathBuf>,

    /// Loader threads (defaults to the number of CPUs).
    #[arg(long)]
    threads: Option<usize>,

    /// Give up waiting for assets after this many milliseconds.
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

#[derive(Parser, Debug)]
struct LoadArgs {
    /// Input project file.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    media: MediaArgs,
}

#[derive(Parser, Debug)]
struct ResaveArgs {
    /// Input project file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output project file.
    #[arg(long)]
    out: PathBuf,

    /// Output formatter.
    #[arg(long, default_value = "json")]
    format: String,

    /// Replace an existing output file.
    #[arg(long)]
    overwrite: bool,

    #[command(flatten)]
    media: MediaArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Load(args) => cmd_load(args),
        Command::Resave(args) => cmd_resave(args),
    }
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let doc = cutlist::load_document(&args.in_path)
        .with_context(|| format!("read project '{}'", args.in_path.display()))?;
    println!("version {}", doc.version);
    println!(
        "{} assets, {} encoding profiles, proxy profile: {}",
        doc.assets.len(),
        doc.encoding_profiles.len(),
        doc.proxy_profile.as_ref().map_or("none", |p| p.name.as_str())
    );
    for track in &doc.timeline.tracks {
        println!(
            "track {} ({} element overrides)",
            track.medium,
            track.elements.len()
        );
    }
    for layer in &doc.timeline.layers {
        println!(
            "layer {} auto_transition={} clips={}",
            layer.priority,
            layer.auto_transition,
            layer.clips.len()
        );
        for clip in &layer.clips {
            println!(
                "  clip {} {} '{}' start={} duration={} priority={} effects={:?}",
                clip.id,
                clip.kind,
                clip.asset,
                clip.start,
                clip.duration,
                clip.priority,
                clip.effects
            );
        }
    }
    Ok(())
}

fn make_context(args: &MediaArgs) -> anyhow::Result<cutlist::Context> {
    let media: Arc<dyn cutlist::MediaInfoProvider> = match &args.media {
        Some(path) => Arc::new(
            cutlist::StaticMediaInfo::from_manifest(path)
                .with_context(|| format!("read media manifest '{}'", path.display()))?,
        ),
        None => default_media(),
    };
    let config = cutlist::ContextConfig {
        worker_threads: args.threads,
        ..cutlist::ContextConfig::default()
    };
    Ok(cutlist::Context::with_config(media, config)?)
}

#[cfg(feature = "media-ffmpeg")]
fn default_media() -> Arc<dyn cutlist::MediaInfoProvider> {
    Arc::new(cutlist::FfprobeMediaInfo)
}

#[cfg(not(feature = "media-ffmpeg"))]
fn default_media() -> Arc<dyn cutlist::MediaInfoProvider> {
    Arc::new(cutlist::StaticMediaInfo::new())
}

fn open_project(
    ctx: &cutlist::Context,
    path: &Path,
    timeout: Duration,
) -> anyhow::Result<(cutlist::Project, cutlist::Timeline)> {
    let project = ctx.project(path);
    let timeline = project.extract()?;
    let settled = ctx.run_until(
        || {
            matches!(
                project.state(),
                cutlist::ProjectState::Loaded | cutlist::ProjectState::Error
            )
        },
        timeout,
    );
    if !settled {
        let pending: Vec<String> = project
            .loading_assets()
            .iter()
            .map(|a| a.id().to_string())
            .collect();
        anyhow::bail!("timed out waiting for assets: {}", pending.join(", "));
    }
    if project.state() == cutlist::ProjectState::Error {
        anyhow::bail!("project '{}' failed to load", path.display());
    }
    Ok((project, timeline))
}

fn cmd_load(args: LoadArgs) -> anyhow::Result<()> {
    let ctx = make_context(&args.media)?;
    let (project, timeline) = open_project(
        &ctx,
        &args.in_path,
        Duration::from_millis(args.media.timeout_ms),
    )?;
    println!(
        "{}: {} assets, duration {}",
        project.id(),
        project.list_assets(None).len(),
        timeline.duration()
    );
    for layer in timeline.layers() {
        println!(
            "layer {} auto_transition={}",
            layer.priority(),
            layer.auto_transition()
        );
        for clip in timeline.layer_clips(layer.id())? {
            println!(
                "  {} {:?} '{}' [{}, {}) priority={}",
                clip.id(),
                clip.kind(),
                clip.asset_id(),
                clip.start(),
                clip.span().end(),
                clip.priority()
            );
        }
    }
    for track in timeline.tracks() {
        println!(
            "track {} {}: {} elements",
            track.id(),
            track.track_type(),
            track.len()
        );
    }
    Ok(())
}

fn cmd_resave(args: ResaveArgs) -> anyhow::Result<()> {
    let ctx = make_context(&args.media)?;
    let (project, timeline) = open_project(
        &ctx,
        &args.in_path,
        Duration::from_millis(args.media.timeout_ms),
    )?;
    project
        .save(&timeline, &args.out, Some(&args.format), args.overwrite)
        .with_context(|| format!("write project '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
