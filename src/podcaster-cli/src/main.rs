//! Podcaster CLI - research paper to podcast
//!
//! Drafts a podcast script from paper text and renders it to audio with
//! Kokoro, ElevenLabs or a mock engine.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use podcaster_core::script_gen::UNKNOWN_PAPER_ID;
use podcaster_core::{
    BackendSet, Credentials, EngineKind, EnginePolicy, OutputFormat, PodcastConfig, PodcastEvent,
    PodcastGenerator, PodcastResult, ScriptGenConfig, ScriptGenerator,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "podcaster",
    version,
    about = "Turn research papers into narrated podcasts",
    long_about = "Drafts a Headline/Text podcast script with an OpenAI-compatible model and \
                  synthesizes it with Kokoro, ElevenLabs or a deterministic mock engine."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an existing script file to audio
    Podcast {
        /// Script with `Headline:` / `Text:` markers
        #[arg(value_name = "SCRIPT_FILE")]
        script: PathBuf,

        #[command(flatten)]
        audio: AudioArgs,
    },
    /// Draft a podcast script from paper text
    Script {
        #[arg(value_name = "PAPER_FILE")]
        paper: PathBuf,

        #[command(flatten)]
        draft: DraftArgs,

        /// Where to write the script (defaults to <PAPER_FILE>.script.txt)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
    /// Draft a script and render it in one go
    Run {
        #[arg(value_name = "PAPER_FILE")]
        paper: PathBuf,

        #[command(flatten)]
        draft: DraftArgs,

        #[command(flatten)]
        audio: AudioArgs,
    },
}

#[derive(Args)]
struct AudioArgs {
    /// Output audio file (defaults to the input name with the configured format's extension)
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Engine policy: kokoro, elevenlabs, mixed or mock
    #[arg(long, value_name = "POLICY", value_parser = parse_policy)]
    engine: Option<EnginePolicy>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct DraftArgs {
    /// Identifier the drafted script must carry
    #[arg(long, value_name = "ID", default_value = UNKNOWN_PAPER_ID)]
    paper_id: String,

    /// Chat model used for drafting (overrides SCRIPT_MODEL and SCRIPGENETOR_MODEL)
    #[arg(long, value_name = "M")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("podcaster=info,podcaster_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let credentials = Credentials {
        elevenlabs_api_key: env::var("ELEVENLABS_API_KEY").ok(),
        openrouter_api_key: env::var("OPENROUTER_API_KEY").ok(),
    };

    match cli.command {
        Command::Podcast { script, audio } => {
            let text = fs::read_to_string(&script)
                .map_err(|e| format!("Failed to read {}: {}", script.display(), e))?;
            render(&text, &script, &audio, &credentials).await?;
        }
        Command::Script {
            paper,
            draft,
            output,
        } => {
            let script = draft_script(&paper, &draft, &credentials).await?;
            let output = output.unwrap_or_else(|| paper.with_extension("script.txt"));
            fs::write(&output, &script)
                .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;
            println!(
                "{} {}",
                "Script written to".bright_green().bold(),
                output.display().to_string().bright_white()
            );
        }
        Command::Run {
            paper,
            draft,
            audio,
        } => {
            let script = draft_script(&paper, &draft, &credentials).await?;
            let script_path = paper.with_extension("script.txt");
            fs::write(&script_path, &script)
                .map_err(|e| format!("Failed to write {}: {}", script_path.display(), e))?;
            println!(
                "{} {}",
                "Script saved to".dimmed(),
                script_path.display().to_string().dimmed()
            );

            render(&script, &paper, &audio, &credentials).await?;
        }
    }

    Ok(())
}

/// Draft a script from the paper at `paper`.
async fn draft_script(
    paper: &Path,
    draft: &DraftArgs,
    credentials: &Credentials,
) -> Result<String, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(paper)
        .map_err(|e| format!("Failed to read {}: {}", paper.display(), e))?;

    let api_key = credentials.openrouter_key().unwrap_or_else(|| {
        eprintln!(
            "{}",
            "Warning: OPENROUTER_API_KEY not set. Script generation will fail.".yellow()
        );
        ""
    });

    let mut config = ScriptGenConfig::new(api_key);
    if let Ok(base) = env::var("OPENROUTER_BASE_URL") {
        config = config.with_api_base(base);
    }
    if let Some(model) = resolve_model(
        draft.model.clone(),
        env::var("SCRIPT_MODEL").ok(),
        env::var("SCRIPGENETOR_MODEL").ok(),
    ) {
        config = config.with_model(model);
    }

    print_banner("Drafting script");
    println!("{} {}", "Paper:".bold(), paper.display().to_string().bright_white());
    println!("{} {}", "Model:".bold(), config.model.dimmed());
    println!();

    let generator = ScriptGenerator::new(config)?;
    Ok(generator.generate(&text, &draft.paper_id).await?)
}

/// The `--model` flag wins, then `SCRIPT_MODEL`, then the older `SCRIPGENETOR_MODEL`.
fn resolve_model(
    flag: Option<String>,
    primary: Option<String>,
    legacy: Option<String>,
) -> Option<String> {
    flag.or(primary)
        .or(legacy)
        .filter(|model| !model.trim().is_empty())
}

/// Output path next to `input`, named after the configured format.
fn default_output(input: &Path, format: OutputFormat) -> PathBuf {
    input.with_extension(format.extension())
}

/// Synthesize `script` into `--output`, or next to `input` when unset.
async fn render(
    script: &str,
    input: &Path,
    audio: &AudioArgs,
    credentials: &Credentials,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &audio.config {
        Some(path) => PodcastConfig::load(path)?,
        None => PodcastConfig::default(),
    };
    if let Some(policy) = audio.engine {
        config.tts_engine = policy;
    }
    let output = audio
        .output
        .clone()
        .unwrap_or_else(|| default_output(input, config.output_format));

    if config.tts_engine.uses(EngineKind::ElevenLabs)
        && credentials.elevenlabs_key().is_none()
    {
        eprintln!(
            "{}",
            "Warning: ELEVENLABS_API_KEY not set. ElevenLabs segments will fall back.".yellow()
        );
    }

    print_banner("Synthesizing podcast");
    println!("{} {}", "Engine:".bold(), config.tts_engine.to_string().bright_cyan());
    println!("{} {} Hz", "Sample rate:".bold(), config.sample_rate);
    println!("{} {}", "Output:".bold(), output.display().to_string().bright_white());
    println!();

    let backends = BackendSet::initialize(&config, credentials).await?;
    let generator = PodcastGenerator::new(backends).with_callback(console_callback());
    let result = generator.generate(script, &output, config).await?;

    print_summary(&result);
    Ok(())
}

/// Create a callback that prints generation progress to the console.
fn console_callback() -> Arc<dyn Fn(PodcastEvent) + Send + Sync> {
    Arc::new(move |event| match event {
        PodcastEvent::Parsed { segments } => {
            println!("{} {} segments", "▶".bright_cyan(), segments);
        }
        PodcastEvent::SegmentDone {
            order,
            total,
            skipped,
        } => {
            let status = if skipped {
                "skipped".yellow()
            } else {
                "done".green()
            };
            println!("  segment {:>3}/{} {}", order + 1, total, status);
        }
        PodcastEvent::Assembling => {
            println!("{} {}", "▶".bright_cyan(), "Assembling audio".bold());
        }
    })
}

fn parse_policy(value: &str) -> Result<EnginePolicy, String> {
    value.parse().map_err(|e: podcaster_core::PodcastError| e.to_string())
}

fn print_banner(title: &str) {
    println!();
    println!("{}", "═".repeat(60).bright_blue());
    println!("{}", format!("  {}", title).bright_blue().bold());
    println!("{}", "═".repeat(60).bright_blue());
}

fn print_summary(result: &PodcastResult) {
    println!();
    println!("{}", "─".repeat(60).dimmed());
    println!("{}", "  Podcast ready.".bright_green().bold());
    println!("  {} {}", "File:".bold(), result.file_path.display());
    println!("  {} {:.1}s", "Duration:".bold(), result.duration_seconds);
    println!("  {} {:.1} KiB", "Size:".bold(), result.size_bytes as f64 / 1024.0);
    println!("  {} {}", "Segments:".bold(), result.segment_count);
    println!("{}", "─".repeat(60).dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_follows_format() {
        let input = Path::new("papers/attention.txt");
        assert_eq!(default_output(input, OutputFormat::Wav), PathBuf::from("papers/attention.wav"));
        assert_eq!(default_output(input, OutputFormat::Mp3), PathBuf::from("papers/attention.mp3"));
    }

    #[test]
    fn test_default_output_from_config() {
        let config = PodcastConfig::from_toml_str("output_format = \"flac\"").unwrap();
        let output = default_output(Path::new("script.txt"), config.output_format);
        assert_eq!(output, PathBuf::from("script.flac"));
    }

    #[test]
    fn test_model_resolution_order() {
        let some = |s: &str| Some(s.to_string());
        assert_eq!(resolve_model(some("flag"), some("new"), some("old")), some("flag"));
        assert_eq!(resolve_model(None, some("new"), some("old")), some("new"));
        assert_eq!(resolve_model(None, None, some("old")), some("old"));
        assert_eq!(resolve_model(None, None, None), None);
    }
}
