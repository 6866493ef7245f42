use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ehon_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use ehon_contracts::persona::PersonaRecord;
use ehon_engine::story::{EVENTS_FILE, REPLY_AUDIO_FILE};
use ehon_engine::{Derivation, EngineConfig, ModelOverrides, StoryEngine, TurnResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ehon", version, about = "Talk with the characters in a picture book")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive conversation; show a page with /show or /image.
    Chat(ChatArgs),
    /// Extract the persona from one page and print it.
    Describe(DescribeArgs),
    /// Speak a line of text into a WAV file.
    Say(SayArgs),
    /// Transcribe a WAV recording.
    Transcribe(TranscribeArgs),
}

#[derive(Debug, Parser)]
struct ModelArgs {
    #[arg(long, env = "EHON_VISION_MODEL")]
    vision_model: Option<String>,
    #[arg(long, env = "EHON_CHAT_MODEL")]
    chat_model: Option<String>,
    #[arg(long, env = "EHON_SPEECH_MODEL")]
    speech_model: Option<String>,
    #[arg(long, env = "EHON_TRANSCRIPTION_MODEL")]
    transcription_model: Option<String>,
}

impl ModelArgs {
    fn overrides(&self) -> ModelOverrides {
        ModelOverrides {
            vision: self.vision_model.clone(),
            chat: self.chat_model.clone(),
            speech: self.speech_model.clone(),
            transcription: self.transcription_model.clone(),
        }
    }
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long, env = "EHON_OUT_DIR", default_value = "ehon-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Debug, Parser)]
struct DescribeArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, env = "EHON_OUT_DIR", default_value = "ehon-out")]
    out: PathBuf,
    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Debug, Parser)]
struct SayArgs {
    #[arg(long)]
    text: String,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, env = "EHON_OUT_DIR", default_value = "ehon-out")]
    out_dir: PathBuf,
    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Debug, Parser)]
struct TranscribeArgs {
    #[arg(long)]
    recording: PathBuf,
    #[arg(long, env = "EHON_OUT_DIR", default_value = "ehon-out")]
    out: PathBuf,
    #[command(flatten)]
    models: ModelArgs,
}

fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{err:#}");
            eprintln!("ehon error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Describe(args) => run_describe(args),
        Command::Say(args) => run_say(args),
        Command::Transcribe(args) => run_transcribe(args),
    }
}

fn load_config(models: &ModelArgs) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("configuration error")?;
    config
        .apply_models(&models.overrides())
        .context("configuration error")?;
    info!(
        vision = %config.vision_model,
        chat = %config.chat_model,
        speech = %config.speech_model,
        transcription = %config.transcription_model,
        "models resolved"
    );
    Ok(config)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let config = load_config(&args.models)?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join(EVENTS_FILE));
    let mut engine = StoryEngine::with_events_path(
        &args.out,
        &events_path,
        ehon_engine::Capabilities::gemini(&config),
    )?;

    let stdin = io::stdin();
    let mut line = String::new();
    let mut staged_image: Option<PathBuf> = None;

    println!("Ehon chat started. Type /help for commands.");
    println!("{}", engine.display_text());

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        if intent.action == "noop" {
            continue;
        }

        match intent.action.as_str() {
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "quit" => break,
            "stage_image" => match existing_path(intent.path_arg()) {
                Ok(path) => {
                    println!("Image staged for the next message: {}", path.display());
                    staged_image = Some(path);
                }
                Err(err) => println!("/image: {err}"),
            },
            "clear_image" => {
                staged_image = None;
                println!("Staged image cleared.");
            }
            "show_image" => match existing_path(intent.path_arg()) {
                Ok(path) => {
                    staged_image = None;
                    let result = engine.turn("", Some(&path));
                    report_turn(&engine, result);
                }
                Err(err) => println!("/show: {err}"),
            },
            "voice_turn" => match existing_path(intent.path_arg()) {
                Ok(recording) => {
                    let image = staged_image.take();
                    let result = engine.voice_turn(&recording, image.as_deref());
                    report_turn(&engine, result);
                }
                Err(err) => println!("/voice: {err}"),
            },
            "show_persona" => {
                println!("{}", engine.display_text());
                if let Some(status) = persona_status(engine.sessions().persona_metadata()) {
                    println!("({status})");
                }
            }
            "show_voice" => {
                println!("Voice: {}", engine.voice().as_str());
            }
            "say" => {
                let utterance = intent.utterance.clone().unwrap_or_default();
                let image = staged_image.take();
                let result = engine.turn(&utterance, image.as_deref());
                report_turn(&engine, result);
            }
            "unknown" => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(|value| value.as_str())
                    .unwrap_or_default();
                println!("Unknown command: /{command}. Type /help.");
            }
            other => {
                println!("Unhandled action: {other}");
            }
        }
    }

    let transcript_path = engine.write_transcript()?;
    println!("Transcript saved to {}", transcript_path.display());
    Ok(())
}

fn report_turn(engine: &StoryEngine, result: Result<TurnResult>) {
    match result {
        Ok(turn) => {
            if turn.session_started {
                println!("[{}]", engine.display_text());
            }
            println!("{}", turn.reply);
            if let Some(path) = turn.audio_path {
                println!("(audio: {})", path.display());
            }
        }
        Err(err) => {
            error!("turn failed: {err:#}");
            println!("Turn failed: {err:#}");
        }
    }
}

fn run_describe(args: DescribeArgs) -> Result<i32> {
    let config = load_config(&args.models)?;
    let engine = StoryEngine::from_config(&config, &args.out)?;
    match engine.describe(&args.image)? {
        Derivation::Persona(record) if record.is_empty() => {
            println!("(no fields extracted)");
            Ok(0)
        }
        Derivation::Persona(record) => {
            println!("{record}");
            println!("Voice: {}", record.gender().voice().as_str());
            Ok(0)
        }
        Derivation::NoCharacter { text } => {
            println!("{text}");
            Ok(0)
        }
        Derivation::Failed { message, .. } => {
            println!("{message}");
            Ok(2)
        }
    }
}

fn run_say(args: SayArgs) -> Result<i32> {
    let config = load_config(&args.models)?;
    let engine = StoryEngine::from_config(&config, &args.out_dir)?;
    let target = args
        .out
        .clone()
        .unwrap_or_else(|| args.out_dir.join(REPLY_AUDIO_FILE));
    match engine.say(&args.text, Some(&target)) {
        Some(path) => {
            println!("{}", path.display());
            Ok(0)
        }
        None => {
            println!("No audio was written.");
            Ok(2)
        }
    }
}

fn run_transcribe(args: TranscribeArgs) -> Result<i32> {
    let config = load_config(&args.models)?;
    let engine = StoryEngine::from_config(&config, &args.out)?;
    let text = engine
        .transcribe(&args.recording)
        .with_context(|| format!("failed transcribing {}", args.recording.display()))?;
    println!("{text}");
    Ok(0)
}

fn existing_path(arg: Option<&str>) -> Result<PathBuf> {
    let Some(arg) = arg else {
        bail!("a path is required");
    };
    let path = PathBuf::from(arg);
    if !path.exists() {
        bail!("file not found ({})", path.display());
    }
    Ok(path)
}

/// Short `name @ place` line for the active persona.
fn persona_status(record: &PersonaRecord) -> Option<String> {
    let name = record.name().filter(|value| !value.is_empty());
    let place = record.field("場所").filter(|value| !value.is_empty());
    match (name, place) {
        (Some(name), Some(place)) => Some(format!("{name} @ {place}")),
        (Some(name), None) => Some(name.to_string()),
        (None, Some(place)) => Some(format!("@ {place}")),
        (None, None) => None,
    }
}
