use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use plating_contracts::artifacts::{
    save_image_artifact, save_image_to, ImageArtifact, DEFAULT_IMAGE_STEM,
};
use plating_contracts::chat::{parse_input, ChatInput, CHAT_HELP_COMMANDS};
use plating_contracts::events::{SessionEvent, SessionLog};
use plating_contracts::resources::ImageResource;
use plating_contracts::transcript::{Message, Role};
use plating_engine::{
    ChatOrchestrator, DryrunChatSession, DryrunImageService, EngineConfig, IgnoreReason,
    ImageService, ImageSynthesizer, ImagenProvider, SubmitOutcome, TurnPhase,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "plating", version, about = "Recipe visualizer chat for the terminal")]
struct Cli {
    /// Debug logging on stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Talk through a recipe until it can be pictured.
    Chat(ChatArgs),
    /// Generate one image straight from a prompt.
    Render(RenderArgs),
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long, default_value = "plating-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    system_instruction: Option<PathBuf>,
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct RenderArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "plating-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    dryrun: bool,
}

const PHASE_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("plating error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Chat(args) => run_chat(args),
        Command::Render(args) => run_render(args),
    }
}

fn session_log(out_dir: &Path, events: Option<&Path>) -> Result<SessionLog> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let path = events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out_dir.join("events.jsonl"));
    let log = SessionLog::for_new_session(path);
    tracing::debug!(path = %log.path().display(), session_id = log.session_id(), "session log");
    Ok(log)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let config = EngineConfig::from_env()
        .with_text_model(args.text_model.as_deref())
        .with_image_model(args.image_model.as_deref())
        .with_system_instruction_file(args.system_instruction.as_deref())?;
    let events = session_log(&args.out, args.events.as_deref())?;
    tracing::debug!(?config, "starting chat");

    let orchestrator = if args.dryrun {
        ChatOrchestrator::new(
            Box::new(DryrunChatSession::new()),
            Box::new(DryrunImageService::new()),
            Some(events.clone()),
        )
    } else {
        ChatOrchestrator::connect(&config, Some(events.clone()))
    };
    let mut chat = ChatFrontend {
        orchestrator: Arc::new(orchestrator),
        out_dir: args.out,
        events,
        printed: 0,
    };

    chat.print_new_messages(true);
    if chat.orchestrator.is_initialized() {
        println!("Type /help for commands.");
    } else {
        println!("Chat is unavailable. Type /quit to leave.");
    }

    let stdin = io::stdin();
    let mut line = String::new();
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

        match parse_input(line.trim_end_matches(['\n', '\r'])) {
            ChatInput::Noop => {}
            ChatInput::Help => print_help(),
            ChatInput::Quit => break,
            ChatInput::ShowTranscript => {
                for message in chat.orchestrator.transcript().messages() {
                    println!("{}", render_message(message));
                }
            }
            ChatInput::SaveImage { path } => chat.save_latest(path.as_deref()),
            ChatInput::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.");
            }
            ChatInput::Message(text) => {
                let outcome = run_turn(&chat.orchestrator, text)?;
                tracing::debug!(?outcome, "turn settled");
                if outcome == SubmitOutcome::Ignored(IgnoreReason::Uninitialized) {
                    println!("The AI model is not available; nothing was sent.");
                }
                chat.print_new_messages(false);
            }
        }
    }
    Ok(())
}

struct ChatFrontend {
    orchestrator: Arc<ChatOrchestrator>,
    out_dir: PathBuf,
    events: SessionLog,
    printed: usize,
}

impl ChatFrontend {
    /// Prints messages added since the last call and saves any images they
    /// carry. The user's own lines are only echoed on the first call.
    fn print_new_messages(&mut self, include_user: bool) {
        let messages = self.orchestrator.messages_since(self.printed);
        self.printed += messages.len();
        for message in &messages {
            if message.role() == Role::User && !include_user {
                continue;
            }
            println!("{}", render_message(message));
            if let Some(image) = message.image() {
                match save_image_artifact(&self.out_dir, DEFAULT_IMAGE_STEM, image) {
                    Ok(artifact) => {
                        self.record_saved(&artifact);
                        println!("  saved {}", artifact.image_path.display());
                    }
                    Err(err) => println!("  could not save image: {err:#}"),
                }
            }
        }
    }

    fn save_latest(&self, requested: Option<&str>) {
        let Some(image) = self.orchestrator.latest_image() else {
            println!("No image yet.");
            return;
        };
        match save_image(&self.out_dir, requested, &image) {
            Ok(artifact) => {
                self.record_saved(&artifact);
                println!("Saved {}", artifact.image_path.display());
            }
            Err(err) => println!("Save failed: {err:#}"),
        }
    }

    fn record_saved(&self, artifact: &ImageArtifact) {
        if let Err(err) = self.events.record(SessionEvent::image_saved(artifact)) {
            tracing::warn!(error = %err, "failed to write session event");
        }
    }
}

/// Runs the turn on a worker thread and reports phase changes until it settles.
fn run_turn(orchestrator: &Arc<ChatOrchestrator>, text: String) -> Result<SubmitOutcome> {
    let worker = {
        let orchestrator = Arc::clone(orchestrator);
        thread::spawn(move || orchestrator.submit(&text))
    };
    let mut shown: Option<TurnPhase> = None;
    while !worker.is_finished() {
        let phase = orchestrator.phase();
        if shown != Some(phase) {
            if let Some(label) = phase_label(phase) {
                eprintln!("{label}");
            }
            shown = Some(phase);
        }
        thread::sleep(PHASE_POLL_INTERVAL);
    }
    worker
        .join()
        .map_err(|_| anyhow!("chat turn thread panicked"))
}

fn run_render(args: RenderArgs) -> Result<()> {
    let config = EngineConfig::from_env().with_image_model(args.image_model.as_deref());
    let events = session_log(&args.out, args.events.as_deref())?;
    let service: Box<dyn ImageService> = if args.dryrun {
        Box::new(DryrunImageService::new())
    } else {
        Box::new(ImagenProvider::new(&config)?)
    };
    let synthesizer = ImageSynthesizer::new(service);

    eprintln!("generating image...");
    let image = synthesizer.synthesize(&args.prompt)?;
    events.record(SessionEvent::image_generated(None, &image))?;
    let artifact = save_image_artifact(&args.out, DEFAULT_IMAGE_STEM, &image)?;
    events.record(SessionEvent::image_saved(&artifact))?;
    println!(
        "Saved {} ({}x{}, {})",
        artifact.image_path.display(),
        image.width(),
        image.height(),
        image.mime_type()
    );
    Ok(())
}

fn print_help() {
    println!("Commands:");
    for (command, description) in CHAT_HELP_COMMANDS {
        println!("  {command:<14} {description}");
    }
    println!("Anything else is sent to the assistant.");
}

fn phase_label(phase: TurnPhase) -> Option<&'static str> {
    match phase {
        TurnPhase::AwaitingResponse => Some("thinking..."),
        TurnPhase::AwaitingImage => Some("generating image..."),
        TurnPhase::Idle | TurnPhase::Uninitialized => None,
    }
}

fn render_message(message: &Message) -> String {
    let speaker = match message.role() {
        Role::User => "you",
        Role::Model => "plating",
    };
    let mut rendered = format!("{speaker}> {}", message.content());
    if let Some(image) = message.image() {
        rendered.push_str(&format!(
            "\n  [image {}x{} {}]",
            image.width(),
            image.height(),
            image.mime_type()
        ));
    }
    rendered
}

/// `/save` with no path writes into the output directory. A directory path
/// gets a generated file name, and a bare file name gets the image's extension.
fn save_image(out_dir: &Path, requested: Option<&str>, image: &ImageResource) -> Result<ImageArtifact> {
    let Some(requested) = requested.map(str::trim).filter(|value| !value.is_empty()) else {
        return save_image_artifact(out_dir, DEFAULT_IMAGE_STEM, image);
    };
    let target = PathBuf::from(requested);
    if target.is_dir() {
        return save_image_artifact(&target, DEFAULT_IMAGE_STEM, image);
    }
    let target = if target.extension().is_none() {
        target.with_extension(image.file_extension())
    } else {
        target
    };
    save_image_to(&target, image)
}
