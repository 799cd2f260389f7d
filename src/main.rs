use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use voicecart::actions::ActionBindings;
use voicecart::bus::CommandBus;
use voicecart::catalog::{CategoryBrowser, default_catalog};
use voicecart::console::{
    ConsoleErrorSink, ConsoleHub, ConsoleMicrophone, ConsoleNavigator, ConsolePage,
    ConsoleProvider, ConsoleSynthesizer, Fed,
};
use voicecart::error::ErrorSink;
use voicecart::permission::{PermissionGate, SetupPrompt};
use voicecart::recognition::EngineProvider;
use voicecart::tts::FeedbackEmitter;
use voicecart::{
    CommandInterpreter, Config, ControlCommand, RecognitionDriver, RuntimeState, VoiceController,
    ui,
};

#[derive(Parser)]
#[command(name = "voicecart", version, about = "Hands-free voice navigation console")]
struct Cli {
    /// Config file (defaults to ./voicecart.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start a console voice session (default)
    Run {
        /// Behave as if the user refused microphone access
        #[arg(long)]
        deny_mic: bool,

        /// Behave as if no speech engine is available
        #[arg(long)]
        no_engine: bool,
    },
    /// Print the compiled command table
    Commands,
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run {
        deny_mic: false,
        no_engine: false,
    }) {
        Command::Commands => {
            let interpreter = CommandInterpreter::new(&config, RuntimeState::new());
            ui::print_rules(
                interpreter.activation_phrases(),
                interpreter.deactivation_phrases(),
                interpreter.rules(),
            );
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Run {
            deny_mic,
            no_engine,
        } => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building runtime")?
            .block_on(run_session(config, deny_mic, no_engine)),
    }
}

/// Logs go to stderr so they do not interleave with the console session
fn init_logging() {
    use tracing_subscriber::prelude::*;

    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTimer)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run_session(config: Config, deny_mic: bool, no_engine: bool) -> Result<()> {
    let state = RuntimeState::new();
    let hub = ConsoleHub::new();

    let (engine_tx, engine_rx) = flume::unbounded();
    let (control_tx, control_rx) = flume::unbounded::<ControlCommand>();

    // Recognition
    let provider: Box<dyn EngineProvider> = if no_engine {
        Box::new(ConsoleProvider::unsupported(hub.clone()))
    } else {
        Box::new(ConsoleProvider::new(hub.clone()))
    };
    let sink: Arc<dyn ErrorSink> = Arc::new(ConsoleErrorSink::new(state.clone()));
    let driver = RecognitionDriver::new(
        provider,
        &config.recognition,
        engine_tx,
        state.clone(),
        sink,
    );

    // Page bindings and catalog browsing
    let browser = Arc::new(Mutex::new(CategoryBrowser::default()));
    let mut bus = CommandBus::new();
    CategoryBrowser::register(&browser, &mut bus);
    let category_ids: Vec<String> = default_catalog().iter().map(|c| c.id.to_string()).collect();
    let page = ConsolePage::new(config.sections.iter().map(|s| s.id.clone()), category_ids);
    let bindings = ActionBindings::new(
        Box::new(page),
        Box::new(ConsoleNavigator::default()),
        Arc::new(Mutex::new(bus)),
        config.scroll.clone(),
    );

    let feedback = FeedbackEmitter::new(
        Some(Box::new(ConsoleSynthesizer)),
        config.speech.clone(),
    );
    let interpreter = CommandInterpreter::new(&config, state.clone());
    ui::banner(interpreter.activation_phrases());

    let mut controller = VoiceController::new(
        driver,
        interpreter,
        bindings,
        feedback,
        state.clone(),
        config.recognition.auto_start_delay(),
    );

    // Microphone permission: the console accepts the setup prompt on the user's behalf
    let mut gate = PermissionGate::new(state.clone());
    let mut mic = ConsoleMicrophone::new(deny_mic);
    let mut prompt = gate.check(&mic).clone();
    if prompt == SetupPrompt::Offer {
        prompt = gate.request(&mut mic).clone();
    }
    match prompt {
        SetupPrompt::Hidden | SetupPrompt::Granted => {
            control_tx.send(ControlCommand::PermissionGranted).ok();
        }
        SetupPrompt::Denied | SetupPrompt::Offer => {
            ui::error("Microphone access denied. Continuing without voice control.");
            gate.continue_without_voice();
        }
        SetupPrompt::Error(message) => {
            ui::error(&message);
            gate.continue_without_voice();
        }
    }

    let shutdown_tx = control_tx.clone();
    ctrlc::set_handler(move || {
        shutdown_tx.send(ControlCommand::Shutdown).ok();
    })
    .context("installing Ctrl-C handler")?;

    // Typed lines stand in for the microphone
    let input_state = state.clone();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = match line.trim() {
                ":start" => Some(ControlCommand::Start),
                ":stop" => Some(ControlCommand::Stop),
                ":toggle" => Some(ControlCommand::Toggle),
                ":quit" => break,
                ":status" => {
                    ui::status(&input_state);
                    None
                }
                text => {
                    if hub.feed(text) == Fed::NotListening {
                        ui::hint("(not listening, type :start)");
                    }
                    None
                }
            };
            if let Some(command) = command {
                if control_tx.send(command).is_err() {
                    return;
                }
            }
        }
        control_tx.send(ControlCommand::Shutdown).ok();
    });

    controller.run(engine_rx, control_rx).await;
    Ok(())
}
