use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use interview_core::gemini::GeminiClient;
use interview_core::{
    Collaborators, EvaluationError, FeedbackEvaluator, GeminiEvaluator, GeminiQuestionSource,
    Phase, QaPair, QuestionSource, SessionController, SessionOutcome, SessionSettings,
    SessionState, SpeechInput, SpeechOutput,
};
use interview_service::config::{Config, QuestionProvider, RecognizerKind, SpeechOutputKind};
use interview_service::console::{ConsoleRecognizer, ConsoleSpeechOutput, UnavailableRecognizer};
use interview_service::elevenlabs::{AudioSink, ElevenLabsSpeechOutput};
use interview_service::prompt_loader;
use interview_service::report::{SessionReport, render_score_card};
use interview_service::simulated::{ScriptedEvaluator, ScriptedQuestionSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Practice a spoken mock interview in the terminal")]
struct Cli {
    /// Number of questions to ask
    #[arg(short, long, default_value_t = 3)]
    questions: usize,
    /// Company you are interviewing with
    #[arg(long)]
    company: Option<String>,
    /// Role you are interviewing for
    #[arg(long)]
    role: Option<String>,
    /// Write the answers (and feedback, if any) to this JSON file
    #[arg(long)]
    save: Option<PathBuf>,
    /// Seconds to wait for feedback before giving up
    #[arg(long, default_value_t = 60)]
    feedback_timeout: u64,
    /// Print the available audio output devices and exit
    #[cfg(feature = "native-audio")]
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded. Provider: {:?}", config.provider);

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    #[cfg(feature = "native-audio")]
    if args.list_devices {
        let devices = interview_native_utils::device::get_available_outputs()
            .context("Failed to list audio output devices")?;
        println!("Available output devices:\n{devices}");
        return Ok(());
    }
    if let Some(company) = args.company.clone() {
        config.profile.company = company;
    }
    if let Some(role) = args.role.clone() {
        config.profile.role = role;
    }

    // --- 4. Load Prompts ---
    let prompts = prompt_loader::load_prompt_set(config.prompts_dir.as_deref())
        .context("Failed to load LLM prompts")?;

    // --- 5. Build Collaborators ---
    let (questions, evaluator): (Arc<dyn QuestionSource>, Arc<dyn FeedbackEvaluator>) =
        match config.provider {
            QuestionProvider::Gemini => {
                let api_key = config
                    .gemini_api_key
                    .clone()
                    .context("GEMINI_API_KEY must be set for the gemini provider")?;
                let client = GeminiClient::new(api_key, config.gemini_model.clone());
                (
                    Arc::new(GeminiQuestionSource::new(
                        client.clone(),
                        prompts.clone(),
                        config.profile.clone(),
                    )),
                    Arc::new(GeminiEvaluator::new(client, prompts)),
                )
            }
            QuestionProvider::Simulated => (
                Arc::new(ScriptedQuestionSource::with_latency(Duration::from_millis(300))),
                Arc::new(ScriptedEvaluator),
            ),
        };

    let speech_output: Arc<dyn SpeechOutput> = match config.speech_output {
        SpeechOutputKind::Console => Arc::new(ConsoleSpeechOutput),
        SpeechOutputKind::ElevenLabs => {
            let api_key = config
                .elevenlabs_api_key
                .clone()
                .context("ELEVENLABS_API_KEY must be set for elevenlabs speech output")?;
            Arc::new(ElevenLabsSpeechOutput::new(
                api_key,
                config.elevenlabs_voice_id.clone(),
                audio_sink(config.output_device.clone()),
            ))
        }
    };

    let console_recognizer = match config.recognizer {
        RecognizerKind::Console => Some(Arc::new(ConsoleRecognizer::new())),
        RecognizerKind::None => None,
    };
    let speech_input: Arc<dyn SpeechInput> = match &console_recognizer {
        Some(recognizer) => recognizer.clone(),
        None => Arc::new(UnavailableRecognizer::new("speech recognition is disabled")),
    };

    // --- 6. Run the Session ---
    let mut controller = SessionController::new(
        Collaborators::new(questions, speech_output, speech_input),
        SessionSettings::default(),
    );
    let progress = tokio::spawn(show_progress(
        controller.subscribe(),
        config.speech_output != SpeechOutputKind::Console,
    ));

    println!(
        "Mock interview: {} at {}. Type your answers; an empty line moves on, /exit stops.",
        config.profile.role, config.profile.company
    );
    let completion = controller
        .start_session(args.questions)
        .context("Failed to start the interview")?;
    let outcome = completion.outcome();
    tokio::pin!(outcome);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = loop {
        tokio::select! {
            biased;
            outcome = &mut outcome => break outcome,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, ending the interview...");
                controller.exit_session().await;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    handle_line(&mut controller, console_recognizer.as_deref(), line.trim()).await
                }
                Ok(None) => controller.exit_session().await,
                Err(e) => {
                    tracing::error!("Failed to read from stdin: {}", e);
                    controller.exit_session().await;
                }
            }
        }
    };
    if let Err(e) = progress.await {
        tracing::warn!("Progress display stopped: {}", e);
    }

    // --- 7. Feedback ---
    match outcome {
        SessionOutcome::Completed(pairs) => {
            let timeout = Duration::from_secs(args.feedback_timeout);
            println!("\nScoring your answers...");
            let report = evaluate(evaluator.as_ref(), pairs, timeout).await;
            if let Some(path) = &args.save {
                report.save(path)?;
            }
        }
        SessionOutcome::Failed(e) => {
            return Err(e).context("The interview could not start");
        }
        SessionOutcome::Aborted => {
            let pairs = controller.state().pairs;
            println!("\nInterview ended early with {} answer(s).", pairs.len());
            if let Some(path) = &args.save {
                SessionReport {
                    pairs,
                    feedback: None,
                    evaluation_error: None,
                }
                .save(path)?;
            }
        }
    }

    tracing::info!("Shutting down...");
    Ok(())
}

async fn handle_line(
    controller: &mut SessionController,
    recognizer: Option<&ConsoleRecognizer>,
    line: &str,
) {
    if line == "/exit" {
        controller.exit_session().await;
    } else if line.is_empty() {
        if let Err(e) = controller.signal_done_answering() {
            println!("({e})");
        }
    } else {
        match recognizer {
            Some(recognizer) if recognizer.deliver(line) => {}
            Some(_) => println!("(not listening yet, wait for the question)"),
            None => println!("(speech recognition is off, press enter to move on)"),
        }
    }
}

async fn evaluate(
    evaluator: &dyn FeedbackEvaluator,
    pairs: Vec<QaPair>,
    timeout: Duration,
) -> SessionReport {
    let result = match tokio::time::timeout(timeout, evaluator.evaluate(&pairs)).await {
        Ok(result) => result,
        Err(_) => Err(EvaluationError::Timeout(timeout)),
    };

    match result {
        Ok(feedback) => {
            println!("\n{}", render_score_card(&feedback));
            SessionReport {
                pairs,
                feedback: Some(feedback),
                evaluation_error: None,
            }
        }
        Err(e) => {
            tracing::error!("Feedback failed: {}", e);
            println!("\nFeedback is unavailable: {e}");
            SessionReport {
                pairs,
                feedback: None,
                evaluation_error: Some(e.to_string()),
            }
        }
    }
}

/// Prints one line per phase change until the session ends.
async fn show_progress(mut rx: watch::Receiver<SessionState>, echo_questions: bool) {
    let mut last = (Phase::Idle, usize::MAX);
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        if (state.phase, state.question_index) == last {
            continue;
        }
        last = (state.phase, state.question_index);

        match state.phase {
            Phase::Generating => println!("Preparing {} questions...", state.question_count),
            Phase::Speaking => {
                println!(
                    "\nQuestion {}/{}",
                    state.question_index + 1,
                    state.question_count
                );
                if echo_questions {
                    println!("{}", state.question_text);
                }
            }
            Phase::Listening => {
                if let Some(e) = &state.last_error {
                    println!("(note: {e})");
                }
                println!("Your answer:");
            }
            phase if phase.is_terminal() => break,
            _ => {}
        }
    }
}

fn audio_sink(device_name: Option<String>) -> Arc<dyn AudioSink> {
    #[cfg(feature = "native-audio")]
    {
        Arc::new(interview_service::playback::DevicePlayback::new(device_name))
    }
    #[cfg(not(feature = "native-audio"))]
    {
        if let Some(name) = device_name {
            tracing::warn!("OUTPUT_DEVICE '{}' ignored; built without native-audio", name);
        }
        Arc::new(interview_service::playback::PacedPlayback)
    }
}
