//! Symptomatic: Symptom-driven diagnosis engine
//!
//! Main entry point: a line-oriented terminal interview.

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use symptomatic::adapters::sanitize::SanitizingMakeWriter;
use symptomatic::adapters::{KnowledgeBase, TfidfVerifier};
use symptomatic::{
    DiagnosisResult, Engine, EngineConfig, InterviewService, InterviewSession, InterviewStep,
    SymptomaticError,
};

type Service = InterviewService<TfidfVerifier, KnowledgeBase>;

fn main() -> Result<()> {
    // Initialize logging.
    //
    // Logs on the terminal would interleave with the interview prompts.
    // Default behavior:
    // - interactive TTY: log to a file
    // - non-interactive: log to stdout
    let log_mode = std::env::var("SYMPTOMATIC_LOG_MODE").unwrap_or_else(|_| "auto".to_string());

    let interactive = std::io::stdout().is_terminal();
    let use_file = match log_mode.as_str() {
        "file" => true,
        "stdout" => false,
        // auto
        _ => interactive,
    };

    let (writer, _guard) = if use_file {
        let log_file = std::env::var("SYMPTOMATIC_LOG_FILE")
            .unwrap_or_else(|_| "logs/symptomatic.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Symptomatic...");

    let config = EngineConfig::from_env_or_default();
    let engine = Engine::initialize(&config).context("Failed to initialize the diagnosis engine")?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut console = Console::new(stdin.lock(), stdout.lock());
    for issue in &engine.load_report().issues {
        console.say(&format!("Note: {}", issue.message))?;
    }
    run(&engine.interview_service(), &mut console)?;

    tracing::info!("Symptomatic shutdown complete.");
    Ok(())
}

/// Line-oriented prompt/answer channel.
struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}")?;
        Ok(())
    }

    /// Prompt and read one trimmed line; `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt} ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_yes_no(&mut self, prompt: &str) -> Result<Option<bool>> {
        loop {
            let Some(answer) = self.ask(&format!("{prompt} (yes/no):"))? else {
                return Ok(None);
            };
            match answer.to_lowercase().as_str() {
                "yes" | "y" => return Ok(Some(true)),
                "no" | "n" => return Ok(Some(false)),
                _ => self.say("Provide proper answers i.e. (yes/no)")?,
            }
        }
    }
}

enum Outcome {
    Diagnosed(Box<DiagnosisResult>),
    Failed,
    EndOfInput,
}

fn run<R: BufRead, W: Write>(service: &Service, console: &mut Console<R, W>) -> Result<()> {
    let mut session = InterviewSession::new();
    loop {
        match interview(service, &mut session, console)? {
            Outcome::Diagnosed(result) => report(&result, console)?,
            Outcome::Failed => console.say("We could not reach a diagnosis.")?,
            Outcome::EndOfInput => return Ok(()),
        }
        match console.ask_yes_no("Start another interview?")? {
            Some(true) => session.restart(),
            _ => return Ok(()),
        }
    }
}

fn interview<R: BufRead, W: Write>(
    service: &Service,
    session: &mut InterviewSession,
    console: &mut Console<R, W>,
) -> Result<Outcome> {
    loop {
        let Some(name) = console.ask("Your name:")? else {
            return Ok(Outcome::EndOfInput);
        };
        match session.begin(&name) {
            Ok(()) => break,
            Err(e) => console.say(&e.to_string())?,
        }
    }
    console.say(&format!("Hello, {}", session.name()))?;

    let candidates = loop {
        let Some(text) = console.ask("Enter the symptom you are experiencing:")? else {
            return Ok(Outcome::EndOfInput);
        };
        match service.submit_symptom_text(session, &text) {
            Ok(result) => break result.candidates,
            Err(SymptomaticError::UnmatchedSymptom(_)) => console.say("Enter a valid symptom.")?,
            Err(e) => return Err(e.into()),
        }
    };

    let chosen = if candidates.len() == 1 {
        candidates[0].clone()
    } else {
        console.say("Searches related to input:")?;
        for (i, name) in candidates.iter().enumerate() {
            console.say(&format!("{i}) {name}"))?;
        }
        loop {
            let prompt = format!("Select the one you meant (0 - {}):", candidates.len() - 1);
            let Some(answer) = console.ask(&prompt)? else {
                return Ok(Outcome::EndOfInput);
            };
            match answer.parse::<usize>().ok().and_then(|i| candidates.get(i)) {
                Some(name) => break name.clone(),
                None => console.say("Enter a number from the list.")?,
            }
        }
    };
    service.confirm_symptom(session, &chosen)?;

    loop {
        let Some(answer) = console.ask("Okay. From how many days?")? else {
            return Ok(Outcome::EndOfInput);
        };
        let Ok(days) = answer.parse::<u32>() else {
            console.say("Enter a whole number of days.")?;
            continue;
        };
        match service.set_duration(session, days) {
            Ok(()) => break,
            Err(e) if e.is_recoverable() => console.say(&e.to_string())?,
            Err(e) => return Err(e.into()),
        }
    }

    loop {
        match service.advance(session)? {
            InterviewStep::FollowUp(question) => {
                let Some(present) = console.ask_yes_no(&question.prompt())? else {
                    return Ok(Outcome::EndOfInput);
                };
                service.record_follow_up_answer(session, &question.symptom, present)?;
            }
            InterviewStep::Diagnosed(result) => return Ok(Outcome::Diagnosed(result)),
            InterviewStep::Failed(failure) => {
                console.say(&failure.to_string())?;
                return Ok(Outcome::Failed);
            }
        }
    }
}

fn report<R: BufRead, W: Write>(
    result: &DiagnosisResult,
    console: &mut Console<R, W>,
) -> Result<()> {
    console.say(result.triage_message.as_str())?;
    if result.diseases_agree {
        console.say(&format!("You may have {}", result.primary_disease))?;
    } else {
        console.say(&format!(
            "You may have {} or {}",
            result.primary_disease, result.secondary_disease
        ))?;
    }
    for disease in result.diagnosed_labels() {
        if let Some(text) = result.descriptions.get(disease) {
            console.say(text)?;
        }
    }
    for (n, disease) in result.diagnosed_labels().into_iter().enumerate() {
        let Some(list) = result.precautions.get(disease) else {
            continue;
        };
        if n == 0 {
            console.say("Take following measures:")?;
        } else {
            console.say(&format!("If it is {disease}, also take following measures:"))?;
        }
        for (i, item) in list.iter().enumerate() {
            console.say(&format!("{}) {item}", i + 1))?;
        }
    }
    for warning in &result.warnings {
        console.say(&format!("Note: {warning}"))?;
    }
    console.say(&format!("Booking reference: {}", result.booking_label()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use symptomatic::EngineSources;

    const TRAINING: &str = "itching,skin_rash,chills,prognosis\n\
                            1,1,0,Fungal infection\n\
                            1,0,0,Fungal infection\n\
                            0,0,1,Malaria\n";
    const SEVERITY: &str = "Symptom,Severity\nitching,1\nskin_rash,3\nchills,3\n";
    const DESCRIPTION: &str = "Disease,Description\nFungal infection,A fungus.\n";
    const PRECAUTION: &str = "Disease,Precaution_1,Precaution_2,Precaution_3,Precaution_4\n\
                              Fungal infection,bath twice,use detol,keep area dry,use clean cloths\n";

    fn service() -> Service {
        let sources = EngineSources {
            training: Box::new(TRAINING.as_bytes()),
            testing: None,
            severity: Box::new(SEVERITY.as_bytes()),
            description: Box::new(DESCRIPTION.as_bytes()),
            precaution: Box::new(PRECAUTION.as_bytes()),
        };
        let config = EngineConfig {
            cv_folds: 0,
            ..EngineConfig::default()
        };
        Engine::from_sources(sources, &config)
            .expect("Should initialize")
            .interview_service()
    }

    #[test]
    fn test_scripted_interview() {
        let script = "\nAsha\nfever\nit\nmaybe\n4\nyes\nno\n";
        let mut out = Vec::new();
        {
            let mut console = Console::new(script.as_bytes(), &mut out);
            run(&service(), &mut console).expect("Should run");
        }
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Patient name must not be empty"));
        assert!(text.contains("Enter a valid symptom."));
        assert!(text.contains("Enter a whole number of days."));
        assert!(text.contains("Are you experiencing skin rash?"));
        assert!(text.contains("You may have Fungal infection"));
        assert!(text.contains("1) bath twice"));
        assert!(text.contains("Booking reference: Fungal infection"));
    }

    #[test]
    fn test_missing_reference_data_is_reported() {
        let script = "Ravi\nchills\n2\nno\nno\nno\nno\nno\nno\n";
        let mut out = Vec::new();
        {
            let mut console = Console::new(script.as_bytes(), &mut out);
            run(&service(), &mut console).expect("Should run");
        }
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("You may have Malaria"));
        assert!(text.contains("Note: No description available for 'Malaria'"));
        assert!(text.contains("Note: No precautions available for 'Malaria'"));
        assert!(!text.contains("Take following measures:"));
    }

    #[test]
    fn test_end_of_input_stops_cleanly() {
        let mut out = Vec::new();
        let mut console = Console::new("Asha\n".as_bytes(), &mut out);
        run(&service(), &mut console).expect("Should stop at end of input");
    }
}
