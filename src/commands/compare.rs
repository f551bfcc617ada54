use std::io::{self, BufRead, Write};

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::cli::SessionArgs;
use crate::commands::console::{Command, Console, load_engine, parse_command};
use crate::error::SessionError;
use crate::model::Choice;
use crate::session::{ComparisonQuestion, ComparisonSession};
use crate::sink::JudgmentSink;

pub fn run(args: SessionArgs) -> Result<()> {
    let mut engine = load_engine(&args)?;
    let mut session = match args.seed {
        Some(seed) => ComparisonSession::with_rng(
            engine.dataset,
            args.filter,
            StdRng::seed_from_u64(seed),
        ),
        None => ComparisonSession::new(engine.dataset, args.filter),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    drive(&mut session, &mut engine.sink, stdin.lock(), stdout.lock())?;

    info!(
        path = %engine.sink.path().display(),
        rows_written = engine.sink.rows_written(),
        "comparison session closed"
    );
    Ok(())
}

/// Runs the comparison console until `quit` or end of input. A choice is
/// saved immediately, so there is never anything to flush on exit.
pub(crate) fn drive<R: BufRead, W: Write>(
    session: &mut ComparisonSession,
    sink: &mut dyn JudgmentSink,
    input: R,
    output: W,
) -> Result<()> {
    let mut console = Console::new(input, output);
    let mut question: Option<ComparisonQuestion> = None;
    // Candidates available when the current record cannot form a pair.
    let mut insufficient: Option<usize> = None;
    let mut refresh = true;

    loop {
        if refresh {
            (question, insufficient) = match session.current_question() {
                Ok(question) => (question, None),
                Err(SessionError::InsufficientCandidates { available }) => (None, Some(available)),
                Err(err) => return Err(err.into()),
            };
            render(&mut console, question.as_ref(), insufficient)?;
            refresh = false;
        }

        let Some(line) = console.read_line("compare> ")? else {
            return Ok(());
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                console.say(message)?;
                continue;
            }
        };

        match command {
            Command::Help => console.say(HELP)?,
            Command::Quit => return Ok(()),
            Command::Show => render(&mut console, question.as_ref(), insufficient)?,
            Command::Next => {
                session.skip();
                refresh = true;
            }
            Command::Filter(filter) => {
                session.set_filter(filter);
                console.say(format!("Filter set to {}.", filter.as_str()))?;
                refresh = true;
            }
            Command::Input(text) => {
                if session.state().is_complete() {
                    console.say("All comparisons are complete; use `filter` or `quit`.")?;
                    continue;
                }
                let outcome = text
                    .parse::<Choice>()
                    .and_then(|choice| session.choose_better(choice, &mut *sink));
                match outcome {
                    Ok(_) => {
                        console.say("Saved.")?;
                        refresh = true;
                    }
                    Err(err) => {
                        if matches!(err, SessionError::Sink(_)) {
                            warn!(error = %err, "comparison not saved");
                        }
                        console.say(format!("Not saved: {err}"))?;
                    }
                }
            }
        }
    }
}

fn render<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    question: Option<&ComparisonQuestion>,
    insufficient: Option<usize>,
) -> Result<()> {
    if let Some(available) = insufficient {
        return console.say(format!(
            "Not enough translations for comparison ({available} available); \
             type `skip` to move on."
        ));
    }
    let Some(question) = question else {
        return console.say("You have completed all comparison questions!");
    };

    let header = &question.header;
    console.say("")?;
    console.say(format!(
        "[{}/{}] Source text ({}):",
        header.position + 1,
        header.total,
        header.source_lang.as_str()
    ))?;
    console.say(&header.source)?;
    console.say(format!("  Translation 1: {}", question.first.text))?;
    console.say(format!("  Translation 2: {}", question.second.text))?;
    console.say("Which is better? (1 or 2)")
}

const HELP: &str = "\
commands:
  1 | 2             record the better translation and continue
  skip              move on without recording
  filter <lang>     switch to both|english|french and restart
  show              print the current pair again
  quit              exit";

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dataset::Dataset;
    use crate::model::{LanguageFilter, SourceLang, SourceRecord};
    use crate::schema::CandidateSchema;
    use crate::session::SessionState;
    use crate::sink::MemorySink;

    fn session(records: Vec<SourceRecord>) -> ComparisonSession {
        let schema = CandidateSchema::with_systems(["sysA", "sysB"]).expect("valid schema");
        ComparisonSession::with_rng(
            Arc::new(Dataset::from_records(schema, records)),
            LanguageFilter::Both,
            StdRng::seed_from_u64(31),
        )
    }

    fn record(source: &str, a: &str, b: &str) -> SourceRecord {
        SourceRecord::new(
            source,
            SourceLang::En,
            "reference",
            vec![a.to_string(), b.to_string()],
            "news",
        )
    }

    fn run_script(session: &mut ComparisonSession, sink: &mut MemorySink, script: &str) -> String {
        let mut output = Vec::new();
        drive(session, sink, script.as_bytes(), &mut output).expect("console runs");
        String::from_utf8(output).expect("utf8 output")
    }

    #[test]
    fn choice_is_saved_and_session_completes() {
        let mut session = session(vec![record("Hi", "Hello", "")]);
        let mut sink = MemorySink::default();

        let output = run_script(&mut session, &mut sink, "2\n");

        assert_eq!(sink.rows.len(), 1);
        assert!(output.contains("Saved."));
        assert!(output.contains("You have completed all comparison questions!"));
        assert!(session.state().is_complete());
    }

    #[test]
    fn insufficient_candidates_waits_for_skip() {
        let mut session = session(vec![record("Solo", "", ""), record("Pair", "Hello", "")]);
        let mut sink = MemorySink::default();

        let output = run_script(&mut session, &mut sink, "1\nskip\n1\n");

        // Whichever record comes first, exactly one comparison is recorded.
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].source, "Pair");
        assert!(output.contains("Not enough translations"));
    }

    #[test]
    fn blank_line_on_unpairable_record_repeats_notice_without_completing() {
        let mut session = session(vec![record("Solo", "", "")]);
        let mut sink = MemorySink::default();

        let output = run_script(&mut session, &mut sink, "\nshow\n");

        assert_eq!(output.matches("Not enough translations").count(), 3);
        assert!(!output.contains("You have completed"));
        assert_eq!(session.state(), SessionState::Active { position: 0 });
        assert!(sink.rows.is_empty());
    }

    #[test]
    fn invalid_choice_is_reported_and_not_saved() {
        let mut session = session(vec![record("Hi", "Hello", "Hey")]);
        let mut sink = MemorySink::default();

        let output = run_script(&mut session, &mut sink, "3\nquit\n");

        assert!(output.contains("Not saved: invalid choice `3`"));
        assert!(sink.rows.is_empty());
    }
}
