use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::cli::SessionArgs;
use crate::commands::console::{Command, Console, load_engine, parse_command};
use crate::error::SessionError;
use crate::model::RankLabel;
use crate::session::{RankingQuestion, RankingSession};
use crate::sink::JudgmentSink;

pub fn run(args: SessionArgs) -> Result<()> {
    let mut engine = load_engine(&args)?;
    let mut session = match args.seed {
        Some(seed) => RankingSession::with_rng(
            engine.dataset,
            args.filter,
            StdRng::seed_from_u64(seed),
        ),
        None => RankingSession::new(engine.dataset, args.filter),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    drive(&mut session, &mut engine.sink, stdin.lock(), stdout.lock())?;

    info!(
        path = %engine.sink.path().display(),
        rows_written = engine.sink.rows_written(),
        "ranking session closed"
    );
    Ok(())
}

/// Runs the ranking console until `quit` or end of input.
///
/// Labels are staged per question by display number and only reach the sink
/// through `record_and_advance` or `set_filter`.
pub(crate) fn drive<R: BufRead, W: Write>(
    session: &mut RankingSession,
    sink: &mut dyn JudgmentSink,
    input: R,
    output: W,
) -> Result<()> {
    let mut console = Console::new(input, output);
    let mut staged: BTreeMap<String, String> = BTreeMap::new();
    let mut question: Option<RankingQuestion> = None;
    let mut refresh = true;

    loop {
        if refresh {
            staged.clear();
            question = session.current_question();
            render(&mut console, question.as_ref())?;
            refresh = false;
        }

        let Some(line) = console.read_line("rank> ")? else {
            return close(session, sink, &staged);
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
            Command::Quit => return close(session, sink, &staged),
            Command::Show => render(&mut console, question.as_ref())?,
            Command::Next => match session.record_and_advance(&staged, sink) {
                Ok(outcome) => {
                    if outcome.written {
                        console.say("Saved.")?;
                    }
                    refresh = true;
                }
                Err(err) => report(&mut console, &err)?,
            },
            Command::Filter(filter) => match session.set_filter(filter, &staged, sink) {
                Ok(outcome) => {
                    if outcome.written {
                        console.say("Saved.")?;
                    }
                    console.say(format!("Filter set to {}.", filter.as_str()))?;
                    refresh = true;
                }
                Err(err) => report(&mut console, &err)?,
            },
            Command::Input(text) => {
                let Some(current) = question.as_ref() else {
                    console.say("All questions are complete; use `filter` or `quit`.")?;
                    continue;
                };
                match stage_labels(current, &text, &mut staged) {
                    Ok(()) => console.say(summarize(current, &staged))?,
                    Err(message) => console.say(message)?,
                }
            }
        }
    }
}

fn close(
    session: &mut RankingSession,
    sink: &mut dyn JudgmentSink,
    staged: &BTreeMap<String, String>,
) -> Result<()> {
    if staged.values().all(|label| label.is_empty()) {
        return Ok(());
    }

    match session.record_and_advance(staged, sink) {
        Ok(_) => Ok(()),
        Err(err) => bail!("failed to save pending rankings before closing: {err}"),
    }
}

/// Applies `<n>=<label>` assignments to the staged labels. Nothing is staged
/// unless every assignment on the line is valid.
fn stage_labels(
    question: &RankingQuestion,
    text: &str,
    staged: &mut BTreeMap<String, String>,
) -> Result<(), String> {
    let mut updates = Vec::new();

    for token in text.split_whitespace() {
        let (number, label) = token
            .split_once('=')
            .ok_or_else(|| format!("expected <n>=<label>, got `{token}`"))?;
        let index = number
            .parse::<usize>()
            .ok()
            .filter(|&index| index >= 1 && index <= question.candidates.len())
            .ok_or_else(|| {
                format!(
                    "translation number must be between 1 and {}",
                    question.candidates.len()
                )
            })?;
        let label = RankLabel::parse_cell(label)
            .map_err(|value| format!("unknown label `{value}`; {}", label_choices()))?;

        updates.push((
            question.candidates[index - 1].name.clone(),
            label.map(RankLabel::as_str).unwrap_or("").to_string(),
        ));
    }

    staged.extend(updates);
    Ok(())
}

fn summarize(question: &RankingQuestion, staged: &BTreeMap<String, String>) -> String {
    let parts: Vec<String> = question
        .candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let label = staged
                .get(&candidate.name)
                .filter(|label| !label.is_empty())
                .map(String::as_str)
                .unwrap_or("-");
            format!("{}={}", index + 1, label)
        })
        .collect();
    format!("Staged: {}", parts.join(" "))
}

fn render<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    question: Option<&RankingQuestion>,
) -> Result<()> {
    let Some(question) = question else {
        return console.say("You have completed all questions!");
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
    for (index, candidate) in question.candidates.iter().enumerate() {
        console.say(format!("  Translation {}: {}", index + 1, candidate.text))?;
    }
    console.say(label_choices())
}

fn report<R: BufRead, W: Write>(console: &mut Console<R, W>, err: &SessionError) -> Result<()> {
    if matches!(err, SessionError::Sink(_)) {
        warn!(error = %err, "ranking not saved");
    }
    console.say(format!("Not saved: {err}"))
}

fn label_choices() -> String {
    let labels: Vec<&str> = RankLabel::ALL.iter().map(|label| label.as_str()).collect();
    format!("labels: {} (e.g. `1=best 2=good`; `1=` clears)", labels.join(", "))
}

const HELP: &str = "\
commands:
  <n>=<label> ...   stage labels for the numbered translations
  next              save staged labels (if any) and go to the next question
  filter <lang>     switch to both|english|french (staged labels are saved first)
  show              print the current question again
  quit              save staged labels and exit";

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dataset::Dataset;
    use crate::model::{LanguageFilter, SourceLang, SourceRecord};
    use crate::schema::CandidateSchema;
    use crate::sink::MemorySink;

    fn session(records: Vec<SourceRecord>) -> RankingSession {
        let schema = CandidateSchema::with_systems(["sysA", "sysB"]).expect("valid schema");
        RankingSession::with_rng(
            Arc::new(Dataset::from_records(schema, records)),
            LanguageFilter::Both,
            StdRng::seed_from_u64(21),
        )
    }

    fn run_script(session: &mut RankingSession, sink: &mut MemorySink, script: &str) -> String {
        let mut output = Vec::new();
        drive(session, sink, script.as_bytes(), &mut output).expect("console runs");
        String::from_utf8(output).expect("utf8 output")
    }

    fn single() -> Vec<SourceRecord> {
        vec![SourceRecord::new(
            "Hi",
            SourceLang::En,
            "Hi",
            vec!["Hello".to_string(), String::new()],
            "news",
        )]
    }

    #[test]
    fn staged_labels_are_written_on_next() {
        let mut session = session(single());
        let mut sink = MemorySink::default();

        let output = run_script(&mut session, &mut sink, "1=best 2=good\nnext\nquit\n");

        assert_eq!(sink.rows.len(), 1);
        let row = &sink.rows[0];
        let mut labels = row.labels.clone();
        labels.sort();
        assert_eq!(labels, vec!["", "best", "good"]);
        assert_eq!(row.labels[2], "");
        assert!(output.contains("Saved."));
        assert!(output.contains("You have completed all questions!"));
    }

    #[test]
    fn invalid_assignment_stages_nothing() {
        let mut session = session(single());
        let mut sink = MemorySink::default();

        let output = run_script(&mut session, &mut sink, "1=best 2=great\n3=good\nnext\n");

        assert!(output.contains("unknown label `great`"));
        assert!(output.contains("between 1 and 2"));
        assert!(sink.rows.is_empty());
    }

    #[test]
    fn end_of_input_saves_pending_labels() {
        let mut session = session(single());
        let mut sink = MemorySink::default();

        run_script(&mut session, &mut sink, "2=unknown\n");

        assert_eq!(sink.rows.len(), 1);
        assert!(sink.rows[0].labels.contains(&"unknown".to_string()));
    }

    #[test]
    fn cleared_label_is_not_written() {
        let mut session = session(single());
        let mut sink = MemorySink::default();

        run_script(&mut session, &mut sink, "1=bad\n1=\nnext\nquit\n");

        assert!(sink.rows.is_empty());
    }

    #[test]
    fn filter_command_flushes_staged_labels() {
        let mut records = single();
        records.push(SourceRecord::new(
            "Bonjour",
            SourceLang::Fr,
            "Hello",
            vec!["Hi".to_string(), "Good day".to_string()],
            "web",
        ));
        let mut session = session(records);
        let mut sink = MemorySink::default();

        let output = run_script(&mut session, &mut sink, "1=good\nfilter french\nquit\n");

        assert_eq!(sink.rows.len(), 1);
        assert!(output.contains("Filter set to french."));
        assert_eq!(session.filter(), LanguageFilter::French);
    }
}
