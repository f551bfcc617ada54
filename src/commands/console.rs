use std::fmt::Display;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::SessionArgs;
use crate::dataset::Dataset;
use crate::model::LanguageFilter;
use crate::schema::CandidateSchema;
use crate::sink::CsvResultSink;

pub(crate) struct Engine {
    pub dataset: Arc<Dataset>,
    pub sink: CsvResultSink,
}

/// Loads the dataset and prepares the results file. Any failure here is
/// fatal: no session is built on a partially loaded table.
pub(crate) fn load_engine(args: &SessionArgs) -> Result<Engine> {
    let schema = load_schema(args.schema_path.as_deref())?;
    let dataset = Dataset::load(&args.data_path, schema)
        .with_context(|| format!("failed to load dataset {}", args.data_path.display()))?;

    let (english, french) = dataset.language_counts();
    info!(
        sha256 = dataset.sha256().unwrap_or_default(),
        english,
        french,
        "dataset ready"
    );

    let sink = CsvResultSink::open(&args.results_path, dataset.schema())
        .with_context(|| format!("failed to open results {}", args.results_path.display()))?;

    Ok(Engine {
        dataset: Arc::new(dataset),
        sink,
    })
}

pub(crate) fn load_schema(path: Option<&Path>) -> Result<CandidateSchema> {
    match path {
        Some(path) => {
            let schema = CandidateSchema::load(path)
                .with_context(|| format!("failed to load candidate schema {}", path.display()))?;
            info!(path = %path.display(), candidates = schema.len(), "loaded candidate schema");
            Ok(schema)
        }
        None => Ok(CandidateSchema::default()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Quit,
    Next,
    Show,
    Filter(LanguageFilter),
    Input(String),
}

pub(crate) fn parse_command(line: &str) -> Result<Command, String> {
    let mut tokens = line.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(Command::Show);
    };

    match head.to_ascii_lowercase().as_str() {
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        "next" | "n" | "skip" => Ok(Command::Next),
        "show" => Ok(Command::Show),
        "filter" | "f" => {
            let value = tokens
                .next()
                .ok_or_else(|| "usage: filter <both|english|french>".to_string())?;
            value.parse::<LanguageFilter>().map(Command::Filter)
        }
        _ => Ok(Command::Input(line.trim().to_string())),
    }
}

/// Line-oriented terminal used by the interactive front ends.
pub(crate) struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prompts and reads one line; `None` at end of input.
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}").context("failed to write prompt")?;
        self.output.flush().context("failed to flush prompt")?;

        let mut line = String::new();
        let count = self
            .input
            .read_line(&mut line)
            .context("failed to read console input")?;
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    pub fn say(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.output, "{text}").context("failed to write console output")
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}
