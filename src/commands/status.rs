use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::console::load_schema;
use crate::dataset::Dataset;
use crate::model::{
    CandidateTally, ComparisonLabel, DatasetStatus, RankLabel, ResultsStatus, StatusReport,
};
use crate::schema::CandidateSchema;
use crate::table::parse_csv;
use crate::util::now_utc_string;

pub fn run(args: StatusArgs) -> Result<()> {
    info!(
        data_path = %args.data_path.display(),
        results_path = %args.results_path.display(),
        "status requested"
    );

    let dataset = if args.data_path.exists() {
        let schema = load_schema(args.schema_path.as_deref())?;
        let status = dataset_status(&args.data_path, schema)?;
        info!(
            path = %status.path,
            records = status.record_count,
            english = status.english_count,
            french = status.french_count,
            "dataset status"
        );
        Some(status)
    } else {
        warn!(path = %args.data_path.display(), "dataset missing");
        None
    };

    let results = if args.results_path.exists() {
        let status = results_status(&args.results_path)?;
        info!(
            path = %status.path,
            rows = status.data_rows,
            ranking = status.ranking_rows,
            comparison = status.comparison_rows,
            unrecognized = status.unrecognized_cells,
            "results status"
        );
        for (candidate, tally) in &status.candidates {
            info!(
                candidate = %candidate,
                best = tally.best,
                good = tally.good,
                bad = tally.bad,
                unknown = tally.unknown,
                better = tally.better,
                worse = tally.worse,
                "candidate tally"
            );
        }
        Some(status)
    } else {
        warn!(path = %args.results_path.display(), "results log missing");
        None
    };

    if args.json {
        let report = StatusReport {
            generated_at: now_utc_string(),
            dataset,
            results,
        };
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to serialize status report")?;
        println!("{rendered}");
    }

    Ok(())
}

fn dataset_status(path: &Path, schema: CandidateSchema) -> Result<DatasetStatus> {
    let dataset = Dataset::load(path, schema)
        .with_context(|| format!("failed to load dataset {}", path.display()))?;
    let (english_count, french_count) = dataset.language_counts();

    Ok(DatasetStatus {
        path: path.display().to_string(),
        sha256: dataset.sha256().unwrap_or_default().to_string(),
        record_count: dataset.count(),
        english_count,
        french_count,
    })
}

/// Tallies a results log against its own header, so logs written with a
/// different candidate schema are still readable.
fn results_status(path: &Path) -> Result<ResultsStatus> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let rows = parse_csv(&raw)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut status = ResultsStatus {
        path: path.display().to_string(),
        data_rows: 0,
        ranking_rows: 0,
        comparison_rows: 0,
        unrecognized_cells: 0,
        candidates: BTreeMap::new(),
    };

    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Ok(status);
    };
    // Candidate columns sit between `source` and `corpus_type`.
    let candidates: Vec<String> = header
        .iter()
        .skip(1)
        .take(header.len().saturating_sub(2))
        .map(|name| name.trim().to_string())
        .collect();
    for name in &candidates {
        status.candidates.insert(name.clone(), CandidateTally::default());
    }

    for row in rows {
        status.data_rows += 1;
        let cells: Vec<&str> = (0..candidates.len())
            .map(|index| row.get(index + 1).map(|cell| cell.trim()).unwrap_or(""))
            .collect();

        let is_comparison = cells.iter().any(|cell| {
            *cell == ComparisonLabel::Better.as_str() || *cell == ComparisonLabel::Worse.as_str()
        });
        if is_comparison {
            status.comparison_rows += 1;
        } else {
            status.ranking_rows += 1;
        }

        for (name, cell) in candidates.iter().zip(cells) {
            if cell.is_empty() {
                continue;
            }
            let Some(tally) = status.candidates.get_mut(name) else {
                continue;
            };
            if is_comparison {
                if cell == ComparisonLabel::Better.as_str() {
                    tally.better += 1;
                } else if cell == ComparisonLabel::Worse.as_str() {
                    tally.worse += 1;
                } else {
                    status.unrecognized_cells += 1;
                }
                continue;
            }
            match RankLabel::parse_cell(cell) {
                Ok(Some(RankLabel::Good)) => tally.good += 1,
                Ok(Some(RankLabel::Bad)) => tally.bad += 1,
                Ok(Some(RankLabel::Best)) => tally.best += 1,
                Ok(Some(RankLabel::Unknown)) => tally.unknown += 1,
                Ok(None) => {}
                Err(_) => status.unrecognized_cells += 1,
            }
        }
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_status_separates_ranking_and_comparison_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.csv");
        fs::write(
            &path,
            "source,translation_bureau,sysA,sysB,corpus_type\n\
             Hi,best,good,,news\n\
             Hi,,better,worse,news\n\
             Bye,unknown,bad,great,web\n",
        )
        .expect("write results");

        let status = results_status(&path).expect("status computed");

        assert_eq!(status.data_rows, 3);
        assert_eq!(status.ranking_rows, 2);
        assert_eq!(status.comparison_rows, 1);
        assert_eq!(status.unrecognized_cells, 1);
        assert_eq!(status.candidates.len(), 3);

        let reference = &status.candidates["translation_bureau"];
        assert_eq!((reference.best, reference.unknown), (1, 1));
        let sys_a = &status.candidates["sysA"];
        assert_eq!((sys_a.good, sys_a.bad, sys_a.better), (1, 1, 1));
        assert_eq!(status.candidates["sysB"].worse, 1);
    }

    #[test]
    fn results_status_of_header_only_log_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.csv");
        fs::write(&path, "source,translation_bureau,corpus_type\n").expect("write results");

        let status = results_status(&path).expect("status computed");

        assert_eq!(status.data_rows, 0);
        assert_eq!(status.candidates.len(), 1);
    }

    #[test]
    fn run_tolerates_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = StatusArgs {
            data_path: dir.path().join("missing.csv"),
            results_path: dir.path().join("missing_results.csv"),
            schema_path: None,
            json: false,
        };

        run(args).expect("missing files are reported, not fatal");
    }
}
