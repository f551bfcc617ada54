use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{info, warn};

use crate::cli::MergeArgs;
use crate::model::{MergeInput, MergeManifest};
use crate::table::{format_csv_row, parse_csv};
use crate::util::{ensure_parent_directory, now_utc_string, sha256_file, write_json_pretty};

const INPUT_COLUMNS: [&str; 5] = [
    "source",
    "target",
    "source_lang",
    "translator_name",
    "translated_text",
];

/// Columns of a merged group that are not translator outputs.
const FIXED_COLUMNS: [&str; 4] = ["source", "source_lang", "translation_bureau", "corpus_type"];

/// One source text with every translator's output, as pivoted from an export.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceGroup {
    source: String,
    source_lang: String,
    reference: String,
    corpus_type: String,
    translations: BTreeMap<String, String>,
}

pub fn run(args: MergeArgs) -> Result<()> {
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        let mut path = args.output_path.clone().into_os_string();
        path.push(".manifest.json");
        PathBuf::from(path)
    });

    info!(input_dir = %args.input_dir.display(), "starting merge");

    let manifest = merge_directory(&args.input_dir, &args.output_path)?;
    write_json_pretty(&manifest_path, &manifest)?;

    for (corpus_type, count) in &manifest.corpus_counts {
        info!(corpus_type = %corpus_type, rows = count, "corpus rows");
    }
    info!(
        path = %args.output_path.display(),
        rows = manifest.row_count,
        translators = manifest.translator_columns.len(),
        manifest = %manifest_path.display(),
        "merge completed"
    );

    Ok(())
}

pub fn merge_directory(input_dir: &Path, output_path: &Path) -> Result<MergeManifest> {
    let pattern = Regex::new(r"^(.+?)_translation_comparison_(.+?)\.csv$")
        .context("failed to compile comparison export filename regex")?;

    let exports = discover_exports(input_dir, &pattern)?;
    if exports.is_empty() {
        bail!(
            "no files matching *_translation_comparison_*.csv found in {}",
            input_dir.display()
        );
    }

    let mut inputs = Vec::with_capacity(exports.len());
    let mut groups = Vec::new();
    for (path, corpus_type) in exports {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        info!(file = %filename, corpus_type = %corpus_type, "processing export");

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_groups = group_export(&raw, &corpus_type)
            .with_context(|| format!("failed to pivot {}", path.display()))?;

        inputs.push(MergeInput {
            filename,
            corpus_type,
            sha256: sha256_file(&path)?,
            source_groups: file_groups.len(),
        });
        groups.extend(file_groups);
    }

    let translator_columns = translator_columns(&groups);
    write_merged(output_path, &groups, &translator_columns)?;

    let mut corpus_counts = BTreeMap::new();
    for group in &groups {
        *corpus_counts.entry(group.corpus_type.clone()).or_insert(0) += 1;
    }

    Ok(MergeManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        input_directory: input_dir.display().to_string(),
        output_path: output_path.display().to_string(),
        inputs,
        translator_columns,
        row_count: groups.len(),
        corpus_counts,
    })
}

/// Matching exports sorted by filename, each with the corpus type taken from
/// its name.
fn discover_exports(input_dir: &Path, pattern: &Regex) -> Result<Vec<(PathBuf, String)>> {
    let mut exports = Vec::new();

    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(corpus_type) = pattern
            .captures(name)
            .and_then(|captures| captures.get(2))
            .map(|m| m.as_str().to_string())
        {
            exports.push((path, corpus_type));
        }
    }

    exports.sort();
    Ok(exports)
}

/// Pivots one export (one row per source and translator) into one group per
/// source. Consecutive rows with the same source form a group; a source that
/// reappears later replaces its earlier group in place.
fn group_export(raw: &str, corpus_type: &str) -> Result<Vec<SourceGroup>> {
    let mut rows = parse_csv(raw)
        .map_err(anyhow::Error::msg)
        .context("malformed CSV")?
        .into_iter();
    let header = rows.next().context("export is empty")?;

    let columns: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(index, name)| (name.trim(), index))
        .collect();
    let mut indices = [0_usize; 5];
    for (slot, name) in INPUT_COLUMNS.iter().enumerate() {
        indices[slot] = *columns
            .get(name)
            .with_context(|| format!("export is missing column `{name}`"))?;
    }
    let [source_col, target_col, lang_col, translator_col, text_col] = indices;

    let mut groups: Vec<SourceGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut current: Option<SourceGroup> = None;

    let mut finish = |group: SourceGroup, groups: &mut Vec<SourceGroup>| {
        match positions.get(&group.source) {
            Some(&position) => {
                warn!(source = %group.source, "source reappears in export; keeping the later group");
                groups[position] = group;
            }
            None => {
                positions.insert(group.source.clone(), groups.len());
                groups.push(group);
            }
        }
    };

    for (index, row) in rows.enumerate() {
        let cell = |col: usize| -> Result<&str> {
            row.get(col)
                .map(String::as_str)
                .with_context(|| format!("row {} is missing column {}", index + 1, col + 1))
        };
        let source = cell(source_col)?;

        if current.as_ref().is_some_and(|group| group.source != source) {
            if let Some(done) = current.take() {
                finish(done, &mut groups);
            }
        }

        if current.is_none() {
            current = Some(SourceGroup {
                source: source.to_string(),
                source_lang: cell(lang_col)?.to_string(),
                reference: cell(target_col)?.to_string(),
                corpus_type: corpus_type.to_string(),
                translations: BTreeMap::new(),
            });
        }
        let Some(group) = current.as_mut() else {
            continue;
        };

        let translator = cell(translator_col)?.trim();
        if translator.is_empty() {
            continue;
        }
        if FIXED_COLUMNS.contains(&translator) {
            bail!("row {}: translator name `{translator}` collides with a fixed column", index + 1);
        }
        group
            .translations
            .insert(translator.to_string(), cell(text_col)?.to_string());
    }

    if let Some(done) = current.take() {
        finish(done, &mut groups);
    }

    Ok(groups)
}

fn translator_columns(groups: &[SourceGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|group| group.translations.keys().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

fn write_merged(path: &Path, groups: &[SourceGroup], translators: &[String]) -> Result<()> {
    ensure_parent_directory(path)
        .with_context(|| format!("failed to create parent directory for {}", path.display()))?;

    let mut header = vec!["source", "source_lang", "translation_bureau"];
    header.extend(translators.iter().map(String::as_str));
    header.push("corpus_type");

    let mut out = format_csv_row(&header);
    for group in groups {
        let mut cells = vec![
            group.source.as_str(),
            group.source_lang.as_str(),
            group.reference.as_str(),
        ];
        cells.extend(translators.iter().map(|name| {
            group
                .translations
                .get(name)
                .map(String::as_str)
                .unwrap_or("")
        }));
        cells.push(group.corpus_type.as_str());
        out.push_str(&format_csv_row(&cells));
    }

    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = groups.len(), "wrote merged dataset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::model::SourceLang;
    use crate::schema::CandidateSchema;

    const EXPORT_HEADER: &str = "source,target,source_lang,other_lang,translator_name,translated_text\n";

    #[test]
    fn group_export_pivots_consecutive_rows_per_source() {
        let raw = format!(
            "{EXPORT_HEADER}\
             Hello,Bonjour,en,fr,opus_mt_base,Salut\n\
             Hello,Bonjour,en,fr,nllb_3b,Allo\n\
             Thanks,Merci,en,fr,opus_mt_base,\"Merci, bien\"\n"
        );

        let groups = group_export(&raw, "news").expect("export pivots");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source, "Hello");
        assert_eq!(groups[0].reference, "Bonjour");
        assert_eq!(groups[0].source_lang, "en");
        assert_eq!(groups[0].corpus_type, "news");
        assert_eq!(groups[0].translations.len(), 2);
        assert_eq!(groups[1].translations["opus_mt_base"], "Merci, bien");
    }

    #[test]
    fn group_export_keeps_first_position_for_reappearing_source() {
        let raw = format!(
            "{EXPORT_HEADER}\
             A,a-ref,en,fr,sys1,first\n\
             B,b-ref,en,fr,sys1,b\n\
             A,a-ref2,en,fr,sys2,second\n"
        );

        let groups = group_export(&raw, "web").expect("export pivots");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source, "A");
        assert_eq!(groups[0].reference, "a-ref2");
        assert!(groups[0].translations.contains_key("sys2"));
        assert!(!groups[0].translations.contains_key("sys1"));
        assert_eq!(groups[1].source, "B");
    }

    #[test]
    fn group_export_requires_input_columns() {
        let err = group_export("source,target\nA,B\n", "web").expect_err("columns missing");
        assert!(format!("{err:#}").contains("source_lang"));
    }

    #[test]
    fn merge_directory_writes_loadable_dataset_and_manifest_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("translation_results");
        fs::create_dir_all(&input).expect("mkdir");
        fs::write(
            input.join("run1_translation_comparison_news.csv"),
            format!(
                "{EXPORT_HEADER}\
                 Hello,Bonjour,en,fr,opus_mt_base,Salut\n\
                 Hello,Bonjour,en,fr,nllb_3b,Allo\n"
            ),
        )
        .expect("write export");
        fs::write(
            input.join("run1_translation_comparison_gov.csv"),
            format!("{EXPORT_HEADER}Merci,Thanks,fr,en,opus_mt_base,Thank you\n"),
        )
        .expect("write export");
        fs::write(input.join("notes.csv"), "ignored\n").expect("write unrelated");

        let output = dir.path().join("dist").join("merged.csv");
        let manifest = merge_directory(&input, &output).expect("merge succeeds");

        assert_eq!(manifest.row_count, 2);
        assert_eq!(manifest.inputs.len(), 2);
        assert_eq!(manifest.inputs[0].corpus_type, "gov");
        assert_eq!(manifest.translator_columns, vec!["nllb_3b", "opus_mt_base"]);
        assert_eq!(manifest.corpus_counts.get("news"), Some(&1));
        assert_eq!(manifest.corpus_counts.get("gov"), Some(&1));

        let merged = fs::read_to_string(&output).expect("read merged");
        assert!(merged.starts_with(
            "source,source_lang,translation_bureau,nllb_3b,opus_mt_base,corpus_type\n"
        ));

        let schema = CandidateSchema::with_systems(["nllb_3b", "opus_mt_base"]).expect("schema");
        let dataset = Dataset::load(&output, schema).expect("merged output loads");
        assert_eq!(dataset.count(), 2);
        let merci = &dataset.all_records()[0];
        assert_eq!(merci.source, "Merci");
        assert_eq!(merci.source_lang, SourceLang::Fr);
        assert_eq!(merci.presentable_slots(), vec![0, 2]);
    }

    #[test]
    fn merge_directory_fails_without_matching_exports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = merge_directory(dir.path(), &dir.path().join("out.csv"))
            .expect_err("nothing to merge");
        assert!(err.to_string().contains("no files matching"));
    }
}
