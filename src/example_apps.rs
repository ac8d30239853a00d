use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, error::ErrorKind};

use crate::bucket_index::BucketIndex;
use crate::config::IngestionConfig;
use crate::data::SubmissionRecord;
use crate::ingestion::IngestionManager;
use crate::interner::LabelInterner;
use crate::label_store::FileLabelStore;
use crate::metrics::{bucket_coverage, source_skew};
use crate::redaction::RedactionPolicy;

#[derive(Debug, Parser)]
#[command(
    name = "score_submissions",
    disable_help_subcommand = true,
    about = "Aggregate submissions into buckets and print quadratic scores",
    long_about = "Read JSON-lines submission records, aggregate bytes per (source, label, time bucket), and print each miner's total scorable bytes.",
    after_help = "Output never includes label text, URIs, or time bucket ids. Use --pseudonym-seed to hide miner ids as well."
)]
/// CLI for `score_submissions`.
///
/// Common usage:
/// - Score a file with an ephemeral label table: `--input submissions.jsonl`
/// - Keep label ids stable across runs: `--label-store-path .scoring_store`
/// - Hide miner ids: `--pseudonym-seed 7 --pseudonym-epoch 3`
struct ScoreSubmissionsCli {
    #[arg(long, value_name = "PATH", help = "JSON-lines file of submission records")]
    input: PathBuf,
    #[arg(
        long = "label-store-path",
        value_name = "PATH",
        help = "Optional persistent label table (file path or directory)"
    )]
    label_store_path: Option<PathBuf>,
    #[arg(
        long = "pseudonym-seed",
        help = "Replace miner ids with seeded pseudonyms in output"
    )]
    pseudonym_seed: Option<u64>,
    #[arg(
        long = "pseudonym-epoch",
        default_value_t = 0,
        help = "Rotation epoch for pseudonyms"
    )]
    pseudonym_epoch: u64,
    #[arg(
        long,
        default_value_t = 10,
        value_parser = parse_positive_usize,
        help = "Number of leaderboard rows to print"
    )]
    top: usize,
    #[arg(
        long = "allow-duplicate-uris",
        help = "Count repeated URIs in the same bucket instead of skipping them"
    )]
    allow_duplicate_uris: bool,
}

/// Run the `score_submissions` CLI over `args_iter` (program name excluded).
pub fn run_score_submissions<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<ScoreSubmissionsCli, _>(
        std::iter::once("score_submissions".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let redaction = match cli.pseudonym_seed {
        Some(seed) => RedactionPolicy::pseudonymous(seed).rotated(cli.pseudonym_epoch),
        None => RedactionPolicy::plain(),
    };
    let config = IngestionConfig {
        reject_duplicate_uris: !cli.allow_duplicate_uris,
        redaction,
        ..IngestionConfig::default()
    };
    let labels = match &cli.label_store_path {
        Some(path) => {
            let store = Arc::new(FileLabelStore::open(path.clone())?);
            Arc::new(LabelInterner::open(store, config.max_labels)?)
        }
        None => Arc::new(LabelInterner::with_capacity_limit(config.max_labels)),
    };
    let manager = IngestionManager::with_components(labels, Arc::new(BucketIndex::new()), config)?;

    let records = read_submissions(&cli.input)?;
    let report = manager.submit_batch(&records);
    println!("=== ingestion ===");
    println!("records     : {}", records.len());
    println!("accepted    : {}", report.accepted);
    println!("duplicates  : {}", report.duplicates);
    println!("rejected    : {}", report.rejected);
    println!("bytes       : {}", report.accepted_bytes);
    println!("labels      : {}", manager.labels().size());

    let round = manager.score_round()?;
    let coverage = bucket_coverage(&round.snapshot);
    println!();
    println!("=== coverage ===");
    println!("buckets              : {}", coverage.buckets);
    println!("miners               : {}", coverage.miners);
    println!("mean contributors    : {:.2}", coverage.mean_contributors);
    println!("single-contributor   : {}", coverage.single_contributor_buckets);
    if let Some(skew) = source_skew(&round.snapshot) {
        for share in &skew.per_source {
            println!(
                "  {:<8} {:>14} bytes ({:>6.2}%)",
                share.source.as_str(),
                share.bytes,
                share.share * 100.0
            );
        }
    }

    println!();
    println!("=== top {} miners ===", cli.top);
    for (rank, (miner_id, value)) in round.scores.ranked().into_iter().take(cli.top).enumerate() {
        println!(
            "{:>3}. {:<40} {:>16.2}",
            rank + 1,
            manager.config().redaction.miner_handle(miner_id),
            value
        );
    }
    Ok(())
}

fn read_submissions(path: &Path) -> Result<Vec<SubmissionRecord>, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // Parse errors are reported by line number only; serde messages may echo field values.
        let record: SubmissionRecord = serde_json::from_str(line.trim())
            .map_err(|_| format!("line {} is not a valid submission record", line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse --top value '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("--top must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_positive_usize_rejects_zero() {
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_usize("abc").is_err());
        assert_eq!(parse_positive_usize("3").unwrap(), 3);
    }

    #[test]
    fn help_flag_exits_cleanly() {
        let result = run_score_submissions(["--help".to_string()].into_iter());
        assert!(result.is_ok());
    }

    #[test]
    fn scores_a_jsonl_file_with_persistent_labels() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("submissions.jsonl");
        let mut file = File::create(&input).unwrap();
        writeln!(
            file,
            r#"{{"miner_id":"m1","source":"Reddit","label":{{"text":"r/rust"}},"time_bucket_id":1,"content_size_bytes":300}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r##"{{"miner_id":"m2","source":"X","label":{{"text":"#rust"}},"time_bucket_id":1,"content_size_bytes":100,"uri":"https://x.com/1"}}"##
        )
        .unwrap();
        drop(file);

        let store_dir = dir.path().join("store");
        std::fs::create_dir_all(&store_dir).unwrap();
        let args = vec![
            "--input".to_string(),
            input.to_string_lossy().into_owned(),
            "--label-store-path".to_string(),
            store_dir.to_string_lossy().into_owned(),
            "--pseudonym-seed".to_string(),
            "7".to_string(),
        ];
        run_score_submissions(args.clone().into_iter()).unwrap();
        run_score_submissions(args.into_iter()).unwrap();

        let store = FileLabelStore::open(store_dir.join("labels.bin")).unwrap();
        let labels = LabelInterner::open(Arc::new(store), 16).unwrap();
        assert_eq!(labels.size(), 2);
        assert!(labels.contains("r/rust"));
        assert!(labels.contains("#rust"));
    }

    #[test]
    fn malformed_lines_report_the_line_number() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.jsonl");
        std::fs::write(&input, "{\"miner_id\": \"m1\"}\n").unwrap();
        let err = read_submissions(&input).unwrap_err();
        assert_eq!(err.to_string(), "line 1 is not a valid submission record");
    }
}
