//! CLI handler for the anonymize command.

use dump_anonymizer::anonymizer::{AnonymizeConfig, AnonymizeStats, Anonymizer};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Run the anonymize command with the given options
#[allow(clippy::too_many_arguments)]
pub fn run(
    file: PathBuf,
    config: PathBuf,
    output: PathBuf,
    seed: Option<u64>,
    transitive: bool,
    dry_run: bool,
    validate_only: bool,
    json: bool,
    progress: bool,
) -> anyhow::Result<()> {
    let to_stdout = output.as_os_str() == "-";

    let anon_config = AnonymizeConfig::builder()
        .input(file)
        .output(if to_stdout { None } else { Some(output) })
        .config_file(Some(config))
        .seed(seed)
        .transitive(transitive.then_some(true))
        .dry_run(dry_run)
        .build()?;

    if validate_only {
        let anonymizer = Anonymizer::new(anon_config)?;
        let problems = anonymizer.check_rules()?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "valid": problems.is_empty(),
                    "problems": problems,
                }))?
            );
        } else if problems.is_empty() {
            eprintln!("Configuration is valid");
        } else {
            for problem in &problems {
                eprintln!("  - {}", problem.message);
            }
        }
        if !problems.is_empty() {
            anyhow::bail!("configuration has {} problem(s)", problems.len());
        }
        return Ok(());
    }

    let rule_count = anon_config.request.len() as u64;
    let mut anonymizer = Anonymizer::new(anon_config)?;

    let pb = if progress {
        let pb = ProgressBar::new(rule_count);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tables",
            )?
            .progress_chars("█▓▒░  "),
        );
        let pb_clone = pb.clone();
        anonymizer = anonymizer.with_progress(move |n| pb_clone.set_position(n));
        Some(pb)
    } else {
        None
    };

    let stats = anonymizer.run()?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    // Keep stdout clean when the dump goes there
    output_stats(&stats, json, to_stdout && !dry_run)
}

fn output_stats(stats: &AnonymizeStats, json: bool, to_stderr: bool) -> anyhow::Result<()> {
    let report = if json {
        serde_json::to_string_pretty(stats)?
    } else {
        format_stats(stats)
    };

    if to_stderr {
        eprintln!("{}", report);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn format_stats(stats: &AnonymizeStats) -> String {
    let mut out = String::new();
    out.push_str("\nAnonymization complete:\n");
    out.push_str(&format!("  Tables anonymized: {}\n", stats.tables_anonymized));
    out.push_str(&format!("  Rows touched: {}\n", stats.rows_touched));
    out.push_str(&format!("  Values generated: {}\n", stats.values_generated));
    out.push_str(&format!("  Values propagated: {}\n", stats.values_propagated));
    out.push_str(&format!("  Orphans set to NULL: {}\n", stats.orphans_nulled));
    out.push_str(&format!(
        "  INSERT statements: {} written, {} merged\n",
        stats.statements_written, stats.statements_merged
    ));
    out.push_str(&format!("  Elapsed: {} ms", stats.elapsed_ms));

    if !stats.skipped.is_empty() {
        out.push_str("\n\nSkipped:");
        for skipped in &stats.skipped {
            out.push_str(&format!("\n  - {}: {}", skipped.table, skipped.reason));
        }
    }
    out
}
