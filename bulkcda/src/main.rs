//! # bulkcda
//!
//! Cross-drive analysis for bulk_extractor reports.
//!
//! ## Overview
//!
//! bulkcda is built on top of bulkcdalib and provides a command-line interface
//! for comparing the reports of many drives. Reports may be output directories
//! or zip archives, mixed freely.
//!
//! ## Features
//!
//! - **Correlation**: which emails, card numbers and phone numbers appear on which drives
//! - **Stoplists**: `--makestop` writes the features found on too many drives
//! - **Affinity**: `--idcor` ranks drive pairs by the rare features they share
//! - **Histogram diff**: compare two scans of the same evidence
//! - **Multiple output formats**: Table (default), JSON
//!
//! ## Usage
//!
//! ```bash
//! # Summary of a correlation run over three reports
//! bulkcda disk1/ disk2.zip disk3/
//!
//! # Write a stoplist of features on at least half of the drives
//! bulkcda --makestop stoplist.txt --threshold 0.5 reports/*
//!
//! # Rank drive pairs by shared identities
//! bulkcda --idcor --idfeatures email,telephone reports/*
//!
//! # What grew between two scans
//! bulkcda diff before/ after/
//!
//! # Version, image, scanner timings and member sizes of one report
//! bulkcda info disk1.zip
//!
//! # Check that every line of every member is UTF-8
//! bulkcda validate --strict disk1/ disk2.zip
//! ```

mod render;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use bulkcdalib::data::DEFAULT_THRESHOLD;
use bulkcdalib::{
    analyze_matching, analyze_report, correlate, diff_reports, rank_all_pairs, validate_matching,
    validate_report, write_stoplist, AffinityScore, CorrelateOptions, DiffOptions, ReportSource,
    ReportTable, RunReport, StoplistReport,
};
use clap::error::ErrorKind;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use render::{render_json, render_table, render_tables, OutputMode};

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("bulkcda")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Cross-drive analysis of bulk_extractor reports")
        .args_conflicts_with_subcommands(true)
        .subcommand_negates_reqs(true)
        .arg(
            Arg::new("reports")
                .value_name("REPORTS")
                .help("Report directories or zip archives, one per drive")
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("makestop")
                .long("makestop")
                .value_name("FILE")
                .help("Write a stoplist of over-common features (FILE must not exist)"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_name("FRAC")
                .value_parser(value_parser!(f64))
                .default_value("0.667")
                .help("Fraction of drives a feature must reach to be stoplisted"),
        )
        .arg(
            Arg::new("idfeatures")
                .long("idfeatures")
                .value_name("LIST")
                .default_value("email,ccn,telephone")
                .help("Comma-separated feature categories to correlate"),
        )
        .arg(
            Arg::new("idcor")
                .long("idcor")
                .action(ArgAction::SetTrue)
                .help("Rank drive pairs by shared identity features"),
        )
        .arg(
            Arg::new("netmap")
                .long("netmap")
                .action(ArgAction::SetTrue)
                .help("Accepted for compatibility; has no effect"),
        )
        .arg(
            Arg::new("histograms")
                .long("histograms")
                .action(ArgAction::SetTrue)
                .help("Read <category>_histogram.txt instead of <category>.txt"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Require exactly two tabs on every feature line"),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .action(ArgAction::SetTrue)
                .help("Show per-category drive counts"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .global(true)
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Output format"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log progress to stderr"),
        )
        .subcommand(
            Command::new("diff")
                .about("Show histogram differences between two reports")
                .arg(
                    Arg::new("pre")
                        .value_name("PRE")
                        .help("Report before")
                        .required(true),
                )
                .arg(
                    Arg::new("post")
                        .value_name("POST")
                        .help("Report after")
                        .required(true),
                )
                .arg(
                    Arg::new("smaller")
                        .long("smaller")
                        .action(ArgAction::SetTrue)
                        .help("Also show features that stayed the same or got smaller"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Summarise one report: version, image, scanner timings, member sizes")
                .arg(
                    Arg::new("report")
                        .value_name("REPORT")
                        .help("Report directory or zip archive")
                        .required(true),
                )
                .arg(members_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check that every line of every report member is valid UTF-8")
                .arg(
                    Arg::new("reports")
                        .value_name("REPORTS")
                        .help("Report directories or zip archives")
                        .num_args(1..)
                        .required(true),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Also require exactly two tabs on every feature line"),
                )
                .arg(members_arg()),
        )
}

/// `--members <GLOB>` for commands that look inside one report at a time
fn members_arg() -> Arg {
    Arg::new("members")
        .long("members")
        .value_name("GLOB")
        .help("Only look at report members matching this glob pattern (e.g. 'email*')")
}

/// Set up tracing on stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Open every report named by an argument
fn open_reports(matches: &ArgMatches, id: &str) -> anyhow::Result<Vec<ReportSource>> {
    matches
        .get_many::<String>(id)
        .into_iter()
        .flatten()
        .map(|path| ReportSource::open(path).with_context(|| format!("opening {path}")))
        .collect()
}

/// JSON document for a correlation run
#[derive(Debug, Serialize)]
struct CorrelateOutput<'a> {
    report: &'a RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    stoplist: Option<&'a StoplistReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    affinity: Option<&'a [AffinityScore]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stats: Vec<ReportTable>,
}

/// Handler for the default (correlate) command
fn correlate_handler(matches: &ArgMatches, mode: OutputMode) -> anyhow::Result<String> {
    let threshold = matches
        .get_one::<f64>("threshold")
        .copied()
        .unwrap_or(DEFAULT_THRESHOLD);
    let categories = matches
        .get_one::<String>("idfeatures")
        .map(String::as_str)
        .unwrap_or("email,ccn,telephone");

    let options = CorrelateOptions::new()
        .category_list(categories)?
        .threshold(threshold)
        .use_histograms(matches.get_flag("histograms"))
        .strict(matches.get_flag("strict"));
    options.validate()?;

    if matches.get_flag("netmap") {
        warn!("--netmap is not supported and is ignored");
    }

    let makestop = matches.get_one::<String>("makestop");
    if let Some(path) = makestop {
        if Path::new(path).exists() {
            bail!("{path}: file exists");
        }
    }

    let sources = open_reports(matches, "reports")?;
    info!(reports = sources.len(), "correlating");
    let result = correlate(&sources, &options)?;

    let stoplist = match makestop {
        Some(path) => {
            let stoplist =
                StoplistReport::build(&result.indices, result.total_drive_count, options.threshold);
            write_stoplist(path, &stoplist.features).with_context(|| format!("writing {path}"))?;
            info!(features = stoplist.len(), %path, "stoplist written");
            Some(stoplist)
        }
        None => None,
    };

    let affinity = matches
        .get_flag("idcor")
        .then(|| rank_all_pairs(&result.indices, &result.drives()));

    let stats: Vec<ReportTable> = if matches.get_flag("stats") {
        result
            .indices
            .iter()
            .map(|index| ReportTable::from_index_stats(index, None))
            .collect()
    } else {
        Vec::new()
    };

    if mode.is_structured() {
        return render_json(&CorrelateOutput {
            report: &result.report,
            stoplist: stoplist.as_ref(),
            affinity: affinity.as_deref(),
            stats,
        });
    }

    let mut tables = vec![ReportTable::from_run_report(&result.report)];
    tables.extend(stats);
    if let Some(stoplist) = &stoplist {
        tables.push(ReportTable::from_stoplist(stoplist));
    }
    if let Some(ranking) = &affinity {
        tables.push(ReportTable::from_affinity(ranking, None));
    }
    Ok(render_tables(&tables))
}

/// Handler for the diff command
fn diff_handler(matches: &ArgMatches, mode: OutputMode) -> anyhow::Result<String> {
    let open = |id: &str| -> anyhow::Result<ReportSource> {
        let path = matches
            .get_one::<String>(id)
            .with_context(|| format!("missing <{}> report", id.to_uppercase()))?;
        ReportSource::open(path).with_context(|| format!("opening {path}"))
    };
    let pre = open("pre")?;
    let post = open("post")?;

    let options = DiffOptions::new().smaller(matches.get_flag("smaller"));
    let result = diff_reports(&pre, &post, &options)?;

    if mode.is_structured() {
        return render_json(&result);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "PRE Image:  {}\n",
        result.pre_image.as_deref().unwrap_or("(unknown)")
    ));
    out.push_str(&format!(
        "POST Image: {}\n",
        result.post_image.as_deref().unwrap_or("(unknown)")
    ));
    if !result.only_in_pre.is_empty() {
        out.push_str(&format!(
            "Files only in {}:\n   {}\n",
            result.pre_name,
            result.only_in_pre.join(" ")
        ));
    }
    if !result.only_in_post.is_empty() {
        out.push_str(&format!(
            "Files only in {}:\n   {}\n",
            result.post_name,
            result.only_in_post.join(" ")
        ));
    }
    for histogram in &result.histograms {
        out.push('\n');
        if histogram.rows.is_empty() {
            if histogram.no_differences() {
                out.push_str(&format!("{}: No differences\n", histogram.name));
            }
            continue;
        }
        out.push_str(&render_table(&ReportTable::from_histogram_diff(histogram)));
    }
    Ok(out)
}

/// Handler for the info command
fn info_handler(matches: &ArgMatches, mode: OutputMode) -> anyhow::Result<String> {
    let path = matches
        .get_one::<String>("report")
        .context("missing <REPORT>")?;
    let source = ReportSource::open(path).with_context(|| format!("opening {path}"))?;
    let summary = match matches.get_one::<String>("members") {
        Some(pattern) => analyze_matching(&source, pattern)?,
        None => analyze_report(&source)?,
    };

    if mode.is_structured() {
        return render_json(&summary);
    }

    let mut out = format!("Analyze {}\n", summary.name);
    out.push_str(&format!(
        "bulk_extractor version: {}\n",
        summary.version.as_deref().unwrap_or("(unknown)")
    ));
    out.push_str(&format!(
        "Filename:               {}\n\n",
        summary.image.as_deref().unwrap_or("(unknown)")
    ));
    out.push_str(&render_tables(&[
        ReportTable::from_scanner_times(&summary),
        ReportTable::from_histogram_files(&summary),
        ReportTable::from_feature_files(&summary),
    ]));
    Ok(out)
}

/// Handler for the validate command
fn validate_handler(matches: &ArgMatches, mode: OutputMode) -> anyhow::Result<String> {
    let strict = matches.get_flag("strict");
    let pattern = matches.get_one::<String>("members");
    let reports = open_reports(matches, "reports")?
        .iter()
        .map(|source| match pattern {
            Some(pattern) => validate_matching(source, pattern, strict),
            None => validate_report(source, strict),
        })
        .collect::<bulkcdalib::Result<Vec<_>>>()?;

    if mode.is_structured() {
        return render_json(&reports);
    }

    let mut out = String::new();
    for report in &reports {
        out.push_str(&render_table(&ReportTable::from_validation(report)));
        for member in &report.members {
            for problem in &member.problems {
                out.push_str(&format!(
                    "{}:{} {}\n",
                    member.member,
                    problem.line(),
                    describe(problem)
                ));
            }
        }
        out.push('\n');
    }
    Ok(out)
}

fn describe(problem: &bulkcdalib::data::LineProblem) -> String {
    use bulkcdalib::data::LineProblem;
    match problem {
        LineProblem::InvalidUtf8 { bytes, .. } => format!("invalid UTF-8: {bytes}"),
        LineProblem::InvalidFeatureLine { text, .. } => {
            format!("invalid feature file line: {text}")
        }
    }
}

fn run(matches: &ArgMatches) -> anyhow::Result<String> {
    let mode = OutputMode::from_arg(matches.get_one::<String>("output").map(String::as_str));
    match matches.subcommand() {
        Some(("diff", sub)) => diff_handler(sub, mode),
        Some(("info", sub)) => info_handler(sub, mode),
        Some(("validate", sub)) => validate_handler(sub, mode),
        _ => correlate_handler(matches, mode),
    }
}

fn main() -> ExitCode {
    let matches = match build_command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_logging(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(output) => {
            print!("{}", output);
            if !output.is_empty() && !output.ends_with('\n') {
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        build_command().debug_assert();
    }

    #[test]
    fn test_default_command_parses_reports() {
        let matches = build_command()
            .try_get_matches_from(["bulkcda", "--idcor", "-o", "json", "a", "b.zip"])
            .unwrap();
        let reports: Vec<&String> = matches.get_many::<String>("reports").unwrap().collect();
        assert_eq!(reports, vec!["a", "b.zip"]);
        assert!(matches.get_flag("idcor"));
        assert_eq!(matches.get_one::<f64>("threshold"), Some(&0.667));
        assert!(matches.subcommand().is_none());
    }

    #[test]
    fn test_subcommand_does_not_need_reports() {
        let matches = build_command()
            .try_get_matches_from(["bulkcda", "diff", "pre", "post", "--smaller"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "diff");
        assert!(sub.get_flag("smaller"));
    }

    #[test]
    fn test_members_pattern_on_report_commands() {
        let matches = build_command()
            .try_get_matches_from(["bulkcda", "validate", "--members", "email*", "r1", "r2"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(
            sub.get_one::<String>("members").map(String::as_str),
            Some("email*")
        );

        let matches = build_command()
            .try_get_matches_from(["bulkcda", "info", "r1"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_one::<String>("members").is_none());
    }

    #[test]
    fn test_missing_reports_is_an_error() {
        let err = build_command().try_get_matches_from(["bulkcda"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_threshold_must_be_a_number() {
        let err = build_command()
            .try_get_matches_from(["bulkcda", "--threshold", "lots", "a"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }
}
