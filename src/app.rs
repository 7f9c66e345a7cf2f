//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - runs the ingest/fit/projection pipeline
//! - writes the report bundle and optional exports
//! - prints terminal diagnostics

use std::fs;

use clap::Parser;

use crate::cli::{AddArgs, Command, RunArgs, SampleArgs};
use crate::data::{generate_sample, starter_notes, SampleConfig};
use crate::domain::{Measurement, ReportConfig};
use crate::error::{AppError, EXIT_INPUT};
use crate::plot::{render_chart, ChartScale, ChartSpec};
use crate::report::{
    build_context, format_crossing, format_run_summary, render_report_markdown, render_sections,
    report_stem, ReportDocument,
};

pub mod pipeline;

/// Entry point for the `flc` binary.
pub fn run() -> Result<(), AppError> {
    // We want `flc` and `flc --data lab.json` to behave like `flc report ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of
    // the argv list before parsing. This preserves a clean clap structure
    // while retaining the requested UX.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Report(args) => cmd_report(args),
        Command::Fit(args) => cmd_fit(args),
        Command::Project(args) => cmd_project(args),
        Command::Add(args) => cmd_add(args),
        Command::Sample(args) => cmd_sample(args),
    }
}

fn cmd_report(args: RunArgs) -> Result<(), AppError> {
    let config = report_config_from_args(&args);
    let run = pipeline::run_analysis(&config)?;

    let notes = crate::io::notes::load_notes_file(&config.notes_path)?;
    let ctx = build_context(
        &run.ingest.stats,
        &run.ingest.spec,
        &run.pre,
        &run.post,
        run.pre_horizon_value,
        &run.crossings,
    );
    let sections = render_sections(&notes, &ctx)?;

    fs::create_dir_all(&config.out_dir).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!(
                "Failed to create output directory '{}': {e}",
                config.out_dir.display()
            ),
        )
    })?;

    let stem = report_stem(run.ingest.stats.date_max);
    let linear_name = format!("{stem}_linear.svg");
    let log_name = format!("{stem}_log.svg");

    if !config.no_charts {
        let observed = pipeline::observed_points(&run);
        let curves = pipeline::chart_curves(&run);
        for (scale, name, title) in [
            (ChartScale::Linear, &linear_name, "Kappa Light Chain Response"),
            (ChartScale::Log, &log_name, "Kappa Light Chain Response (log scale)"),
        ] {
            let spec = ChartSpec {
                title: title.to_string(),
                origin: run.ingest.stats.date_min,
                observed: &observed,
                curves: &curves,
                crossings: &run.crossings,
                scale,
                width: config.chart_width,
                height: config.chart_height,
            };
            render_chart(&config.out_dir.join(name), &spec)?;
        }
    }

    let doc = ReportDocument {
        stats: &run.ingest.stats,
        spec: &run.ingest.spec,
        table: &run.table,
        pre: &run.pre,
        post: &run.post,
        crossings: &run.crossings,
        pre_horizon_value: run.pre_horizon_value,
        notes_title: &notes.title,
        sections: &sections,
        charts: (!config.no_charts).then_some((linear_name.as_str(), log_name.as_str())),
    };
    let report_path = config.out_dir.join(format!("{stem}.md"));
    fs::write(&report_path, render_report_markdown(&doc)).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to write report '{}': {e}", report_path.display()),
        )
    })?;

    println!(
        "{}",
        format_run_summary(
            &run.ingest.stats,
            &run.ingest.spec,
            &run.pre,
            &run.post,
            &run.crossings
        )
    );
    println!("Report: {}", report_path.display());
    if !config.no_charts {
        println!(
            "Charts: {}, {}",
            config.out_dir.join(&linear_name).display(),
            config.out_dir.join(&log_name).display()
        );
    }

    if let Some(path) = &config.export_csv {
        crate::io::export::write_table_csv(path, &run.table, &run.pre, &run.post)?;
        println!("Export: {}", path.display());
    }

    Ok(())
}

fn cmd_fit(args: RunArgs) -> Result<(), AppError> {
    let config = report_config_from_args(&args);
    let run = pipeline::run_analysis(&config)?;

    println!(
        "{}",
        format_run_summary(
            &run.ingest.stats,
            &run.ingest.spec,
            &run.pre,
            &run.post,
            &run.crossings
        )
    );

    if let Some(path) = &config.export_csv {
        crate::io::export::write_table_csv(path, &run.table, &run.pre, &run.post)?;
        println!("Export: {}", path.display());
    }

    Ok(())
}

fn cmd_project(args: RunArgs) -> Result<(), AppError> {
    let config = report_config_from_args(&args);
    let run = pipeline::run_analysis(&config)?;

    println!("Projected crossings:");
    for c in &run.crossings {
        println!("  {}", format_crossing(c));
    }
    println!(
        "\nPre-phase curve at {}: {:.1} mg/L",
        run.ingest.spec.horizon, run.pre_horizon_value
    );

    println!("\nPost-phase projection (weekly):");
    for p in run.post_projection.iter().step_by(7) {
        println!("  {:<12} {:>8.2}", p.date.to_string(), p.value);
    }
    if let Some(last) = run.post_projection.last() {
        if (last.t as usize) % 7 != 0 {
            println!("  {:<12} {:>8.2}", last.date.to_string(), last.value);
        }
    }

    Ok(())
}

fn cmd_add(args: AddArgs) -> Result<(), AppError> {
    let n = crate::io::export::append_measurement(
        &args.data,
        Measurement {
            date: args.date,
            kappa: args.kappa,
            lambda: args.lambda,
        },
    )?;
    println!(
        "Added {} (kappa {} mg/L, lambda {} mg/L); {} measurements in {}.",
        args.date,
        args.kappa,
        args.lambda,
        n,
        args.data.display()
    );
    Ok(())
}

fn cmd_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = SampleConfig {
        start: args.start,
        split_offset_days: args.split_days,
        end_offset_days: args.end_days,
        interval_days: args.interval_days,
        noise: args.noise,
        seed: args.seed,
    };
    let data = generate_sample(&config)?;

    fs::create_dir_all(&args.out).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!(
                "Failed to create output directory '{}': {e}",
                args.out.display()
            ),
        )
    })?;

    let data_path = args.out.join("data.json");
    let notes_path = args.out.join("notes.json");
    crate::io::export::write_data_file(&data_path, &data)?;
    crate::io::notes::write_notes_file(&notes_path, &starter_notes())?;

    println!(
        "Wrote {} measurements to {} and starter notes to {}.",
        data.measurements.len(),
        data_path.display(),
        notes_path.display()
    );
    println!("Try: flc report --data {} --notes {}", data_path.display(), notes_path.display());
    Ok(())
}

pub fn report_config_from_args(args: &RunArgs) -> ReportConfig {
    ReportConfig {
        data_path: args.data.clone(),
        notes_path: args.notes.clone(),
        out_dir: args.out.clone(),
        pre_model: args.pre_model,
        post_model: args.post_model,
        max_iterations: args.max_iterations,
        chart_width: args.chart_width,
        chart_height: args.chart_height,
        no_charts: args.no_charts,
        export_csv: args.export.clone(),
    }
}

/// Rewrite argv so `flc` defaults to `flc report`.
///
/// Rules:
/// - `flc`                      -> `flc report`
/// - `flc --data lab.json ...`  -> `flc report --data lab.json ...`
/// - `flc --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("report".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "report" | "fit" | "project" | "add" | "sample"
    );
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "report flags".
    if arg1.starts_with('-') {
        argv.insert(1, "report".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
