use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use tsname_core::{Plan, ProcessOptions};

#[derive(Parser)]
#[command(
    name = "tsname",
    version,
    about = "Rename photos and videos to <index>-<capture time><ext> in capture order"
)]
struct Cli {
    /// Directory to process
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Show the plan without renaming anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Leave out the sequence number: <capture time><ext>
    #[arg(long)]
    no_index: bool,

    /// Print the result as JSON instead of the rename table
    #[arg(long)]
    json: bool,
}

fn print_plan(out: &mut impl Write, plan: &Plan) -> std::io::Result<()> {
    let width = plan
        .operations
        .iter()
        .map(|o| o.source_name.chars().count())
        .max()
        .unwrap_or(0);
    writeln!(out, "renaming:")?;
    for op in &plan.operations {
        writeln!(out, "    {:>width$}    =>    {}", op.source_name, op.target_name, width = width)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let options = ProcessOptions {
        dir: cli.dir,
        dry_run: cli.dry_run,
        no_index: cli.no_index,
    };

    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template("processing files: {pos}/{len} {wide_msg}")?);

    let plan = tsname_core::plan_directory(&options, &|_stage, current, total, message| {
        pb.set_length(total);
        pb.set_position((current + 1).min(total));
        pb.set_message(message.to_string());
    });
    pb.finish_and_clear();
    let plan = plan.with_context(|| format!("cannot plan renames in {}", options.dir.display()))?;

    let stdout = std::io::stdout();
    if !cli.json {
        let mut out = stdout.lock();
        if options.dry_run {
            writeln!(out, "Dry run:")?;
        }
        print_plan(&mut out, &plan)?;
    }

    let result = tsname_core::execute(&options, &plan)
        .with_context(|| format!("renaming in {} failed", options.dir.display()))?;

    if cli.json {
        serde_json::to_writer_pretty(stdout.lock(), &result)?;
        println!();
    }

    eprintln!(
        "Done! {} files scanned, {} planned, {} renamed{} ({:.2}s)",
        result.files_scanned,
        result.files_planned,
        result.files_renamed,
        if result.dry_run { " (dry run)" } else { "" },
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsname_core::RenameOperation;

    #[test]
    fn test_plan_table_aligns_sources() {
        let plan = Plan {
            files_scanned: 2,
            operations: vec![
                RenameOperation {
                    source_name: "a.jpg".into(),
                    target_name: "1-20200101-100000.jpg".into(),
                },
                RenameOperation {
                    source_name: "IMG_0001(0).jpg".into(),
                    target_name: "2-20200101-100001.jpg".into(),
                },
            ],
        };
        let mut out = Vec::new();
        print_plan(&mut out, &plan).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "renaming:\n\
             \x20             a.jpg    =>    1-20200101-100000.jpg\n\
             \x20   IMG_0001(0).jpg    =>    2-20200101-100001.jpg\n"
        );
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["tsname", "-n", "--no-index", "photos"]);
        assert!(cli.dry_run);
        assert!(cli.no_index);
        assert!(!cli.json);
        assert_eq!(cli.dir, PathBuf::from("photos"));

        let cli = Cli::parse_from(["tsname"]);
        assert_eq!(cli.dir, PathBuf::from("."));
    }
}
