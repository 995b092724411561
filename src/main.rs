use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use report_filler::config::{init_default_config, CliOverrides, FillerConfig, CONFIG_ENV};
use report_filler::error::FillError;
use report_filler::filler::fill_template;
use report_filler::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "report-filler")]
#[command(about = "Fill a DOCX report template from JSON data", long_about = None)]
struct Args {
    /// Write a default report-filler.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file (default: $REPORT_FILLER_CONFIG, else report-filler.toml searched upwards)
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Template .docx (default: files/template.docx)
    #[arg(long, value_name = "DOCX")]
    template: Option<PathBuf>,

    /// Data file holding a JSON object (default: files/data_text.txt)
    #[arg(long, value_name = "JSON")]
    data: Option<PathBuf>,

    /// Output .docx (default: output.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Date rendered for {{ date }}, as YYYY-MM-DD (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<String>,

    /// Fail without writing output when any marker stays unresolved
    #[arg(long)]
    strict: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);
    match run(args, &progress) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(args: Args, progress: &ConsoleProgress) -> Result<(), FillError> {
    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).map_err(FillError::config)?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let cfg = FillerConfig::resolve(CliOverrides {
        config: args.config,
        template: args.template,
        data: args.data,
        output: args.output,
        date: args.date,
        strict: args.strict,
    })
    .map_err(FillError::config)?;
    match &cfg.config_path {
        Some(p) => progress.info(format!("config: {}", p.display())),
        None => progress.info(format!(
            "config: built-in defaults (no report-filler.toml found, {CONFIG_ENV} unset)"
        )),
    }

    fill_template(&cfg, progress)?;
    Ok(())
}
