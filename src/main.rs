use clap::{Parser, Subcommand};
use conference_content::photo::HttpFetcher;
use conference_content::pipeline::{BatchReport, Pipeline};
use conference_content::{check, config, output, record};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "conference-content", version)]
#[command(about = "Turn conference-management exports into static-site documents")]
#[command(long_about = "\
Turn conference-management exports into static-site documents

Each export is a JSON array of rows. Presenter rows become presenter pages,
accepted session rows become schedule entries:

  {output-folder}/
  └── src/_content/
      ├── presenters/
      │   ├── jane-doe.md              # Front matter + biography
      │   └── jane-doe.jpeg            # Downloaded or curated photo
      └── schedule/
          ├── talks/
          │   └── 2024-05-02-10-30-t1-fearless-concurrency.md
          └── tutorials/
              └── 2024-05-01-09-00-t0-intro-to-rust.md

Without --output-folder, documents are printed to stdout instead and no
photos are downloaded.

Run 'conference-content gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Config file merged over the stock defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log format: text (default) or json
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Shared arguments for the batch commands.
#[derive(clap::Args)]
struct BatchArgs {
    /// Export file: a JSON array of rows
    input: PathBuf,

    /// Site root to write documents under; omit to print them to stdout
    #[arg(long)]
    output_folder: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Turn a presenter export into presenter documents
    Presenters(BatchArgs),
    /// Turn a session export into schedule documents
    Schedule(BatchArgs),
    /// Validate every document under a site root
    Check {
        /// Site root (the folder containing src/_content)
        root: PathBuf,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match &cli.command {
        Command::Presenters(args) => {
            run_batch(&cli, args, |pipeline, rows, sink| pipeline.run_presenters(rows, sink))?;
        }
        Command::Schedule(args) => {
            run_batch(&cli, args, |pipeline, rows, sink| pipeline.run_schedule(rows, sink))?;
        }
        Command::Check { root } => {
            let config = config::load_config(cli.config.as_deref())?;
            let report = check::check_site(root, &config.paths)?;
            output::print_check_report(&report, &config.paths.content_root(root));
            if !report.is_clean() {
                return Err(format!("{} invalid documents", report.failures.len()).into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config and rows, run one batch, and print its summary.
///
/// Per-row failures are reported but do not fail the command.
fn run_batch(
    cli: &Cli,
    args: &BatchArgs,
    run: impl FnOnce(&Pipeline<'_>, &[serde_json::Value], &mut dyn Write) -> BatchReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(cli.config.as_deref())?;
    let rows = record::load_records(&args.input)?;
    let fetcher = HttpFetcher::new(config.fetch_timeout())?;
    let pipeline = Pipeline::new(&config, args.output_folder.clone(), &fetcher)?;

    let stdout = std::io::stdout();
    let mut sink = stdout.lock();
    writeln!(sink, "{}", output::format_processing_header(rows.len()))?;
    let report = run(&pipeline, &rows, &mut sink);
    drop(sink);

    let content_root = args
        .output_folder
        .as_deref()
        .map(|root| config.paths.content_root(root));
    output::print_batch_report(&report, content_root.as_deref());
    Ok(())
}

/// Initialize tracing based on CLI flags. Logs go to stderr so emitted
/// documents on stdout stay clean.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "conference_content=warn",
        1 => "conference_content=info",
        2 => "conference_content=debug",
        _ => "conference_content=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
