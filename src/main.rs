//! webbook - publish EPUB books as static HTML

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;

use webbook::order::parse_token;
use webbook::{
    CommonOptions, ConvertOptions, CrossRefOptions, FallbackBase, FileSet, FixOptions, OrderSpec,
    Summary,
};

const SUBCOMMANDS: &[&str] = &["convert", "linkfix", "crossref"];

#[derive(Parser)]
#[command(name = "webbook", args_override_self = true)]
#[command(version, about = "Publish EPUB books as linked static HTML", long_about = None)]
#[command(after_help = "EXAMPLES:
    webbook convert book.epub -d site          Publish book.epub into site/
    webbook convert book.epub -o 2 -o toc      Second document first, then the contents
    webbook linkfix -u https://example.org site/*.html
    webbook crossref -f -u public/ public/*.html")]
struct Cli {
    /// Read more arguments from FILE; command-line arguments take precedence
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    conf_file: Option<PathBuf>,

    /// More output: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print the end-of-run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert an EPUB into a directory of HTML pages
    Convert(ConvertArgs),
    /// Fix relative links among published files and check absolute ones
    Linkfix(FileArgs),
    /// Link scripture citations in published files
    Crossref(FileArgs),
}

#[derive(Args)]
struct Shared {
    /// Don't write anything, only show what would happen
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Check links that are not part of the run against this directory or URL
    #[arg(short = 'u', long, value_name = "PATH|URL")]
    fallback: Option<FallbackBase>,

    /// Timeout in seconds for checks against a URL fallback
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Never prompt; every question takes its default answer
    #[arg(long)]
    no_input: bool,
}

impl Shared {
    fn options(&self, overwrite: bool) -> CommonOptions {
        CommonOptions {
            dry_run: self.dry_run,
            overwrite,
            fallback: self.fallback.clone(),
            timeout: self.timeout.map(Duration::from_secs),
            interactive: !self.no_input,
        }
    }
}

#[derive(Args)]
#[command(args_override_self = true)]
#[command(after_help = "The spine and contents order are given by repeating -o/-t. \
'-o 2 -o toc -o 1' puts the second document first, then the generated table of \
contents, then the first document; everything else follows in order.")]
struct ConvertArgs {
    /// The EPUB to convert
    #[arg(value_name = "INFILE")]
    epub: PathBuf,

    /// Output directory
    #[arg(short = 'd', long = "directory", value_name = "DIR", default_value = "_result")]
    output_dir: PathBuf,

    /// Page template (defaults to ./default_template.html, then the bundled one)
    #[arg(long, value_name = "TEMPLATE")]
    template: Option<PathBuf>,

    /// Reading order for the previous/next buttons: a positive number or 'toc'
    #[arg(short = 'o', long, value_name = "N", value_parser = order_token)]
    spine_order: Vec<usize>,

    /// Order of the contents page entries (defaults to the spine order)
    #[arg(short = 't', long, value_name = "N", value_parser = order_token)]
    toc_order: Vec<usize>,

    /// Keep existing files in the output directory
    #[arg(long)]
    no_overwrite: bool,

    #[command(flatten)]
    shared: Shared,
}

#[derive(Args)]
#[command(args_override_self = true)]
struct FileArgs {
    /// Published files to process
    #[arg(value_name = "INFILE", required = true)]
    files: Vec<PathBuf>,

    /// Pretend all files live in this subdirectory of their common root
    #[arg(short = 'b', long, value_name = "PATH", default_value = "")]
    basedir: String,

    /// A custom route; may be given multiple times
    #[arg(short = 'r', long = "route", num_args = 2, value_names = ["SRC", "DST"])]
    routes: Vec<String>,

    /// Directory relative destinations are written to
    #[arg(short = 'd', long = "directory", value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Overwrite the given files instead of writing FILE.new next to them
    #[arg(short = 'f', long)]
    overwrite: bool,

    #[command(flatten)]
    shared: Shared,
}

impl FileArgs {
    fn file_set(&self) -> FileSet {
        FileSet {
            files: self.files.clone(),
            basedir: self.basedir.clone(),
            routes: self
                .routes
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect(),
        }
    }
}

fn order_token(token: &str) -> Result<usize, String> {
    parse_token(token).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = match with_conf_file(std::env::args_os().collect()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(summary) => {
            report(&summary, cli.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> webbook::Result<Summary> {
    match command {
        Command::Convert(args) => {
            let spine_order = OrderSpec::new(args.spine_order);
            let toc_order = (!args.toc_order.is_empty()).then(|| OrderSpec::new(args.toc_order));
            webbook::convert(&ConvertOptions {
                epub: args.epub,
                output_dir: args.output_dir,
                template: args.template,
                spine_order,
                toc_order,
                common: args.shared.options(!args.no_overwrite),
            })
        }
        Command::Linkfix(args) => webbook::linkfix(&FixOptions {
            files: args.file_set(),
            output_dir: args.output_dir.clone(),
            common: args.shared.options(args.overwrite),
        }),
        Command::Crossref(args) => webbook::crossref(&CrossRefOptions {
            files: args.file_set(),
            output_dir: args.output_dir.clone(),
            common: args.shared.options(args.overwrite),
        }),
    }
}

fn report(summary: &Summary, json: bool) {
    if json {
        match serde_json::to_string(summary) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("error: {e}"),
        }
    } else {
        println!("{summary}");
    }
}

/// `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Splice the words of `--conf-file FILE` in front of the command-line
/// arguments, right after the subcommand name when there is one.
fn with_conf_file(mut args: Vec<OsString>) -> Result<Vec<OsString>, String> {
    let Some(pos) = args
        .iter()
        .position(|a| a == "-c" || a == "--conf-file" || a.to_string_lossy().starts_with("--conf-file="))
    else {
        return Ok(args);
    };

    let flag = args.remove(pos).to_string_lossy().into_owned();
    let path = match flag.strip_prefix("--conf-file=") {
        Some(path) => PathBuf::from(path),
        None if pos < args.len() => PathBuf::from(args.remove(pos)),
        None => return Err(format!("{flag} requires a file name")),
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;

    let insert_at = args
        .iter()
        .position(|a| SUBCOMMANDS.iter().any(|s| a == s))
        .map_or(1.min(args.len()), |i| i + 1);
    let words = content.split_whitespace().map(OsString::from);
    args.splice(insert_at..insert_at, words);
    Ok(args)
}
