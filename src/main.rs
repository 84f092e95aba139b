mod cli;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use fits_tools::commands::{dump_header, merge_header, print_info, sex_to_region};
use fits_tools::logging::init_logging;
use fits_tools::region::RegionOptions;

/// Print a clap error with usage and exit. Malformed invocations exit 1,
/// --help and --version exit 0.
fn exit_with(err: clap::Error) -> ! {
    let code = if err.use_stderr() { 1 } else { 0 };
    let _ = err.print();
    std::process::exit(code);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::try_parse().unwrap_or_else(|e| exit_with(e));
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Info { files, json } => {
            print_info(&mut std::io::stdout().lock(), &files, json)?;
        }
        Commands::Header(args) => {
            let (files, keywords) = args.files_and_keywords();
            if files.is_empty() {
                exit_with(Cli::command().error(
                    ErrorKind::MissingRequiredArgument,
                    "header: no FITS files given (recognised suffixes: .fits, .fit, .fts, optionally .gz)",
                ));
            }
            dump_header(
                &mut std::io::stdout().lock(),
                &files,
                &keywords,
                &args.to_dump_options(),
            )?;
        }
        Commands::MergeHeader {
            header_text,
            fits_file,
            output,
        } => {
            merge_header(&header_text, &fits_file, output.as_deref())?;
        }
        Commands::SexToRegion {
            catalogue,
            output,
            colour,
            scale,
            label,
        } => {
            let options = RegionOptions { scale, label };
            sex_to_region(&catalogue, output.as_deref(), &colour, &options)?;
        }
    }

    Ok(())
}
