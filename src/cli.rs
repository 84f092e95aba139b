use clap::{Args, Parser, Subcommand};
use fits_tools::commands::DumpOptions;
use fits_tools::lookup::DEFAULT_HIERARCH_PREFIX;
use fits_tools::utils::is_fits_path;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fits-tools", version)]
#[command(about = "Inspect and edit FITS headers, convert SExtractor catalogues", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a one-line summary of every HDU in each file
    #[command(arg_required_else_help = true)]
    Info {
        /// FITS files to summarise
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print headers, or a table of keyword values across files
    #[command(arg_required_else_help = true)]
    Header(HeaderArgs),

    /// Merge a text header into the primary header of a copy of a FITS file
    #[command(arg_required_else_help = true)]
    MergeHeader {
        /// Text file with one card per line, terminated by END
        header_text: PathBuf,

        /// FITS file to copy
        fits_file: PathBuf,

        /// Output file (default: input name with the suffix replaced by _hdr.fits)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a SExtractor catalogue to a DS9 region file
    #[command(name = "sex2reg", arg_required_else_help = true)]
    SexToRegion {
        /// SExtractor ASCII_HEAD catalogue
        catalogue: PathBuf,

        /// Region file (default: catalogue name with .cat replaced by .reg)
        output: Option<PathBuf>,

        /// Region colour
        #[arg(short, long, visible_alias = "color", default_value = "green")]
        colour: String,

        /// Multiply ellipse axes by this factor
        #[arg(short, long, default_value = "1.0")]
        scale: f64,

        /// Label each region with the NUMBER column
        #[arg(short, long)]
        label: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct HeaderArgs {
    /// Read only this header unit (no search in later units)
    #[arg(short, long, conflicts_with = "all")]
    pub ext: Option<usize>,

    /// Print the headers of all units
    #[arg(short, long)]
    pub all: bool,

    /// Align output columns
    #[arg(short, long)]
    pub format: bool,

    /// Show file paths as given instead of file names
    #[arg(short, long)]
    pub path: bool,

    /// Vendor tag used for HIERARCH long-form keywords
    #[arg(long, default_value = DEFAULT_HIERARCH_PREFIX)]
    pub hierarch_prefix: String,

    /// FITS files and keyword names, in any order
    #[arg(required = true, value_name = "FILE_OR_KEYWORD")]
    pub args: Vec<String>,
}

impl HeaderArgs {
    /// Split positional arguments into FITS files and keywords by suffix
    pub fn files_and_keywords(&self) -> (Vec<PathBuf>, Vec<String>) {
        let (files, keywords): (Vec<&String>, Vec<&String>) =
            self.args.iter().partition(|arg| is_fits_path(arg));
        (
            files.into_iter().map(PathBuf::from).collect(),
            keywords.into_iter().cloned().collect(),
        )
    }

    pub fn to_dump_options(&self) -> DumpOptions {
        DumpOptions {
            ext: self.ext,
            all: self.all,
            align: self.format,
            full_path: self.path,
            hierarch_prefix: self.hierarch_prefix.clone(),
        }
    }
}
