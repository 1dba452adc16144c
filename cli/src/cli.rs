use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "oxflow")]
/// Compile SHACL shapes into validation rules and validate JSON data against them
pub struct Args {
    /// JSON file with the pipeline configuration
    ///
    /// Every key is optional, for example `{"engine": {"legacy_mode": true}, "fail_on_warnings": false}`.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Write logs to stderr as JSON lines
    ///
    /// The log level is set with the RUST_LOG environment variable.
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a shapes graph and print the validation rules as JSON
    Compile {
        /// File with the shapes graph
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        shapes: PathBuf,
        /// The shapes graph format, like rdfxml, turtle or ntriples
        ///
        /// By default the format is guessed from the file extension.
        #[arg(long)]
        format: Option<String>,
        /// Compile one rule per property with generic messages
        #[arg(long)]
        legacy: bool,
    },
    /// Validate a JSON object against a shapes graph and print the result as JSON
    ///
    /// The exit status is 1 when the data is invalid.
    Validate {
        /// File with the shapes graph
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        shapes: PathBuf,
        /// The shapes graph format, like rdfxml, turtle or ntriples
        #[arg(long)]
        format: Option<String>,
        /// JSON file with the object to validate
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        data: PathBuf,
        /// Evaluate every rule with the inline legacy checks only
        #[arg(long)]
        legacy_mode: bool,
    },
    /// Run the full pipeline with a runner echoing each signature's inputs
    ///
    /// The exit status is 1 when the inputs are invalid.
    Run {
        /// File with the shapes graph
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        shapes: PathBuf,
        /// The shapes graph format, like rdfxml, turtle or ntriples
        #[arg(long)]
        format: Option<String>,
        /// JSON file with the input object
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        inputs: PathBuf,
        /// JSON file with the array of signature definitions
        #[arg(long, value_hint = ValueHint::FilePath)]
        signatures: PathBuf,
    },
}
