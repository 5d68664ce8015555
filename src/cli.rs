use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};

#[derive(Debug, Default)]
pub struct CliSources {
    pub engine_from_cli: bool,
    pub language_from_cli: bool,
    pub mock_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            engine_from_cli: value_from_cli(matches, "engine"),
            language_from_cli: value_from_cli(matches, "language"),
            mock_from_cli: value_from_cli(matches, "mock"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

/// Parses an explicit argument list, returning clap's error instead of
/// exiting.
pub fn try_parse_cli_from<I, T>(args: I) -> Result<(CliArgs, CliSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = CliArgs::command().try_get_matches_from(args)?;
    let args = CliArgs::from_arg_matches(&matches)?;
    let sources = CliSources::from_matches(&matches);
    Ok((args, sources))
}

#[derive(Debug, Parser)]
#[command(
    name = "ocrkit",
    about = "Recognize text in images with the OCR engines available on this machine",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Print the OCR engines usable on this machine
    #[arg(long = "list-engines")]
    pub list_engines: bool,

    /// Print the languages supported by an engine
    #[arg(long = "list-languages", value_name = "ENGINE")]
    pub list_languages: Option<String>,

    /// Run recognition on a specific engine instead of the first available one
    #[arg(short = 'e', long = "engine", id = "engine")]
    pub engine: Option<String>,

    /// Recognition language as a locale identifier (e.g. en, de-AT, zh-Hans)
    #[arg(short = 'l', long = "language", id = "language", default_value = "en")]
    pub language: String,

    /// Register the scripted mock engine
    #[arg(long = "mock", id = "mock")]
    pub mock: bool,

    /// Print machine-readable JSON
    #[arg(long = "json")]
    pub json: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Input image path
    pub input: Option<PathBuf>,
}
