//! Command Line Argument Parsing

use clap::{value_parser, Arg, Command};

#[derive(Debug, Default, PartialEq)]
pub struct ParsedArgs {
    pub logfile: Option<String>,
    pub templates: Option<String>,
    pub overflow: Option<String>,
    pub idle_ms: Option<u64>,
    pub poll_ms: Option<u64>,
}

/// Parse command line arguments using clap. `args[0]` is the program name.
pub fn parse_args_with_clap(args: Vec<String>) -> Result<ParsedArgs, clap::Error> {
    let matches = Command::new("tscribe")
        .about("Follows a log file and recognizes its events with YAML templates")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("templates")
                .long("templates")
                .short('t')
                .value_name("FILE")
                .help("Template definitions (YAML)"),
        )
        .arg(
            Arg::new("overflow")
                .long("overflow")
                .short('o')
                .value_name("FILE")
                .help("Where to write lines no template recognized"),
        )
        .arg(
            Arg::new("idle-ms")
                .long("idle-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Quiet time before the summary is printed"),
        )
        .arg(
            Arg::new("poll-ms")
                .long("poll-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Interval between checks for new lines"),
        )
        .arg(Arg::new("logfile").help("Log file to follow"))
        .try_get_matches_from(args)?;

    Ok(ParsedArgs {
        logfile: matches.get_one::<String>("logfile").cloned(),
        templates: matches.get_one::<String>("templates").cloned(),
        overflow: matches.get_one::<String>("overflow").cloned(),
        idle_ms: matches.get_one::<u64>("idle-ms").copied(),
        poll_ms: matches.get_one::<u64>("poll-ms").copied(),
    })
}
