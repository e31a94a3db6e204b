use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Anything above TRACE clamps in `start`, so 5 is the accepted ceiling.
const MAX_VERBOSITY: u8 = 5;

/// Accepts a repeat count (`0..=5`) or a level name, case-insensitive.
fn parse_verbosity(level: &str) -> Result<u8, String> {
    if let Ok(count) = level.parse::<u8>() {
        if count <= MAX_VERBOSITY {
            return Ok(count);
        }
        return Err(format!("verbosity out of range (max {MAX_VERBOSITY})"));
    }

    match level.to_ascii_lowercase().as_str() {
        "error" => Ok(0),
        "warn" => Ok(1),
        "info" => Ok(2),
        "debug" => Ok(3),
        "trace" => Ok(4),
        other => Err(format!("unknown log level: {other}")),
    }
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_verbosity)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("ENTRATA_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_verbosity_accepts_counts_and_names() {
        assert_eq!(parse_verbosity("0"), Ok(0));
        assert_eq!(parse_verbosity("5"), Ok(5));
        assert_eq!(parse_verbosity("error"), Ok(0));
        assert_eq!(parse_verbosity("WARN"), Ok(1));
        assert_eq!(parse_verbosity("Info"), Ok(2));
        assert_eq!(parse_verbosity("debug"), Ok(3));
        assert_eq!(parse_verbosity("trace"), Ok(4));
    }

    #[test]
    fn parse_verbosity_rejects_out_of_range_and_unknown() {
        assert!(parse_verbosity("6").is_err());
        assert!(parse_verbosity("verbose").is_err());
        assert!(parse_verbosity("").is_err());
    }

    #[test]
    fn flag_count_sets_level() {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(["test", "-vvv"]);
        assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
    }

    #[test]
    fn named_level_from_env() {
        temp_env::with_var("ENTRATA_LOG_LEVEL", Some("debug"), || {
            let command = with_args(Command::new("test"));
            let matches = command.get_matches_from(["test"]);
            assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
        });
    }
}
