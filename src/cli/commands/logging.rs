use clap::{Arg, ArgAction, ArgMatches, Command, builder::PossibleValuesParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_LEVEL: &str = "log-level";

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Increase verbosity (-v WARN, -vv INFO, -vvv DEBUG, -vvvv TRACE)")
                .global(true)
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new(ARG_LOG_LEVEL)
                .long(ARG_LOG_LEVEL)
                .help("Log level, overrides -v")
                .env("LIBRIS_LOG_LEVEL")
                .global(true)
                .value_parser(PossibleValuesParser::new(LEVELS)),
        )
}

/// Resolve the tracing level: `--log-level` wins, otherwise the `-v` count.
/// `None` leaves the `RUST_LOG`/default filter in charge.
#[must_use]
pub fn level(matches: &ArgMatches) -> Option<Level> {
    if let Some(name) = matches.get_one::<String>(ARG_LOG_LEVEL) {
        return name.parse().ok();
    }
    match matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0) {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["libris"];
        argv.extend_from_slice(args);
        with_args(Command::new("libris")).get_matches_from(argv)
    }

    #[test]
    fn verbosity_count_maps_to_levels() {
        temp_env::with_var_unset("LIBRIS_LOG_LEVEL", || {
            assert_eq!(level(&matches(&[])), None);
            assert_eq!(level(&matches(&["-v"])), Some(Level::WARN));
            assert_eq!(level(&matches(&["-vv"])), Some(Level::INFO));
            assert_eq!(level(&matches(&["-vvv"])), Some(Level::DEBUG));
            assert_eq!(level(&matches(&["-vvvvvv"])), Some(Level::TRACE));
        });
    }

    #[test]
    fn log_level_overrides_verbosity() {
        temp_env::with_var("LIBRIS_LOG_LEVEL", Some("debug"), || {
            assert_eq!(level(&matches(&["-v"])), Some(Level::DEBUG));
            assert_eq!(level(&matches(&["--log-level", "error"])), Some(Level::ERROR));
        });
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let result = with_args(Command::new("libris")).try_get_matches_from(["libris", "--log-level", "loud"]);
        assert!(result.is_err());
    }
}
