//! CLI argument definitions for `cadence`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("Cadence")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play a library of tracks in order, each at its own speed")
        .arg_required_else_help(true)
        .args_conflicts_with_subcommands(true)
        .arg(
            Arg::new("LIBRARY")
                .help("Directory holding the tracks to play")
                .required(false)
                .index(1),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .short('s')
                .value_name("TRACK")
                .help("Start with this track id (its file name) instead of the first")
                .conflicts_with("no-autoplay"),
        )
        .arg(
            Arg::new("no-autoplay")
                .long("no-autoplay")
                .action(ArgAction::SetTrue)
                .help("Load the library without starting playback"),
        )
        .arg(
            Arg::new("progress-ms")
                .long("progress-ms")
                .value_name("MS")
                .default_value("500")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("Interval of the position sampler"),
        )
        .arg(
            Arg::new("settle-ms")
                .long("settle-ms")
                .value_name("MS")
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(u64))
                .help("Delay after start/resume at which the speed is applied again (repeatable)"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Do not draw the terminal UI"),
        )
        .subcommand(
            Command::new("list")
                .about("Print the playback order of a library and exit")
                .arg(
                    Arg::new("LIBRARY")
                        .help("Directory holding the tracks")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the catalog as JSON"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_delays_are_repeatable() {
        let matches = build_cli()
            .try_get_matches_from(["cadence", "lib", "--settle-ms", "100", "--settle-ms", "250"])
            .expect("parse");
        let delays: Vec<u64> = matches
            .get_many::<u64>("settle-ms")
            .expect("delays")
            .copied()
            .collect();
        assert_eq!(delays, vec![100, 250]);
        assert_eq!(matches.get_one::<u64>("progress-ms"), Some(&500));
    }

    #[test]
    fn start_conflicts_with_no_autoplay() {
        let result = build_cli().try_get_matches_from([
            "cadence",
            "lib",
            "--start",
            "a.mp3",
            "--no-autoplay",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn list_takes_its_own_library() {
        let matches = build_cli()
            .try_get_matches_from(["cadence", "list", "lib", "--json"])
            .expect("parse");
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "list");
        assert_eq!(sub.get_one::<String>("LIBRARY").map(String::as_str), Some("lib"));
        assert!(sub.get_flag("json"));
    }
}
