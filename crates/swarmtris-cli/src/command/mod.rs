use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use self::{evolve::EvolveArg, play::PlayArg};

mod evolve;
mod play;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log more (-v = DEBUG, -vv = TRACE)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Log less (-q = WARN, -qq = ERROR, -qqq = nothing)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve a population of policies over several rounds
    Evolve(#[clap(flatten)] EvolveArg),
    /// Play a single game with one policy
    Play(#[clap(flatten)] PlayArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_logging(level_filter(args.verbose, args.quiet));

    match args.mode {
        Mode::Evolve(arg) => {
            let runtime =
                tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
            runtime.block_on(evolve::run(&arg))?;
        }
        Mode::Play(arg) => play::run(&arg)?,
    }
    Ok(())
}

fn init_logging(level: LevelFilter) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(level)
        .init();
}

/// `INFO` by default, shifted one level per flag.
fn level_filter(verbose: u8, quiet: u8) -> LevelFilter {
    const LEVELS: [LevelFilter; 6] = [
        LevelFilter::OFF,
        LevelFilter::ERROR,
        LevelFilter::WARN,
        LevelFilter::INFO,
        LevelFilter::DEBUG,
        LevelFilter::TRACE,
    ];
    let index = (3 + usize::from(verbose))
        .saturating_sub(usize::from(quiet))
        .min(LEVELS.len() - 1);
    LEVELS[index]
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(0, 0), LevelFilter::INFO);
        assert_eq!(level_filter(1, 0), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, 0), LevelFilter::TRACE);
        assert_eq!(level_filter(0, 1), LevelFilter::WARN);
        assert_eq!(level_filter(0, 9), LevelFilter::OFF);
    }

    #[test]
    fn test_parse_subcommands() {
        let args = CommandArgs::try_parse_from(["swarmtris", "-v", "evolve", "--seed", "3"]).unwrap();
        assert_eq!(args.verbose, 1);
        assert!(matches!(args.mode, Mode::Evolve(_)));

        let args = CommandArgs::try_parse_from(["swarmtris", "play", "-qq"]).unwrap();
        assert_eq!(args.quiet, 2);
        assert!(matches!(args.mode, Mode::Play(_)));
    }
}
