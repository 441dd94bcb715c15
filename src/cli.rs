use std::path::PathBuf;

use clap::Parser;
use clockex_core::{Group, RunType};

#[derive(Parser, Debug)]
#[command(name = "clockex")]
#[command(about = "Timed clock-recall trials with synchronized capture sessions")]
#[command(version)]
pub struct Cli {
    /// Participant name used in every uploaded filename
    #[arg(short, long)]
    pub participant: Option<String>,

    /// `check` for an equipment check, `main` for the experiment proper
    #[arg(short, long, default_value = "check")]
    pub run_type: RunType,

    /// Counterbalancing group (ignored for check runs)
    #[arg(short, long, default_value = "A")]
    pub group: Group,

    /// JSON configuration file
    #[arg(short, long, default_value = "clockex.json")]
    pub config: PathBuf,

    /// JSON file with the `check`, `a` and `b` trial lists
    #[arg(short, long)]
    pub sequences: Option<PathBuf>,

    /// Override the number of sets in the run
    #[arg(long)]
    pub sets: Option<u32>,

    /// Skip clock synchronization; absolute times are recorded as null
    #[arg(long)]
    pub no_sync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_a_check_run() {
        let cli = Cli::parse_from(["clockex"]);
        assert_eq!(cli.run_type, RunType::Check);
        assert_eq!(cli.group, Group::A);
        assert!(cli.participant.is_none());
        assert_eq!(cli.config, PathBuf::from("clockex.json"));
    }

    #[test]
    fn parses_main_run_for_group_b() {
        let cli = Cli::parse_from(["clockex", "-p", "alice", "--run-type", "main", "--group", "b", "--sets", "4"]);
        assert_eq!(cli.participant.as_deref(), Some("alice"));
        assert_eq!(cli.run_type, RunType::Main);
        assert_eq!(cli.group, Group::B);
        assert_eq!(cli.sets, Some(4));
    }

    #[test]
    fn rejects_unknown_run_type() {
        assert!(Cli::try_parse_from(["clockex", "--run-type", "practice"]).is_err());
    }
}
