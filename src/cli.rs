//! Command-line interface for mussh.

use crate::core::{Query, Target};
use crate::run::Command;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for mussh.
///
/// # Examples
///
/// ```bash
/// # Show which servers carry both tags
/// mussh ls -t role:web -t region:us
///
/// # Run two commands on two servers
/// mussh run -i web1 -i web2 'uptime' 'df -h'
///
/// # Run a local script on every server
/// mussh run -a -s ~/scripts/patch.sh
/// ```
#[derive(Parser, Debug)]
#[command(name = "mussh")]
#[command(version)]
#[command(about = "Run commands on many SSH servers at once")]
pub struct Cli {
    /// Inventory file to use instead of searching the default locations.
    #[arg(short, long, global = true, env = "MUSSH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Never color the output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log more. Repeat for even more.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the servers a selection matches.
    #[command(visible_alias = "ls")]
    List(Selection),

    /// Run commands or scripts on the servers a selection matches.
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Local script whose contents are run as one command. Repeatable.
        #[arg(short, long, value_name = "FILE")]
        script: Vec<PathBuf>,

        /// Commands to run, each passed to the remote shell as-is.
        #[arg(value_name = "COMMAND")]
        commands: Vec<String>,
    },
}

impl Commands {
    /// The commands to run, scripts first. Empty for `list`.
    pub fn to_run(&self) -> Vec<Command> {
        match self {
            Commands::List(_) => Vec::new(),
            Commands::Run {
                script, commands, ..
            } => script
                .iter()
                .cloned()
                .map(Command::Script)
                .chain(commands.iter().cloned().map(Command::Literal))
                .collect(),
        }
    }

    pub fn selection(&self) -> &Selection {
        match self {
            Commands::List(selection) | Commands::Run { selection, .. } => selection,
        }
    }
}

/// Which servers to act on. At least one selector is required.
#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
pub struct Selection {
    /// Select the server with this id. Repeatable.
    #[arg(short, long, value_name = "ID")]
    pub id: Vec<String>,

    /// Select servers carrying this tag. Repeat to require several tags.
    #[arg(short, long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Select every server.
    #[arg(short, long)]
    pub all: bool,
}

impl Selection {
    pub fn query(&self) -> Query {
        Query {
            ids: self.id.iter().cloned().collect(),
            tags: self.tag.iter().cloned().collect(),
            all: self.all,
        }
    }
}

/// One line of `list` output.
pub fn describe(target: &Target) -> String {
    let mut line = format!("{}\t{}", target.label(), target.address());
    if !target.tags.is_empty() {
        let tags: Vec<_> = target.tags.iter().map(String::as_str).collect();
        line.push('\t');
        line.push_str(&tags.join(","));
    }
    line
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::fixtures::target;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn list_by_tags() {
        let cli = parse(&["mussh", "ls", "-t", "a", "-t", "b"]);
        let query = cli.command.selection().query();
        assert_eq!(Query::tags(["a", "b"]), query);
        assert!(cli.command.to_run().is_empty());
    }

    #[test]
    fn run_with_scripts_and_commands() {
        let cli = parse(&[
            "mussh", "run", "-i", "web1", "-s", "a.sh", "uptime", "df -h",
        ]);
        assert_eq!(Query::ids(["web1"]), cli.command.selection().query());
        assert_eq!(
            vec![
                Command::Script(PathBuf::from("a.sh")),
                Command::Literal("uptime".to_string()),
                Command::Literal("df -h".to_string()),
            ],
            cli.command.to_run(),
        );
    }

    #[test]
    fn run_alias_and_all() {
        let cli = parse(&["mussh", "r", "-a", "true"]);
        assert_eq!(Query::all(), cli.command.selection().query());
    }

    #[test]
    fn selection_is_required() {
        assert!(Cli::try_parse_from(["mussh", "run", "uptime"]).is_err());
        assert!(Cli::try_parse_from(["mussh", "list"]).is_err());
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = parse(&["mussh", "ls", "-a", "-c", "/tmp/inv.yaml", "-vv", "--no-color"]);
        assert_eq!(Some(PathBuf::from("/tmp/inv.yaml")), cli.config);
        assert_eq!(2, cli.verbose);
        assert!(cli.no_color);
    }

    #[test]
    fn describe_target() {
        let mut web = target(Some("web1"), "10.0.0.1");
        assert_eq!("web1\t10.0.0.1:22", describe(&web));

        web.tags = ["role:web", "region:us"].map(String::from).into();
        assert_eq!("web1\t10.0.0.1:22\tregion:us,role:web", describe(&web));
    }
}
