use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};
use remark_core::Command;

pub const BIN_NAME: &str = "remark-builder";

const VALUE_OPTIONS: [(&str, &str); 4] = [
    ("-o", "--out"),
    ("-s", "--source"),
    ("-p", "--public"),
    ("-c", "--config"),
];
const SWITCHES: [&str; 5] = ["-v", "--verbose", "-q", "--quiet", "--open"];
const HELP_FLAGS: [&str; 2] = ["-h", "--help"];

pub fn command() -> ClapCommand {
    ClapCommand::new(BIN_NAME)
        .about("Utility for building remark slide decks")
        .override_usage(format!("{BIN_NAME} <dev|build> [OPTIONS]"))
        .before_help(format!(
            "Start dev-server:\n    {BIN_NAME} dev\n\nBuild slidedeck:\n    {BIN_NAME} build"
        ))
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("out")
                .short('o')
                .long("out")
                .value_name("DIR")
                .help("Output directory [default: ./docs]"),
        )
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Slide source directory [default: ./src]"),
        )
        .arg(
            Arg::new("public")
                .short('p')
                .long("public")
                .value_name("DIR")
                .help("Public files directory [default: ./public]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value("./remark.toml"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open the browser once the dev server is up")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only log errors")
                .action(ArgAction::SetTrue),
        )
}

pub fn print_help() {
    println!("{}", command().render_help());
}

/// Parsed command line.
#[derive(Debug)]
pub struct Invocation {
    pub command: Command,
    pub matches: ArgMatches,
    /// Options that were not recognised and skipped
    pub unknown: Vec<String>,
}

impl Invocation {
    pub fn verbose(&self) -> bool {
        self.matches.get_flag("verbose")
    }

    pub fn quiet(&self) -> bool {
        self.matches.get_flag("quiet")
    }

    pub fn open(&self) -> bool {
        self.matches.get_flag("open")
    }

    pub fn value(&self, id: &str) -> Option<&String> {
        self.matches.get_one::<String>(id)
    }
}

fn flag_name(arg: &str) -> &str {
    arg.split_once('=').map_or(arg, |(flag, _)| flag)
}

fn takes_value(flag: &str) -> bool {
    VALUE_OPTIONS
        .iter()
        .any(|(short, long)| flag == *short || flag == *long)
}

/// `<bin> <command> [flag value]...`. Unknown flags are collected (with the
/// value following them) instead of failing the parse.
pub fn parse<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut args = args.into_iter().map(Into::into).skip(1);
    let first = args.next();
    let options: Vec<String> = args.collect();

    let mut selected = Command::from_arg(first.as_deref());
    let mut known = Vec::new();
    let mut unknown = Vec::new();

    let mut i = 0;
    while i < options.len() {
        let arg = &options[i];
        let flag = flag_name(arg);

        if HELP_FLAGS.contains(&flag) {
            selected = Command::Help;
            i += 1;
        } else if SWITCHES.contains(&flag) {
            known.push(arg.clone());
            i += 1;
        } else if takes_value(flag) && flag != arg {
            // --out=dir
            known.push(arg.clone());
            i += 1;
        } else if takes_value(flag) {
            known.push(arg.clone());
            known.extend(options.get(i + 1).cloned());
            i += 2;
        } else {
            unknown.push(arg.clone());
            i += 2;
        }
    }

    let matches = command().try_get_matches_from(std::iter::once(BIN_NAME.to_string()).chain(known))?;

    Ok(Invocation {
        command: selected,
        matches,
        unknown,
    })
}
