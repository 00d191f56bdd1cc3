//! Main `ResWorks` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input(help: &str) -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help(help.to_string())
}

fn arg_framework() -> Arg {
    Arg::new("framework")
        .short('f')
        .long("framework")
        .action(ArgAction::Set)
        .help("Framework resource table, for ids of the android package")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_json() -> Arg {
    Arg::new("json")
        .short('j')
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

#[must_use]
pub fn resworks() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(table())
        .subcommand(xml())
        .subcommand(roundtrip())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn table() -> Command {
    Command::new("table")
        .bin_name("rw-table")
        .version(VERSION)
        .author(AUTHORS)
        .about("Prints a resource table in aapt form")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input("Input resource table (resources.arsc)"))
        .arg(arg_framework())
        .arg(
            Arg::new("ids")
                .long("ids")
                .action(ArgAction::SetTrue)
                .help("Only list resource identifiers and their names"),
        )
        .arg(
            Arg::new("filter")
                .long("filter")
                .action(ArgAction::Set)
                .requires("ids")
                .help("Resource name(s) regex filter, as type/name"),
        )
        .arg(arg_json().requires("ids"))
}

#[must_use]
pub fn xml() -> Command {
    Command::new("xml")
        .bin_name("rw-xml")
        .version(VERSION)
        .author(AUTHORS)
        .about("Decodes binary XML documents, or encodes their JSON tree")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .action(ArgAction::Append)
                .required(true)
                .help("Input binary XML file(s), or JSON tree with --encode"),
        )
        .arg(
            Arg::new("table")
                .short('t')
                .long("table")
                .action(ArgAction::Set)
                .help("Resource table used to name references"),
        )
        .arg(arg_framework())
        .arg(arg_json())
        .arg(
            Arg::new("encode")
                .short('b')
                .long("encode")
                .action(ArgAction::SetTrue)
                .requires("output")
                .conflicts_with("json")
                .help("Encode a JSON tree back to binary XML"),
        )
        .arg(arg_output("Output binary XML file, with --encode"))
}

#[must_use]
pub fn roundtrip() -> Command {
    Command::new("roundtrip")
        .bin_name("rw-roundtrip")
        .version(VERSION)
        .author(AUTHORS)
        .about("Decodes then re-encodes a resource table or binary XML file")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input("Input resource table or binary XML file"))
        .arg(arg_output("Output file for the re-encoded bytes"))
        .arg(
            Arg::new("canonical")
                .short('c')
                .long("canonical")
                .action(ArgAction::SetTrue)
                .help("Re-encode in canonical layout, dropping verbatim kept chunks"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_consistent() {
        resworks().debug_assert();
    }

    #[test]
    fn xml_accepts_many_inputs() {
        let args = xml()
            .try_get_matches_from(["rw-xml", "-i", "a.xml", "-i", "b.xml", "--json"])
            .unwrap();
        let inputs: Vec<&String> = args.get_many::<String>("input").unwrap().collect();
        assert_eq!(inputs, ["a.xml", "b.xml"]);
        assert!(args.get_flag("json"));
    }

    #[test]
    fn encode_requires_output() {
        assert!(xml()
            .try_get_matches_from(["rw-xml", "-i", "tree.json", "--encode"])
            .is_err());
        assert!(xml()
            .try_get_matches_from(["rw-xml", "-i", "tree.json", "-b", "-o", "a.xml", "-j"])
            .is_err());
        let args = xml()
            .try_get_matches_from(["rw-xml", "-i", "tree.json", "-b", "-o", "a.xml"])
            .unwrap();
        assert!(args.get_flag("encode"));
        assert_eq!(args.get_one::<String>("output").unwrap(), "a.xml");
    }

    #[test]
    fn filter_requires_ids() {
        assert!(table()
            .try_get_matches_from(["rw-table", "-i", "r.arsc", "--filter", "string/.*"])
            .is_err());
    }
}
