use clap::ArgMatches;
use clap_complete::{generate, Shell};
use resworks::prelude::*;
use resworks::{cli, rw_roundtrip, rw_table, rw_xml};
use std::io;

fn main() -> RwResult<()> {
    let args = cli::resworks().get_matches();

    match &args.subcommand() {
        Some(("table", cmd_args)) => rw_table::run(cmd_args),
        Some(("xml", cmd_args)) => rw_xml::run(cmd_args),
        Some(("roundtrip", cmd_args)) => rw_roundtrip::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(RwError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(RwError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> RwResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| RwError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::resworks();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
