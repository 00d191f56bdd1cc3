use crate::prelude::*;
use clap::ArgMatches;
use regex::Regex;
use serde::Serialize;
use std::fs;

#[derive(Debug, Serialize)]
struct Identifier<'a> {
    id: String,
    #[serde(flatten)]
    name: &'a ResName,
}

pub fn run(args: &ArgMatches) -> RwResult<()> {
    init_logger(args);

    let filename = args
        .get_one::<String>("input")
        .ok_or_else(|| RwError::BadArguments("--input needed".to_string()))?;
    let mut session = Session::new(&fs::read(filename)?)?;
    if let Some(framework) = args.get_one::<String>("framework") {
        session = session.with_framework(&fs::read(framework)?)?;
    }
    let ids = session.identifiers();

    if args.get_flag("ids") {
        let filter = args
            .get_one::<String>("filter")
            .map(|f| Regex::new(f))
            .transpose()?;
        let listing = identifiers(ids.as_deref(), filter.as_ref());
        if args.get_flag("json") {
            println!("{}", serde_json::to_string_pretty(&listing)?);
        } else {
            for identifier in listing {
                println!("{} {}", identifier.id, identifier.name);
            }
        }
        return Ok(());
    }

    let table = session
        .table()
        .ok_or_else(|| RwError::BadArguments(format!("{filename}: no resource table")))?;
    let mut out = String::new();
    table.dump(&mut out, ids.as_deref())?;
    print!("{out}");

    Ok(())
}

/// Identifiers of the primary table whose `type/name` matches `filter`.
fn identifiers<'a>(ids: Option<&'a IdentifierTable>, filter: Option<&Regex>) -> Vec<Identifier<'a>> {
    let Some(ids) = ids else {
        return Vec::new();
    };
    ids.iter()
        .filter(|(_, name)| {
            filter.map_or(true, |re| re.is_match(&format!("{}/{}", name.typ, name.name)))
        })
        .map(|(id, name)| Identifier {
            id: id.to_string(),
            name,
        })
        .collect()
}
