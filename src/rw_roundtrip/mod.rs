use crate::prelude::*;
use clap::ArgMatches;
use nu_ansi_term::Color;
use rw_resources::chunk::{read_chunk, ChunkType};
use rw_utils::hexlify::{first_difference, window};
use std::fs;

pub fn run(args: &ArgMatches) -> RwResult<()> {
    init_logger(args);

    let filename = args
        .get_one::<String>("input")
        .ok_or_else(|| RwError::BadArguments("--input needed".to_string()))?;
    let input = fs::read(filename)?;
    let output = reencode(&input, args.get_flag("canonical"))?;

    match first_difference(&input, &output) {
        None => println!(
            "{}",
            Color::Green.paint(&format!("{filename}: identical ({} bytes)", input.len()))
        ),
        Some(offset) => {
            println!(
                "{}",
                Color::Red.paint(&format!(
                    "{filename}: differs at offset {offset:#x} ({} -> {} bytes)",
                    input.len(),
                    output.len()
                ))
            );
            log::info!("input:  {}", window(&input, offset, 8));
            log::info!("output: {}", window(&output, offset, 8));
        }
    }

    if let Some(output_fname) = args.get_one::<String>("output") {
        fs::write(output_fname, &output)?;
    }

    Ok(())
}

/// Decodes a resource table or a binary XML document, by the type of its
/// top-level chunk, and encodes it back.
fn reencode(input: &[u8], canonical: bool) -> RwResult<Vec<u8>> {
    let output = match read_chunk(input, 0)?.typ() {
        ChunkType::Table => {
            let mut table = rw_resources::decode_table(input)?;
            if canonical {
                table.canonicalize();
            }
            rw_resources::encode_table(&table)?
        }
        ChunkType::Xml => {
            let mut document = rw_resources::decode_xml(input)?;
            if canonical {
                document.canonicalize();
            }
            rw_resources::encode_xml(&document)?
        }
        typ => {
            return Err(RwError::BadArguments(format!(
                "unsupported top-level chunk {typ:?}"
            )))
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<u8> {
        let mut table = ResourceTable::new(false);
        table.add_package(0x7f, "com.example", &["bool"]).unwrap();
        table
            .define_entry(
                0x7f,
                "bool",
                &Config::default(),
                "enabled",
                rw_resources::tables::EntryContent::Value(Value::IntBoolean(0xffff_ffff)),
            )
            .unwrap();
        rw_resources::encode_table(&table).unwrap()
    }

    #[test]
    fn table_is_identical() {
        let input = table();
        assert_eq!(reencode(&input, false).unwrap(), input);
        assert_eq!(reencode(&input, true).unwrap(), input);
    }

    #[test]
    fn xml_is_identical() {
        let tree = XmlTree {
            utf8: false,
            nodes: vec![rw_resources::tree::Node::Element(
                rw_resources::tree::Element::new("PreferenceScreen"),
            )],
        };
        let input = rw_resources::encode_xml(&tree.to_document(None).unwrap()).unwrap();
        assert_eq!(reencode(&input, false).unwrap(), input);
    }

    #[test]
    fn other_chunks_are_rejected() {
        let pool = rw_resources::encode_string_pool(&rw_resources::strings::StringPool::new(true))
            .unwrap();
        assert!(matches!(
            reencode(&pool, false),
            Err(RwError::BadArguments(_))
        ));
        assert!(matches!(
            reencode(&[0x02, 0x00], false),
            Err(RwError::Resources(_))
        ));
    }
}
