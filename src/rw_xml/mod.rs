use crate::prelude::*;
use clap::ArgMatches;
use std::collections::BTreeMap;
use std::fs;

pub fn run(args: &ArgMatches) -> RwResult<()> {
    init_logger(args);

    let filenames = unique_inputs(
        args.get_many::<String>("input")
            .ok_or_else(|| RwError::BadArguments("--input needed".to_string()))?
            .map(String::as_str),
    );
    let mut session = match args.get_one::<String>("table") {
        Some(table) => Session::new(&fs::read(table)?)?,
        None => Session::empty(),
    };
    if let Some(framework) = args.get_one::<String>("framework") {
        session = session.with_framework(&fs::read(framework)?)?;
    }

    if args.get_flag("encode") {
        let output = args
            .get_one::<String>("output")
            .ok_or_else(|| RwError::BadArguments("--output needed to encode".to_string()))?;
        let [filename] = filenames.as_slice() else {
            return Err(RwError::BadArguments(
                "a single JSON tree can be encoded at once".to_string(),
            ));
        };
        let bytes = build(&session, &fs::read_to_string(filename)?)?;
        log::info!("{filename}: {} bytes written to {output}", bytes.len());
        fs::write(output, bytes)?;
        return Ok(());
    }

    let mut documents = Vec::with_capacity(filenames.len());
    for filename in &filenames {
        documents.push(fs::read(filename)?);
    }
    let mut trees = Vec::with_capacity(filenames.len());
    for (filename, tree) in filenames.iter().zip(session.decode_xml_all(&documents)) {
        match tree {
            Ok(tree) => trees.push((*filename, tree)),
            Err(err) => {
                log::error!("{filename}: {err}");
                return Err(err);
            }
        }
    }

    if args.get_flag("json") {
        if let [(_, tree)] = trees.as_slice() {
            println!("{}", serde_json::to_string_pretty(tree)?);
        } else {
            let trees: BTreeMap<&str, &XmlTree> =
                trees.iter().map(|(name, tree)| (*name, tree)).collect();
            println!("{}", serde_json::to_string_pretty(&trees)?);
        }
        return Ok(());
    }
    for (filename, tree) in &trees {
        if trees.len() > 1 {
            println!("==> {filename} <==");
        }
        print!("{tree}");
    }

    Ok(())
}

/// Input files in command line order, each one once.
fn unique_inputs<'a>(filenames: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut unique: Vec<&str> = Vec::new();
    for filename in filenames {
        if unique.contains(&filename) {
            log::warn!("{filename} is given more than once, decoding it once");
        } else {
            unique.push(filename);
        }
    }
    unique
}

/// Builds a binary XML document from the JSON form of its tree.
fn build(session: &Session, json: &str) -> RwResult<Vec<u8>> {
    let tree: XmlTree = serde_json::from_str(json)?;
    session.encode_xml(&tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_resources::ids::ResRef;
    use rw_resources::tree::{Attribute, Element, NamespaceDecl, Node, Text, ANDROID_NS};
    use rw_resources::values::ResolvedValue;

    fn session() -> Session {
        let mut table = ResourceTable::new(true);
        table
            .add_package(0x7f, "com.example.app", &["string"])
            .unwrap();
        table
            .define_value(
                0x7f,
                "string",
                &Config::default(),
                "app_name",
                &ResolvedValue::String("Example".to_string()),
                None,
            )
            .unwrap();
        Session::new(&rw_resources::encode_table(&table).unwrap()).unwrap()
    }

    fn layout() -> XmlTree {
        let mut title = Element::new("TextView");
        title.line = 3;
        title.end_line = 3;
        title.attributes.push(Attribute {
            ns: Some(ANDROID_NS.to_string()),
            name: "text".to_string(),
            resource: Some(ResRef::Unresolved(0x0101_014f)),
            raw: None,
            value: ResolvedValue::Reference(ResRef::named("string", "app_name")),
        });
        title.attributes.push(Attribute {
            ns: None,
            name: "tag".to_string(),
            resource: None,
            raw: Some("title".to_string()),
            value: ResolvedValue::String("title".to_string()),
        });
        let mut root = Element::new("LinearLayout");
        root.line = 2;
        root.end_line = 5;
        root.namespaces
            .push(NamespaceDecl::new("android", ANDROID_NS));
        root.children.push(Node::Element(title));
        root.children.push(Node::Text(Text {
            line: 4,
            comment: None,
            text: "hello".to_string(),
            value: ResolvedValue::Null,
        }));
        XmlTree {
            utf8: false,
            nodes: vec![Node::Element(root)],
        }
    }

    #[test]
    fn json_tree_builds_back() {
        let session = session();
        let bytes = session.encode_xml(&layout()).unwrap();
        let decoded = session.decode_xml(&bytes).unwrap();

        let json = serde_json::to_string_pretty(&decoded).unwrap();
        assert_eq!(serde_json::from_str::<XmlTree>(&json).unwrap(), decoded);
        assert_eq!(build(&session, &json).unwrap(), bytes);
    }

    #[test]
    fn json_tree_must_resolve() {
        let json = serde_json::to_string(&layout()).unwrap();
        assert!(matches!(
            build(&Session::empty(), &json),
            Err(RwError::Resources(_))
        ));
        assert!(matches!(
            build(&Session::empty(), "{\"utf8\": true}"),
            Err(RwError::Json(_))
        ));
    }

    #[test]
    fn duplicated_inputs_are_decoded_once() {
        let inputs = ["a.xml", "b.xml", "a.xml", "c.xml", "b.xml"];
        assert_eq!(
            unique_inputs(inputs.iter().copied()),
            ["a.xml", "b.xml", "c.xml"]
        );
    }
}
