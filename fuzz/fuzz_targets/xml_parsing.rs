#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(document) = rw_resources::decode_xml(data) {
        let _ = rw_resources::encode_xml(&document);
        if let Ok(tree) = document.to_tree(None) {
            let _ = tree.to_document(None);
        }
    }
});
