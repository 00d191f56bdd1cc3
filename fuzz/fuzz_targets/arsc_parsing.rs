#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(table) = rw_resources::decode_table(data) {
        let _ = rw_resources::encode_table(&table);
    }
});
