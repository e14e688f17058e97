#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Opening garbage must fail cleanly, never panic
    if let Ok(reader) = geolookup::Reader::from_bytes(data.to_vec()) {
        let _ = reader.metadata();
        let _ = reader.lookup_str("8.8.8.8");
        let _ = reader.lookup_str("2001:4860:4860::8888");
    }
});
