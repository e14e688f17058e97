#![no_main]
use geolookup::data_section::DataDecoder;
use geolookup::resolver::render;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary data-section bytes: decode from a few offsets and render
    let decoder = DataDecoder::new(data, 0);
    for offset in [0u32, 1, 2, (data.len() / 2) as u32] {
        if let Ok(value) = decoder.decode(offset) {
            let _ = render(&value);
        }
    }
});
