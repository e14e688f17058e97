#![no_main]
use geolookup::{DatabaseConfig, LookupService, RetryPolicy};
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

fn service() -> &'static LookupService {
    static SERVICE: OnceLock<LookupService> = OnceLock::new();
    SERVICE.get_or_init(|| {
        let config = DatabaseConfig::new("country", "/tmp/country.mmdb", "country.iso_code", "00")
            .expect("valid config");
        LookupService::with_databases(vec![config], RetryPolicy::Never).expect("valid service")
    })
}

fuzz_target!(|data: &[u8]| {
    // Any IP text resolves or is rejected as a client error
    if let Ok(ip) = std::str::from_utf8(data) {
        let response = service().query("country", ip);
        assert!(response.status == 200 || response.status == 400);
    }
});
