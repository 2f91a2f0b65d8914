#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;

use idsmith::template::format;
use idsmith::template::{compose, ComposeContext, Template};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();

    // Arbitrary format strings must never panic.
    let _ = format::date(&at, Some(&text));
    let _ = format::rand20(0xABCDE, Some(&text));
    let _ = format::seq(u64::MAX, Some(&text), None);

    // Arbitrary template JSON either fails to parse or composes without panicking.
    if let Ok(template) = Template::from_json(&text) {
        let ctx = ComposeContext::new(at).with_sequence(42);
        let _ = compose(&template, &ctx, &mut StdRng::seed_from_u64(0));
    }
});
