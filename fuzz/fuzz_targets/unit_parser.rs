#![no_main]

use libfuzzer_sys::fuzz_target;
use qtorsion::loader::{parse_unit, Layout};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed units must come back as errors, never panics
        let layout = Layout::detect(input).unwrap_or(Layout::Pair);
        if let Ok(unit) = parse_unit("fuzz.json", input, layout) {
            let expected = match layout {
                Layout::Pair => 2,
                Layout::Triple => 3,
            };
            assert_eq!(unit.jobs().count(), expected);
            assert_eq!(unit.pair_ac().is_some(), layout == Layout::Triple);
            for job in unit.jobs() {
                assert!((0.0..=1.0).contains(&job.record.p0()));
            }
        }
    }
});
