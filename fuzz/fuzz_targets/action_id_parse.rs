#![no_main]

use kudos_types::ActionId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Some(action) = ActionId::parse(&raw) {
        let encoded = action.encode();
        let reparsed = ActionId::parse(&encoded);
        assert_eq!(reparsed, Some(action));
    }
});
