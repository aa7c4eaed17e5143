#![no_main]

use kudos_engine::extract_recognition;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let extraction = extract_recognition(&text);

    for mention in &extraction.mentions {
        assert!(!mention.is_empty());
        assert!(text.contains(&format!("<@{mention}")));
    }
    for signal in &extraction.signals {
        assert!(!signal.is_empty());
        assert!(text.contains(signal.as_str()));
    }

    match extraction.recipient() {
        Some(recipient) => {
            assert_eq!(extraction.mentions.len(), 1);
            assert_eq!(extraction.mentions[0], recipient);
        }
        None => assert_ne!(extraction.mentions.len(), 1),
    }
});
