#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_core::entropy::DeterministicRng;
use strata_core::profile::{self, EntityProfile};
use strata_core::store::{BrowserStore, MemoryStore};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut store = MemoryStore::new();
    store.set("profile", text).expect("memory store");
    let mut rng = DeterministicRng::new(0);
    if let Ok((loaded, _)) = profile::load_or_create(&mut store, "profile", &mut rng) {
        let _ = loaded.display_name();
        let _ = loaded.image_bytes();
        let encoded = serde_json::to_string(&loaded).expect("profile serializes");
        let reparsed: EntityProfile = serde_json::from_str(&encoded).expect("round trip");
        assert_eq!(reparsed, loaded);
    }
});
