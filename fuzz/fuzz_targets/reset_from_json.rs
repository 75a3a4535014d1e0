#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_core::StateContainer;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut container = StateContainer::new();
    let before = container.export();
    match container.reset_from_json_str(text) {
        Ok(()) => {
            // whatever was accepted must survive its own round trip
            let exported = container.to_json_string().expect("export serializes");
            let mut again = StateContainer::with_task(container.task().clone());
            again.reset_from_json_str(&exported).expect("export is accepted");
            assert_eq!(again.export(), container.export());
        }
        Err(_) => assert_eq!(container.export(), before),
    }
});
