use std::collections::HashSet;
use std::sync::Mutex;

/// Remembers which CIDs this connection has already confirmed are on the
/// server, so the proxy only attaches `data` to a `PayloadRef` the first
/// time a given blob is referenced.
#[derive(Default)]
pub struct CidCache {
    known: Mutex<HashSet<String>>,
}

impl CidCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_known(&self, cid: &str) -> bool {
        self.known.lock().expect("cid cache lock poisoned").contains(cid)
    }

    pub fn mark_known(&self, cid: &str) {
        self.known.lock().expect("cid cache lock poisoned").insert(cid.to_string());
    }

    pub fn mark_many_known<'a>(&self, cids: impl IntoIterator<Item = &'a str>) {
        let mut known = self.known.lock().expect("cid cache lock poisoned");
        for cid in cids {
            known.insert(cid.to_string());
        }
    }
}
