use std::collections::HashSet;
use std::sync::Arc;

use cideldill_types::Placeholder;

use crate::serializable::Serializable;

/// How many attribute levels the graceful-degradation walk descends before
/// giving up and recording a `failed_attributes` entry instead of nesting
/// further. 2 mirrors a typical "one struct of structs" debug view without
/// risking runaway output on deep object graphs.
pub const DEFAULT_DEPTH: u32 = 2;

/// Builds a [`Placeholder`] for a value whose encoder raised, recursing
/// into its attributes up to `depth` levels and detecting cycles by
/// identity. `visited` is fresh per top-level `serialize` call — there is
/// no global or thread-local lock here, so re-entrant calls on the same
/// thread (e.g. a value's own `repr()` recursing into `serialize`) just
/// work as ordinary recursive calls.
pub fn degrade(value: &dyn Serializable, pickle_error: String, depth: u32, visited: &mut HashSet<usize>) -> Placeholder {
    let id = value.identity();
    if !visited.insert(id) {
        return Placeholder::circular(value.type_name(), value.object_repr());
    }

    let mut placeholder = Placeholder::new(value.type_name(), value.module(), value.object_repr(), pickle_error, depth);

    if depth > 0 {
        for (name, attr) in value.attributes() {
            degrade_attribute(&mut placeholder, name, attr, depth, visited);
        }
    }

    visited.remove(&id);
    placeholder
}

fn degrade_attribute(placeholder: &mut Placeholder, name: String, attr: Arc<dyn Serializable>, depth: u32, visited: &mut HashSet<usize>) {
    match attr.try_to_json() {
        Ok(value) => {
            placeholder.attributes.insert(name, crate::encode::encode_value(value, cideldill_types::Format::Json));
        }
        Err(pickle_error) => {
            // A back-edge to an identity already on the stack must still be
            // recognized as a cycle even past the depth budget — otherwise it
            // silently becomes an ordinary failed attribute instead of a
            // `circular` placeholder.
            let is_cycle = visited.contains(&attr.identity());
            if depth > 1 || is_cycle {
                let nested = degrade(attr.as_ref(), pickle_error, depth.saturating_sub(1), visited);
                placeholder.attributes.insert(name, crate::encode::encode_placeholder(nested));
            } else {
                placeholder.failed_attributes.insert(name, pickle_error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializable::Unpicklable;

    #[test]
    fn degrade_records_pickle_error_and_identity() {
        let value = Unpicklable::new("Socket", "<socket fd=7>", "cannot pickle 'socket' object");
        let mut visited = HashSet::new();
        let placeholder = degrade(&value, "cannot pickle 'socket' object".to_string(), DEFAULT_DEPTH, &mut visited);
        assert_eq!(placeholder.type_name, "Socket");
        assert_eq!(placeholder.object_name, "<socket fd=7>");
        assert_eq!(placeholder.pickle_error, "cannot pickle 'socket' object");
        assert!(placeholder.marker);
    }

    /// A node whose only attribute is itself, built with `Arc::new_cyclic`
    /// so the attribute's identity is genuinely the node's own — `Unpicklable`'s
    /// builder can't express this since every `with_attr` call allocates a
    /// fresh `Arc`, changing identity before the attribute could reference it.
    struct SelfCyclicNode {
        self_ref: std::sync::Weak<SelfCyclicNode>,
    }

    impl Serializable for SelfCyclicNode {
        fn try_to_json(&self) -> Result<serde_json::Value, String> {
            Err("cannot pickle 'Node' object".to_string())
        }

        fn type_name(&self) -> String {
            "Node".to_string()
        }

        fn object_repr(&self) -> String {
            "<node>".to_string()
        }

        fn attributes(&self) -> Vec<(String, Arc<dyn Serializable>)> {
            match self.self_ref.upgrade() {
                Some(arc) => vec![("self_ref".to_string(), arc as Arc<dyn Serializable>)],
                None => Vec::new(),
            }
        }

        fn identity(&self) -> usize {
            self as *const Self as usize
        }
    }

    #[test]
    fn degrade_detects_self_cycle() {
        let node: Arc<SelfCyclicNode> = Arc::new_cyclic(|weak| SelfCyclicNode { self_ref: weak.clone() });
        let mut visited = HashSet::new();
        let placeholder = degrade(node.as_ref(), "cannot pickle 'Node' object".to_string(), 3, &mut visited);

        assert!(placeholder.attributes.contains_key("self_ref"));
        assert!(placeholder.failed_attributes.is_empty());

        let nested_bytes = &placeholder.attributes["self_ref"].bytes;
        let nested: Placeholder = serde_json::from_slice(nested_bytes).unwrap();
        assert!(nested.marker);
        assert_eq!(nested.type_name, "Node");
        assert_eq!(nested.object_name, "<node>");
        // the cycle is detected before any recursive attribute walk, so the
        // back-edge placeholder carries no attributes of its own
        assert!(nested.attributes.is_empty());
    }

    #[test]
    fn degrade_returns_circular_marker_when_identity_is_already_visited() {
        let value = Unpicklable::new("Node", "<node>", "cannot pickle 'Node' object");
        let mut visited = HashSet::new();
        visited.insert(value.identity());

        let placeholder = degrade(&value, "cannot pickle 'Node' object".to_string(), DEFAULT_DEPTH, &mut visited);
        assert!(placeholder.marker);
        assert_eq!(placeholder.type_name, "Node");
        assert_eq!(placeholder.object_name, "<node>");
        assert!(placeholder.attributes.is_empty());
    }

    #[test]
    fn degrade_stops_recursing_at_depth_zero() {
        let leaf = Unpicklable::new("Leaf", "<leaf>", "boom");
        let root = Unpicklable::new("Root", "<root>", "boom").with_attr("child", Arc::new(leaf));
        let mut visited = HashSet::new();
        let placeholder = degrade(&root, "boom".to_string(), 1, &mut visited);
        assert!(placeholder.attributes.get("child").is_none());
        assert_eq!(placeholder.failed_attributes.get("child").map(String::as_str), Some("boom"));
    }
}
