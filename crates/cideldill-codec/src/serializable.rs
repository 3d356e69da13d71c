use std::sync::Arc;

/// The escape hatch for values the codec can't represent as JSON directly.
///
/// Rust has no runtime `repr`/`__class__` the way the host language this
/// substrate was designed for does, so callers that wrap a value which
/// might not be cleanly serializable implement this trait instead of
/// relying on a universal `Serialize` bound — an opaque value escape hatch
/// for open polymorphism. Anything that is plain old `Serialize` data gets
/// the blanket impl below and never degrades.
pub trait Serializable {
    /// Attempt to represent this value as JSON. `Err` carries the
    /// "encoder raised" message and triggers graceful degradation.
    fn try_to_json(&self) -> Result<serde_json::Value, String>;

    fn type_name(&self) -> String;

    fn module(&self) -> String {
        "builtins".to_string()
    }

    /// Best-effort `repr`/`__class__`-style label.
    fn object_repr(&self) -> String {
        format!("<{}>", self.type_name())
    }

    /// Public attributes to walk when degrading.
    fn attributes(&self) -> Vec<(String, Arc<dyn Serializable>)> {
        Vec::new()
    }

    /// Identity key for cycle detection during degradation (step 4). Two
    /// calls against the same underlying object during one serialize must
    /// return the same key.
    fn identity(&self) -> usize;
}

/// Anything `Serialize` always encodes cleanly — there is no "unpicklable"
/// case for ordinary Rust data, so the blanket impl never degrades.
impl<T: serde::Serialize> Serializable for T {
    fn try_to_json(&self) -> Result<serde_json::Value, String> {
        serde_json::to_value(self).map_err(|e| e.to_string())
    }

    fn type_name(&self) -> String {
        std::any::type_name::<T>().to_string()
    }

    fn identity(&self) -> usize {
        self as *const T as usize
    }
}

/// Wraps a resource that genuinely cannot be serialized (an open socket, a
/// live connection handle, …) so the degradation path has something real
/// to exercise. `kind`/`label` stand in for `type(x).__name__`/`repr(x)`;
/// `pickle_error` is the message the (hypothetical) native encoder raised.
///
/// Held behind `Arc` so a cyclic attribute graph (`a.attr == a`) can share
/// one identity across edges, the way the host language's object identity
/// does — cycle detection in the degrade algorithm keys off `identity()`,
/// which here is the `Arc`'s pointer address.
#[derive(Clone)]
pub struct Unpicklable {
    inner: Arc<UnpicklableInner>,
}

struct UnpicklableInner {
    kind: String,
    module: String,
    label: String,
    pickle_error: String,
    attrs: Vec<(String, Arc<dyn Serializable>)>,
}

impl Unpicklable {
    pub fn new(kind: impl Into<String>, label: impl Into<String>, pickle_error: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(UnpicklableInner {
                kind: kind.into(),
                module: "unknown".to_string(),
                label: label.into(),
                pickle_error: pickle_error.into(),
                attrs: Vec::new(),
            }),
        }
    }

    pub fn with_module(self, module: impl Into<String>) -> Self {
        // `Arc::get_mut` only succeeds while we hold the sole reference,
        // which is always true right after `new()`.
        let mut inner = Arc::try_unwrap(self.inner).unwrap_or_else(|arc| (*arc).clone_fields());
        inner.module = module.into();
        Self { inner: Arc::new(inner) }
    }

    pub fn with_attr(self, name: impl Into<String>, value: Arc<dyn Serializable>) -> Self {
        let mut inner = Arc::try_unwrap(self.inner).unwrap_or_else(|arc| (*arc).clone_fields());
        inner.attrs.push((name.into(), value));
        Self { inner: Arc::new(inner) }
    }
}

impl UnpicklableInner {
    fn clone_fields(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            module: self.module.clone(),
            label: self.label.clone(),
            pickle_error: self.pickle_error.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

impl Serializable for Unpicklable {
    fn try_to_json(&self) -> Result<serde_json::Value, String> {
        Err(self.inner.pickle_error.clone())
    }

    fn type_name(&self) -> String {
        self.inner.kind.clone()
    }

    fn module(&self) -> String {
        self.inner.module.clone()
    }

    fn object_repr(&self) -> String {
        self.inner.label.clone()
    }

    fn attributes(&self) -> Vec<(String, Arc<dyn Serializable>)> {
        self.inner.attrs.clone()
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}
