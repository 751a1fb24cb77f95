use std::collections::HashMap;
use std::sync::Arc;

/// Registry of assets compiled into the binary, addressed as `res:<key>`.
///
/// ```ignore
/// let assets = EmbeddedAssets::new()
///     .with("textures/floor.png", include_bytes!("../assets/floor.png"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedAssets {
    entries: Arc<HashMap<String, &'static [u8]>>,
}

impl EmbeddedAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, bytes: &'static [u8]) -> Self {
        Arc::make_mut(&mut self.entries).insert(normalize(&key.into()).to_owned(), bytes);
        self
    }

    pub fn get(&self, key: &str) -> Option<&'static [u8]> {
        self.entries.get(normalize(key)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(key: &str) -> &str {
    key.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slashes_are_ignored() {
        let assets = EmbeddedAssets::new().with("/a/b.png", b"xyz");
        assert_eq!(assets.get("a/b.png"), Some(&b"xyz"[..]));
        assert_eq!(assets.get("//a/b.png"), Some(&b"xyz"[..]));
    }

    #[test]
    fn clones_share_entries() {
        let assets = EmbeddedAssets::new().with("k", b"1");
        let clone = assets.clone();
        assert_eq!(clone.len(), 1);
        assert!(clone.get("missing").is_none());
    }
}
