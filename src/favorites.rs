use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// File name of the persisted favorites list inside the data directory.
pub const FAVORITES_FILE: &str = "findmy-favorites.json";

/// Two names whose similarity reaches this are the same favorite.
pub const MATCH_THRESHOLD: f64 = 0.8;

/// Ordered, case-insensitive character overlap of `a` and `b`, divided by
/// the length of the longer one.
///
/// The overlap is the longest in-order alignment of the two strings, so a
/// single substituted letter ("MikeSmith" / "MikeSmyth") only costs one
/// character. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();
    let (longer, shorter) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };

    if longer.is_empty() {
        return 1.0;
    }

    // Single-row LCS table over the shorter string.
    let mut row = vec![0usize; shorter.len() + 1];
    for &lc in longer.iter() {
        let mut diag = 0;
        for (j, &sc) in shorter.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if lc == sc {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }

    row[shorter.len()] as f64 / longer.len() as f64
}

pub fn matches(a: &str, b: &str) -> bool {
    similarity(a, b) >= MATCH_THRESHOLD
}

/// Favorite friend names, persisted as a JSON array of strings.
#[derive(Debug, Clone)]
pub struct Favorites {
    path: Option<PathBuf>,
    names: Vec<String>,
}

impl Favorites {
    /// Load from `path`. Any failure is logged and yields an empty list.
    pub fn load(path: &Path) -> Self {
        let names = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(names) => {
                    debug!(path = %path.display(), count = names.len(), "loaded favorites");
                    names
                }
                Err(e) => {
                    error!(path = %path.display(), "error loading favorites: {e}");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                error!(path = %path.display(), "error loading favorites: {e}");
                Vec::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            names,
        }
    }

    /// A list that is never written to disk.
    pub fn in_memory(names: Vec<String>) -> Self {
        Self { path: None, names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.names.iter().any(|fav| matches(fav, name))
    }

    /// Remove the first stored favorite matching `name`, or add `name` if none
    /// matches. Returns whether `name` is a favorite afterwards.
    pub fn toggle(&mut self, name: &str) -> bool {
        let now_favorite = match self.names.iter().position(|fav| matches(fav, name)) {
            Some(idx) => {
                let removed = self.names.remove(idx);
                debug!(name, %removed, "removed favorite");
                false
            }
            None => {
                self.names.push(name.to_string());
                debug!(name, "added favorite");
                true
            }
        };
        self.save();
        now_favorite
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let result = serde_json::to_string(&self.names)
            .map_err(std::io::Error::from)
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, json)
            });
        if let Err(e) = result {
            warn!(path = %path.display(), "error saving favorites: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_similarity_near_match() {
        assert!(similarity("MikeSmith", "MikeSmyth") >= MATCH_THRESHOLD);
        assert!(similarity("mike smith", "Mike Smith") == 1.0);
        assert!(matches("Jonathan", "jonathon"));
    }

    #[test]
    fn test_similarity_unrelated() {
        assert!(similarity("MikeSmith", "Anna Lee") < MATCH_THRESHOLD);
        assert!(similarity("alice", "bob") < MATCH_THRESHOLD);
        assert!(!matches("Carl", "Carla Jones"));
    }

    #[test]
    fn test_similarity_empty_strings() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("", "anna"), 0.0);
        assert_eq!(similarity("anna", ""), 0.0);
    }

    #[test]
    fn test_similarity_counts_chars_not_bytes() {
        assert_eq!(similarity("Zoë", "zoë"), 1.0);
        assert!((similarity("Zoë", "Zoe") - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut favs = Favorites::in_memory(Vec::new());
        assert!(favs.toggle("Mike Smith"));
        assert!(favs.is_favorite("mike smith"));
        assert!(favs.is_favorite("Mike Smyth"));
        assert!(!favs.toggle("Mike Smyth"));
        assert!(favs.names().is_empty());
    }

    #[test]
    fn test_toggle_removes_first_match_only() {
        let mut favs =
            Favorites::in_memory(vec!["anna".into(), "mike smith".into(), "mike smyth".into()]);
        assert!(!favs.toggle("Mike Smith"));
        assert_eq!(favs.names(), ["anna".to_string(), "mike smyth".to_string()]);
    }

    #[test]
    fn test_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(FAVORITES_FILE);

        let mut favs = Favorites::load(&path);
        assert!(favs.names().is_empty());
        favs.toggle("anna");
        favs.toggle("bob");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"["anna","bob"]"#);

        let reloaded = Favorites::load(&path);
        assert_eq!(reloaded.names(), ["anna".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FAVORITES_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let favs = Favorites::load(&path);
        assert!(favs.names().is_empty());
        assert!(!favs.is_favorite("anna"));
    }

    proptest! {
        #[test]
        fn prop_similarity_bounded_and_symmetric(a in "[a-zA-Z ]{0,16}", b in "[a-zA-Z ]{0,16}") {
            let ab = similarity(&a, &b);
            let ba = similarity(&b, &a);
            prop_assert!((0.0..=1.0).contains(&ab));
            prop_assert!((ab - ba).abs() < 1e-12);
        }

        #[test]
        fn prop_name_matches_itself(a in "[a-zA-Z ]{0,16}") {
            prop_assert_eq!(similarity(&a, &a.to_uppercase()), 1.0);
        }

        #[test]
        fn prop_toggle_twice_restores(
            existing in proptest::collection::vec("[a-z]{1,10}", 0..6),
            name in "[a-z]{1,10}",
        ) {
            let mut favs = Favorites::in_memory(existing.clone());
            let before = favs.names().to_vec();
            let first = favs.toggle(&name);
            // Only an added name is guaranteed to be the one removed again.
            if first {
                favs.toggle(&name);
                prop_assert_eq!(favs.names(), before.as_slice());
            }
        }
    }
}
