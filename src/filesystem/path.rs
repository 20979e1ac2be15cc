//! Conversions between directory keys, leaf names and full object keys.
//!
//! Directory keys end in `/` (the root key is empty); file keys never do.
//! Every function here is total: malformed input yields an empty name,
//! which callers treat as "not a valid entry".

use crate::storage::DELIMITER;

pub fn trim_slashes(key: &str) -> &str {
    key.trim_matches('/')
}

/// Full key of `name` inside the directory keyed `parent`. An empty name
/// gives an empty key.
pub fn child_key(parent: &str, name: &str) -> String {
    let parent = trim_slashes(parent);
    let name = trim_slashes(name);
    if name.is_empty() {
        String::new()
    } else if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", parent, DELIMITER, name)
    }
}

/// Key of the directory `name` inside `parent`, with its trailing `/`.
pub fn child_directory_key(parent: &str, name: &str) -> String {
    directory_key(&child_key(parent, name))
}

/// Normalizes any key to directory form. The root stays empty.
pub fn directory_key(key: &str) -> String {
    let trimmed = trim_slashes(key);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}{}", trimmed, DELIMITER)
    }
}

/// Last non-empty `/`-separated segment of `key`.
pub fn leaf_name(key: &str) -> &str {
    key.split('/').filter(|s| !s.is_empty()).next_back().unwrap_or("")
}
