//! Layered merging of TOML documents.

use std::collections::BTreeSet;

/// Dotted paths of every leaf a file overlay set explicitly.
pub type FieldSet = BTreeSet<String>;

/// Recursively deep-merge `overlay` into `base`, recording each leaf path the
/// overlay touched into `touched`.
///
/// Tables merge per key; scalars and arrays from the overlay replace the base
/// value.
pub fn deep_merge(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    touched: &mut FieldSet,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val, &path, touched);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, touched);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            touched.insert(prefix.to_owned());
        },
    }
}

/// Set the value at a dotted `path`, creating intermediate tables.
pub fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let toml::Value::Table(table) = current else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

fn record_leaves(val: &toml::Value, prefix: &str, touched: &mut FieldSet) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join(prefix, key), touched);
        }
    } else {
        touched.insert(prefix.to_owned());
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
