//! Operations on the YAML tree
//!
//! Keys are case-insensitive: they are stored lower-cased and looked up the
//! same way.

use anyhow::{anyhow, Result};
use serde_yaml::{Mapping, Value};
use tracing::warn;

pub(crate) const ENV_PREFIX: &str = "NEDERADIO_CONFIG__";

fn key(segment: &str) -> Value {
    Value::String(segment.to_lowercase())
}

/// Node at `path`; an empty path is the whole tree
pub(crate) fn lookup<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter()
        .enumerate()
        .try_fold(root, |node, (depth, segment)| {
            let map = node
                .as_mapping()
                .ok_or_else(|| anyhow!("{} is not a section", path[..depth].join(".")))?;
            map.get(&key(segment))
                .ok_or_else(|| anyhow!("{} not found", path[..=depth].join(".")))
        })
}

/// Stores `value` at `path`, creating intermediate sections
pub(crate) fn insert(root: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };
    let mut node = root;
    for segment in parents {
        let map = node
            .as_mapping_mut()
            .ok_or_else(|| anyhow!("cannot descend into {}: not a section", segment))?;
        node = map
            .entry(key(segment))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    node.as_mapping_mut()
        .ok_or_else(|| anyhow!("cannot set {}: parent is not a section", last))?
        .insert(key(last), value);
    Ok(())
}

/// Overlays `overlay` on `base`
///
/// Sections merge key by key; anything else (scalars, lists) replaces the
/// base value.
pub(crate) fn overlay(base: &mut Value, overlay_value: &Value) {
    match (base, overlay_value) {
        (Value::Mapping(base_map), Value::Mapping(over_map)) => {
            for (k, v) in over_map {
                if let Some(existing) = base_map.get_mut(k) {
                    overlay(existing, v);
                } else {
                    base_map.insert(k.clone(), v.clone());
                }
            }
        }
        (slot, v) => *slot = v.clone(),
    }
}

pub(crate) fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lowercase_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Applies `NEDERADIO_CONFIG__SECTION__KEY=value` style variables
///
/// Values are parsed as YAML so numbers and booleans keep their type.
pub(crate) fn apply_env<I>(root: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path: Vec<&str> = rest.split("__").collect();
        let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw.clone()));
        if let Err(e) = insert(root, &path, value) {
            warn!(env_var = %name, "Environment override ignored: {}", e);
        }
    }
}
