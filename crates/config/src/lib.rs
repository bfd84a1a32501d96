#![forbid(unsafe_code)]

mod error;
mod override_rc;
mod scan;
mod ui;

pub use error::Error;
pub use override_rc::OverrideRule;
pub use scan::Scan;
pub use ui::{RestartMode, Ui};

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub scan: Scan,
    pub ui: Ui,

    /// Ordered restart override rules; earlier rules win.
    pub override_rc: Vec<OverrideRule>,
}

impl Config {
    /// Load configuration from a TOML file. Missing fields are filled with defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(toml_edit::de::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        std::fs::write(path, toml_edit::ser::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load configuration from multiple TOML files. Later files override
    /// individual keys of earlier ones; `[[override_rc]]` rules accumulate
    /// in file order.
    pub fn load_multiple<T, U>(paths: U) -> Result<Self, Error>
    where
        T: AsRef<Path>,
        U: IntoIterator<Item = T>,
    {
        let mut layered = toml_edit::DocumentMut::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(path)?;
            let layer: toml_edit::DocumentMut = text.parse()?;
            apply_layer(&mut layered, &layer);
        }
        let config: Config = toml_edit::de::from_str(&layered.to_string())?;
        Ok(config)
    }
}

/// Apply one configuration layer on top of the accumulated document. The
/// config is one level deep, so a later `[scan]` or `[ui]` overrides field
/// by field, the `[[override_rc]]` rule list appends, and anything else
/// replaces wholesale.
fn apply_layer(base: &mut toml_edit::DocumentMut, layer: &toml_edit::DocumentMut) {
    use toml_edit::Item;
    for (key, item) in layer.iter() {
        match (base.entry(key).or_insert(Item::None), item) {
            (Item::Table(section), Item::Table(overrides)) => {
                for (field, value) in overrides.iter() {
                    section[field] = value.clone();
                }
            }
            (Item::ArrayOfTables(rules), Item::ArrayOfTables(extra)) => {
                for rule in extra.iter() {
                    rules.push(rule.clone());
                }
            }
            (slot, value) => *slot = value.clone(),
        }
    }
}
