//! Projection of global settings into sub-task configurations
//!
//! A global value only replaces a sub-task's own setting when the user
//! actually gave one. Unset globals never clobber sub-task defaults.

use serde_json::Value;

use super::{SubTaskConfig, SubTaskConfigs};
use crate::options::GlobalOverrides;

/// Sub-task configurations after global settings have been applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfig {
    pub connect: SubTaskConfigs,
    pub watch: SubTaskConfigs,
}

impl MergedConfig {
    /// The connect entry driving the dev server.
    pub fn server(&self) -> Option<&SubTaskConfig> {
        self.connect.get("devServer").or_else(|| self.connect.values().next())
    }

    /// All watch patterns across watch entries.
    pub fn watch_patterns(&self) -> Vec<String> {
        self.watch.values().flat_map(|w| w.files.iter().cloned()).collect()
    }
}

/// Option keys paired with the defined override values.
fn defined(overrides: &GlobalOverrides) -> Vec<(&'static str, Value)> {
    let mut values = Vec::new();
    if let Some(livereload) = overrides.livereload {
        values.push(("livereload", Value::Bool(livereload)));
    }
    if let Some(open) = overrides.open {
        values.push(("open", Value::Bool(open)));
    }
    if let Some(port) = overrides.port {
        values.push(("port", Value::from(port)));
    }
    if let Some(port) = overrides.livereload_port {
        values.push(("livereloadPort", Value::from(port)));
    }
    values
}

/// Apply `overrides` to the `options` bag of every sub-task config.
pub fn merge_sub_configs(configs: &SubTaskConfigs, overrides: &GlobalOverrides) -> SubTaskConfigs {
    let values = defined(overrides);

    configs
        .iter()
        .map(|(name, config)| {
            let mut merged = config.clone();
            for (key, value) in &values {
                merged.options.insert((*key).to_string(), value.clone());
            }
            (name.clone(), merged)
        })
        .collect()
}
