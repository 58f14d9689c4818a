//! Suite registry: the authoritative, ordered list of suites built once
//! from configuration.

use std::collections::HashMap;
use switchboard_config::{SwitchboardConfig, TransportConfig};
use switchboard_core::{Result, TopLevelTool};

/// Identity of one downstream suite
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteDescriptor {
    /// Suite name, also its top-level tool name
    pub name: String,
    pub description: String,
    /// Connection parameters, opaque to routing
    pub transport: TransportConfig,
}

/// Immutable mapping from top-level tool name to suite
#[derive(Debug, Clone, Default)]
pub struct SuiteRegistry {
    suites: Vec<SuiteDescriptor>,
    index: HashMap<String, usize>,
}

impl SuiteRegistry {
    /// Build the registry from enabled suites, in configuration order.
    ///
    /// The whole configuration is validated first, so a bad suite fails
    /// startup before anything connects.
    pub fn from_config(config: &SwitchboardConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = Self::default();
        for suite in config.enabled_suites() {
            registry.index.insert(suite.name.clone(), registry.suites.len());
            registry.suites.push(SuiteDescriptor {
                name: suite.name.clone(),
                description: suite.description(),
                transport: suite.transport()?,
            });
        }
        Ok(registry)
    }

    pub fn list_top_level_tools(&self) -> Vec<TopLevelTool> {
        self.suites
            .iter()
            .map(|suite| TopLevelTool {
                name: suite.name.clone(),
                description: suite.description.clone(),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&SuiteDescriptor> {
        self.index.get(name).map(|&i| &self.suites[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

/// Top-level tool catalog for a configuration; a pure function of it.
pub fn list_top_level_tools(config: &SwitchboardConfig) -> Result<Vec<TopLevelTool>> {
    Ok(SuiteRegistry::from_config(config)?.list_top_level_tools())
}
