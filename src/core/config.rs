// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 beebrx contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Machine configuration
//!
//! TOML-deserialised setup for a [`crate::core::system::System`]: which
//! drives carry media, write-protect tabs, and diagnostic switches.
//!
//! ```toml
//! [fdc]
//! log_commands = true
//!
//! [[drives]]
//! blank_disc = true
//! double_sided = false
//! write_protect = false
//!
//! [[drives]]
//!
//! [jit]
//! debug = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{EmulatorError, Result};

/// Top-level machine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Disc controller switches
    pub fdc: FdcConfig,

    /// Up to two drive bays; extras are ignored
    pub drives: Vec<DriveConfig>,

    /// JIT compiler switches
    pub jit: JitConfig,
}

/// Disc controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FdcConfig {
    /// Log command dispatch and completion at info level
    pub log_commands: bool,
}

/// One drive bay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Insert a blank disc at power-on
    pub blank_disc: bool,

    /// The inserted disc has two sides
    pub double_sided: bool,

    /// The inserted disc's write-protect tab is set
    pub write_protect: bool,
}

/// JIT compiler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    /// Insert a host debug trap before every compiled instruction
    pub debug: bool,
}

impl MachineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| EmulatorError::Config(err.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config = MachineConfig::from_toml_str("").unwrap();
        assert!(!config.fdc.log_commands);
        assert!(config.drives.is_empty());
        assert!(!config.jit.debug);
    }

    #[test]
    fn test_full_config_round_trip() {
        let config = MachineConfig::from_toml_str(
            r#"
            [fdc]
            log_commands = true

            [[drives]]
            blank_disc = true
            double_sided = true
            write_protect = true

            [[drives]]
            blank_disc = false

            [jit]
            debug = true
            "#,
        )
        .unwrap();

        assert!(config.fdc.log_commands);
        assert_eq!(config.drives.len(), 2);
        assert!(config.drives[0].blank_disc);
        assert!(config.drives[0].double_sided);
        assert!(!config.drives[1].blank_disc);
        assert!(config.jit.debug);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(MachineConfig::from_toml_str("fdc = 3").is_err());
    }
}
