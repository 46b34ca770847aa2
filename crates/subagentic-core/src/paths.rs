//! Standard paths used by SubAgentic tools

use std::path::PathBuf;

/// Standard SubAgentic paths
pub struct Paths {
    /// Data directory (~/.local/share/subagentic)
    pub data: PathBuf,
    /// Config directory (~/.config/subagentic)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("subagentic");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("subagentic");

        Self { data, config }
    }

    /// Get the config file path for a tool (e.g. `governance.yaml`)
    pub fn config_file(&self, tool: &str) -> PathBuf {
        self.config.join(format!("{}.yaml", tool))
    }
}
