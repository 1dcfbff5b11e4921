use serde::{Deserialize, Serialize};
use webpbin_av::ToolsConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub encode: EncodeConfig,
}

/// Defaults applied when the command line does not say otherwise.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EncodeConfig {
    /// Compression factor (0-100). Unset lets each tool use its own default.
    #[serde(default)]
    pub quality: Option<u32>,

    /// Encode still images losslessly.
    #[serde(default)]
    pub lossless: bool,
}
