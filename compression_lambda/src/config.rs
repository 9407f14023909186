use std::env;

use crate::error::{CompressionError, Result};

pub const DEFAULT_QUALITY: u8 = 30;

/// Settings read once per container at cold start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Guard the write-back with `If-Match` on the ETag that was read.
    pub conditional_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            conditional_writes: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(raw) = lookup("COMPRESSION_QUALITY") {
            let quality = raw.trim().parse::<i64>().map_err(|_| {
                CompressionError::Config(format!("COMPRESSION_QUALITY={raw:?} is not an integer"))
            })?;
            config.quality = quality.clamp(1, 100) as u8;
        }

        if let Some(raw) = lookup("CONDITIONAL_WRITES") {
            config.conditional_writes = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(CompressionError::Config(format!(
                        "CONDITIONAL_WRITES={raw:?} is not a boolean"
                    )))
                }
            };
        }

        Ok(config)
    }
}
