use super::{parse_duration_string, Config};
use crate::error::{Error, Result};

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.port_start == 0 {
            return Err(Error::Validation(
                "portStart must be between 1 and 65535".to_string(),
            ));
        }

        if self.port_start >= self.port_end {
            return Err(Error::Validation(format!(
                "portStart ({}) must be less than portEnd ({})",
                self.port_start, self.port_end
            )));
        }

        let ttl = self.allocation_ttl.trim();
        if !ttl.is_empty() && parse_duration_string(ttl).is_none() {
            return Err(Error::Validation(format!(
                "allocationTTL '{}' is invalid. Use formats like '30m', '12h', '30d'",
                self.allocation_ttl
            )));
        }

        Ok(())
    }
}
