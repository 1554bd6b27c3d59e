//! Test data builders for creating test objects

use svpub_rs::config::{ChannelConfig, PublisherConfig};
use svpub_rs::types::ValueMode;

/// Builder for creating test publisher configurations
pub struct ConfigBuilder {
    config: PublisherConfig,
}

impl ConfigBuilder {
    /// Start from defaults with no channels
    pub fn new(interface: &str) -> Self {
        let mut config = PublisherConfig::default();
        config.interface = interface.to_string();
        config.channels.clear();
        Self { config }
    }

    pub fn channel(mut self, name: &str, values: &[ValueMode]) -> Self {
        self.config
            .channels
            .push(ChannelConfig::new(name, values.to_vec()));
        self
    }

    pub fn hertz(mut self, hertz: u32) -> Self {
        self.config.signal.hertz = hertz;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.signal.sample_rate = sample_rate;
        self
    }

    pub fn amplitude(mut self, amplitude: f32) -> Self {
        self.config.signal.amplitude = amplitude;
        self
    }

    pub fn displacement(mut self, displacement_y: f32) -> Self {
        self.config.signal.displacement_y = displacement_y;
        self
    }

    pub fn build(self) -> PublisherConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new("eth1")
            .channel("bay1", &[ValueMode::Sine, ValueMode::Timestamp])
            .hertz(60)
            .amplitude(230.0)
            .build();

        assert_eq!(config.interface, "eth1");
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.signal.hertz, 60);
        assert_eq!(config.signal.amplitude, 230.0);
        assert!(config.validate().is_ok());
    }
}
