//! Materializer-facing configuration surface.
//!
//! `SPEC_FULL.md` §6 names `MaterializerSettings` with four fields. This
//! module expands it into a validated [`Settings`] value built through a
//! [`SettingsBuilder`], the convention this pack's larger crates use for
//! config surfaces that must be checked once at construction rather than
//! lazily at first use.

use thiserror::Error;

/// Validation failures for a [`SettingsBuilder`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("initial_input_buffer_size must be in [1, max_input_buffer_size]")]
    InvalidInitialInputBufferSize,

    #[error("max_input_buffer_size must be a power of two")]
    MaxInputBufferSizeNotPowerOfTwo,

    #[error("initial_fan_out_buffer_size must be in [1, max_fan_out_buffer_size]")]
    InvalidInitialFanOutBufferSize,

    #[error("max_fan_out_buffer_size must be at least 1")]
    MaxFanOutBufferSizeZero,
}

/// Immutable, validated configuration for a processor stage.
///
/// Mirrors `MaterializerSettings`: an initial and a maximum buffer size for
/// the input side, and the analogous pair for the fan-out side. Cannot be
/// reconfigured after construction (dynamic reconfiguration is a non-goal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    initial_input_buffer_size: u64,
    max_input_buffer_size: u64,
    initial_fan_out_buffer_size: u64,
    max_fan_out_buffer_size: u64,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub const fn initial_input_buffer_size(&self) -> u64 {
        self.initial_input_buffer_size
    }

    pub const fn max_input_buffer_size(&self) -> u64 {
        self.max_input_buffer_size
    }

    pub const fn initial_fan_out_buffer_size(&self) -> u64 {
        self.initial_fan_out_buffer_size
    }

    pub const fn max_fan_out_buffer_size(&self) -> u64 {
        self.max_fan_out_buffer_size
    }
}

impl Default for Settings {
    fn default() -> Self {
        SettingsBuilder::default()
            .build()
            .expect("default settings are always valid")
    }
}

/// Builder for [`Settings`], validated on [`SettingsBuilder::build`].
#[derive(Debug, Clone, Copy)]
pub struct SettingsBuilder {
    initial_input_buffer_size: u64,
    max_input_buffer_size: u64,
    initial_fan_out_buffer_size: u64,
    max_fan_out_buffer_size: u64,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self {
            initial_input_buffer_size: 16,
            max_input_buffer_size: 16,
            initial_fan_out_buffer_size: 16,
            max_fan_out_buffer_size: 16,
        }
    }
}

impl SettingsBuilder {
    pub fn initial_input_buffer_size(mut self, n: u64) -> Self {
        self.initial_input_buffer_size = n;
        self
    }

    pub fn max_input_buffer_size(mut self, n: u64) -> Self {
        self.max_input_buffer_size = n;
        self
    }

    pub fn initial_fan_out_buffer_size(mut self, n: u64) -> Self {
        self.initial_fan_out_buffer_size = n;
        self
    }

    pub fn max_fan_out_buffer_size(mut self, n: u64) -> Self {
        self.max_fan_out_buffer_size = n;
        self
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        if !self.max_input_buffer_size.is_power_of_two() {
            return Err(ConfigError::MaxInputBufferSizeNotPowerOfTwo);
        }
        if self.initial_input_buffer_size == 0
            || self.initial_input_buffer_size > self.max_input_buffer_size
        {
            return Err(ConfigError::InvalidInitialInputBufferSize);
        }
        if self.max_fan_out_buffer_size == 0 {
            return Err(ConfigError::MaxFanOutBufferSizeZero);
        }
        if self.initial_fan_out_buffer_size == 0
            || self.initial_fan_out_buffer_size > self.max_fan_out_buffer_size
        {
            return Err(ConfigError::InvalidInitialFanOutBufferSize);
        }

        Ok(Settings {
            initial_input_buffer_size: self.initial_input_buffer_size,
            max_input_buffer_size: self.max_input_buffer_size,
            initial_fan_out_buffer_size: self.initial_fan_out_buffer_size,
            max_fan_out_buffer_size: self.max_fan_out_buffer_size,
        })
    }
}
