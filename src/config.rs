/*!
 * Synchronization Configuration
 *
 * Runtime tuning for the adaptive spin phase that runs before a contended
 * acquirer parks.
 */

use std::time::Duration;

/// Spin tuning for contended acquisition
///
/// A contended acquirer spins briefly (retrying the CAS) before announcing
/// contention and parking. Short critical sections resolve during the spin
/// phase and skip the park syscall entirely.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Spin duration before parking
    pub spin_duration: Duration,
    /// Maximum spin iterations before parking
    pub max_spins: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spin_duration: Duration::from_micros(10),
            max_spins: 100,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (< 1ms hold times expected)
    pub const fn low_latency() -> Self {
        Self {
            spin_duration: Duration::from_micros(50),
            max_spins: 500,
        }
    }

    /// Configuration optimized for long hold times (> 1ms expected)
    ///
    /// Parks almost immediately instead of burning CPU on a spin phase.
    pub const fn long_wait() -> Self {
        Self {
            spin_duration: Duration::from_micros(1),
            max_spins: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(config.max_spins > 0);
        assert!(config.spin_duration > Duration::ZERO);
    }

    #[test]
    fn test_presets_differ() {
        assert!(SyncConfig::low_latency().max_spins > SyncConfig::long_wait().max_spins);
    }
}
