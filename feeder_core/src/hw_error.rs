//! Maps `Box<dyn Error>` from trait boundaries to typed `FeederError`.
//!
//! The traits in `feeder_traits` return `Box<dyn Error + Send + Sync>`; with
//! the `hardware-errors` feature the known `feeder_hardware::HwError` variants
//! are mapped precisely, anything else falls back to the message text.

use crate::error::FeederError;

/// Map a device-side error to a typed `FeederError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FeederError {
    #[cfg(feature = "hardware-errors")]
    {
        use feeder_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => FeederError::Timeout,
                HwError::Mqtt(_) | HwError::Disconnected => FeederError::Network(hw.to_string()),
                other => FeederError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        FeederError::Timeout
    } else {
        FeederError::Hardware(s)
    }
}

/// Same as [`map_hw_error`] for the boxed form the traits return.
pub fn map_boxed(e: Box<dyn std::error::Error + Send + Sync>) -> FeederError {
    map_hw_error(e.as_ref())
}
