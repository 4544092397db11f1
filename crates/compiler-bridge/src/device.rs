//! Device Types and State
//!
//! Android devices as `adb devices -l` reports them.

use serde::{Deserialize, Serialize};

/// Device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Device is online and ready
    Online,
    /// Device is offline
    Offline,
    /// Device is not authorized (need to accept on device)
    Unauthorized,
    /// Device is in bootloader mode
    Bootloader,
    /// Device is in recovery mode
    Recovery,
    /// Unknown state
    Unknown,
}

impl DeviceState {
    /// Parse the state column of `adb devices`
    pub fn from_adb(word: &str) -> Self {
        match word {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "bootloader" => DeviceState::Bootloader,
            "recovery" => DeviceState::Recovery,
            _ => DeviceState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "device",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Bootloader => "bootloader",
            DeviceState::Recovery => "recovery",
            DeviceState::Unknown => "unknown",
        }
    }
}

/// Device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    /// Physical device connected via USB/WiFi
    Physical,
    /// Android emulator
    Emulator,
}

/// Device information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Device serial number
    pub serial: String,
    /// Device state
    pub state: DeviceState,
    /// Device type
    pub device_type: DeviceType,
    /// Device model (e.g., "Pixel_7")
    pub model: Option<String>,
    /// Device product name
    pub product: Option<String>,
    /// Transport ID
    pub transport_id: Option<u32>,
}

impl Device {
    /// Only online devices accept port mappings
    pub fn is_usable(&self) -> bool {
        self.state == DeviceState::Online
    }

    pub fn is_emulator(&self) -> bool {
        self.device_type == DeviceType::Emulator
    }

    /// Get display name
    pub fn display_name(&self) -> String {
        if let Some(ref model) = self.model {
            format!("{} ({})", model.replace('_', " "), self.serial)
        } else {
            self.serial.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_words_round_trip() {
        for state in [
            DeviceState::Online,
            DeviceState::Offline,
            DeviceState::Unauthorized,
            DeviceState::Bootloader,
            DeviceState::Recovery,
        ] {
            assert_eq!(DeviceState::from_adb(state.as_str()), state);
        }
        assert_eq!(DeviceState::from_adb("sideload"), DeviceState::Unknown);
    }
}
