//! ADB (Android Debug Bridge) Client
//!
//! Sets up the port mappings that put the desktop bridge on the device's
//! loopback, and lists attached devices.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::device::{Device, DeviceState, DeviceType};

/// ADB errors
#[derive(Debug, thiserror::Error)]
pub enum AdbError {
    #[error("ADB not found at {0}")]
    NotFound(PathBuf),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("ADB command failed: {0}")]
    CommandFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// ADB Client
pub struct AdbClient {
    adb: PathBuf,
}

impl AdbClient {
    /// Use `adb` from an SDK's platform-tools
    pub fn new(sdk_path: &Path) -> Self {
        let platform_tools = sdk_path.join("platform-tools");
        let adb = if cfg!(windows) {
            platform_tools.join("adb.exe")
        } else {
            platform_tools.join("adb")
        };
        Self { adb }
    }

    /// Use `adb` from an SDK when given, else whatever is on `PATH`
    pub fn discover(sdk_path: Option<&Path>) -> Self {
        match sdk_path {
            Some(sdk) => Self::new(sdk),
            None => Self { adb: PathBuf::from("adb") },
        }
    }

    /// Path of the adb executable
    pub fn adb_path(&self) -> &Path {
        &self.adb
    }

    async fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        // A bare `adb` is resolved through PATH by the OS
        if self.adb.components().count() > 1 && !self.adb.exists() {
            return Err(AdbError::NotFound(self.adb.clone()));
        }

        debug!("adb {:?}", args);

        let output = Command::new(&self.adb)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AdbError::NotFound(self.adb.clone()),
                _ => AdbError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_for_device(&self, serial: Option<&str>, args: &[&str]) -> Result<String, AdbError> {
        match serial {
            Some(serial) => {
                let mut full_args = vec!["-s", serial];
                full_args.extend(args);
                self.run(&full_args).await
            }
            None => self.run(args).await,
        }
    }

    /// List connected devices
    pub async fn list_devices(&self) -> Result<Vec<Device>, AdbError> {
        let output = self.run(&["devices", "-l"]).await?;
        Ok(parse_devices(&output))
    }

    /// Pick the device to talk to: `serial` if given, else the only online one
    pub async fn select_device(&self, serial: Option<&str>) -> Result<Device, AdbError> {
        let devices = self.list_devices().await?;
        match serial {
            Some(serial) => devices
                .into_iter()
                .find(|d| d.serial == serial)
                .ok_or_else(|| AdbError::DeviceNotFound(serial.to_string())),
            None => {
                let mut online: Vec<Device> = devices.into_iter().filter(Device::is_usable).collect();
                match online.len() {
                    1 => Ok(online.remove(0)),
                    0 => Err(AdbError::DeviceNotFound("no online device".into())),
                    n => Err(AdbError::DeviceNotFound(format!(
                        "{} devices online, pass a serial",
                        n
                    ))),
                }
            }
        }
    }

    /// Device port `remote_port` connects to host port `local_port`
    pub async fn reverse(&self, serial: Option<&str>, remote_port: u16, local_port: u16) -> Result<(), AdbError> {
        let remote = format!("tcp:{}", remote_port);
        let local = format!("tcp:{}", local_port);
        self.run_for_device(serial, &["reverse", &remote, &local]).await?;
        info!("adb reverse {} -> {}", remote, local);
        Ok(())
    }

    /// Remove a reverse mapping
    pub async fn remove_reverse(&self, serial: Option<&str>, remote_port: u16) -> Result<(), AdbError> {
        let remote = format!("tcp:{}", remote_port);
        self.run_for_device(serial, &["reverse", "--remove", &remote]).await?;
        Ok(())
    }

    /// Host port `local_port` connects to device port `remote_port`
    pub async fn forward(&self, serial: Option<&str>, local_port: u16, remote_port: u16) -> Result<(), AdbError> {
        let local = format!("tcp:{}", local_port);
        let remote = format!("tcp:{}", remote_port);
        self.run_for_device(serial, &["forward", &local, &remote]).await?;
        info!("adb forward {} -> {}", local, remote);
        Ok(())
    }

    /// Remove a forward mapping
    pub async fn remove_forward(&self, serial: Option<&str>, local_port: u16) -> Result<(), AdbError> {
        let local = format!("tcp:{}", local_port);
        self.run_for_device(serial, &["forward", "--remove", &local]).await?;
        Ok(())
    }

    /// Make the desktop bridge reachable on the device at the same port
    pub async fn expose_bridge(&self, serial: Option<&str>, port: u16) -> Result<Device, AdbError> {
        let device = self.select_device(serial).await?;
        self.reverse(Some(device.serial.as_str()), port, port).await?;
        Ok(device)
    }
}

/// Parse `adb devices -l` output
pub fn parse_devices(output: &str) -> Vec<Device> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let serial = parts[0].to_string();
        let mut model = None;
        let mut product = None;
        let mut transport_id = None;

        for part in parts.iter().skip(2) {
            if let Some(value) = part.strip_prefix("model:") {
                model = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("product:") {
                product = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("transport_id:") {
                transport_id = value.parse().ok();
            }
        }

        let device_type = if serial.starts_with("emulator-") {
            DeviceType::Emulator
        } else {
            DeviceType::Physical
        };

        devices.push(Device {
            serial,
            state: DeviceState::from_adb(parts[1]),
            device_type,
            model,
            product,
            transport_id,
        });
    }

    devices
}
