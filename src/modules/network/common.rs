//! Common network device utilities and types
//!
//! This module provides shared functionality for the resource modules:
//! - The device collaborator trait resources read from and write to
//! - An in-memory device backed by a configuration snapshot
//! - Configuration session wrapping for IOS
//! - Line diffs of fact trees

use crate::error::{Error, Result};
use crate::modules::Diff;
use parking_lot::Mutex;
use similar::{ChangeTag, TextDiff};
use tracing::debug;

// ============================================================================
// Device Collaborator
// ============================================================================

/// A device that can report its running configuration and accept commands.
///
/// Transport (SSH, console, an API) is the implementor's concern; resource
/// modules only see text in and commands out.
pub trait NetworkDevice: Send + Sync {
    /// Identifier used in logs and errors
    fn identifier(&self) -> String;

    /// Running configuration text
    fn get_config(&self) -> Result<String>;

    /// Apply configuration commands, in order
    fn send_commands(&self, commands: &[String]) -> Result<()>;
}

/// A device backed by a configuration snapshot.
///
/// Commands sent to it are recorded, wrapped in a configuration session,
/// and the snapshot is left as is unless replaced with [`set_config`].
///
/// [`set_config`]: StaticConfigDevice::set_config
pub struct StaticConfigDevice {
    name: String,
    config: Mutex<String>,
    sent: Mutex<Vec<String>>,
}

impl StaticConfigDevice {
    pub fn new(name: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Mutex::new(config.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Replace the configuration snapshot
    pub fn set_config(&self, config: impl Into<String>) {
        *self.config.lock() = config.into();
    }

    /// Every line sent so far, session commands included
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl NetworkDevice for StaticConfigDevice {
    fn identifier(&self) -> String {
        self.name.clone()
    }

    fn get_config(&self) -> Result<String> {
        Ok(self.config.lock().clone())
    }

    fn send_commands(&self, commands: &[String]) -> Result<()> {
        if commands.iter().any(|c| c.contains('\0')) {
            return Err(Error::Device {
                device: self.name.clone(),
                message: "command contains a null character".to_string(),
            });
        }
        debug!(device = %self.name, count = commands.len(), "sending commands");
        self.sent.lock().extend(config_session(commands));
        Ok(())
    }
}

// ============================================================================
// Configuration Session
// ============================================================================

/// Wrap commands in an IOS configuration session
pub fn config_session(commands: &[String]) -> Vec<String> {
    let mut session = Vec::with_capacity(commands.len() + 2);
    session.push("configure terminal".to_string());
    session.extend(commands.iter().cloned());
    session.push("end".to_string());
    session
}

// ============================================================================
// Configuration Diff
// ============================================================================

/// Generate a unified diff between two texts
pub fn generate_config_diff(before: &str, after: &str) -> Diff {
    let text_diff = TextDiff::from_lines(before, after);

    let mut details = String::new();
    let mut additions = 0;
    let mut deletions = 0;

    for change in text_diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => {
                deletions += 1;
                "-"
            }
            ChangeTag::Insert => {
                additions += 1;
                "+"
            }
            ChangeTag::Equal => " ",
        };
        details.push_str(&format!("{}{}", sign, change));
    }

    Diff {
        before: format!("{} lines", before.lines().count()),
        after: format!(
            "{} lines ({} additions, {} deletions)",
            after.lines().count(),
            additions,
            deletions
        ),
        details: Some(details),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_diff() {
        let before = "interface GigabitEthernet0/0\n ip address 10.0.0.1 255.255.255.0\n!";
        let after = "interface GigabitEthernet0/0\n ip address 10.0.0.2 255.255.255.0\n!";

        let diff = generate_config_diff(before, after);
        assert!(diff.details.unwrap().contains("-"));
        assert!(diff.after.contains("1 additions"));
    }

    #[test]
    fn test_static_device_records_session() {
        let device = StaticConfigDevice::new("r1", "hostname r1\n");
        assert_eq!(device.get_config().unwrap(), "hostname r1\n");

        device
            .send_commands(&["interface Loopback0".to_string(), "shutdown".to_string()])
            .unwrap();
        assert_eq!(
            device.sent(),
            vec!["configure terminal", "interface Loopback0", "shutdown", "end"]
        );

        device.set_config("hostname r2\n");
        assert_eq!(device.get_config().unwrap(), "hostname r2\n");
    }

    #[test]
    fn test_static_device_rejects_null() {
        let device = StaticConfigDevice::new("r1", "");
        let err = device.send_commands(&["bad\0".to_string()]).unwrap_err();
        assert!(err.to_string().contains("r1"));
        assert!(device.sent().is_empty());
    }
}
