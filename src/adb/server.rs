use crate::error::{AdbError, Result};
use log::*;
use tokio::process::Command;

/// Local ADB server process management
pub struct AdbServer {
    bin: String,
}

impl AdbServer {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Start the ADB server on `port`, waiting for the launcher to exit
    pub async fn start(&self, port: u16) -> Result<()> {
        info!("Starting ADB server on port {}", port);

        let output = Command::new(&self.bin)
            .args(["-P", &port.to_string(), "start-server"])
            .output()
            .await
            .map_err(|e| AdbError::Server(format!("Failed to execute {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::Server(format!(
                "Failed to start ADB server: {}",
                stderr.trim()
            )));
        }

        info!("ADB server started successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_reports_missing_binary() {
        let server = AdbServer::new("/nonexistent/adbridge-test-adb");
        match server.start(5037).await {
            Err(AdbError::Server(message)) => assert!(message.contains("Failed to execute")),
            other => panic!("expected server error, got {:?}", other),
        }
    }
}
