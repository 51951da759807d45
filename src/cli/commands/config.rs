use anyhow::Result;

use attendance_tracker::AttendanceConfig;

use super::Command;

pub struct ConfigCommand {
    pub write: Option<String>,
    config: AttendanceConfig,
}

impl ConfigCommand {
    pub fn new(config: AttendanceConfig) -> Self {
        Self {
            write: None,
            config,
        }
    }

    pub fn with_write(mut self, write: Option<String>) -> Self {
        self.write = write;
        self
    }
}

impl Command for ConfigCommand {
    async fn execute(&self) -> Result<()> {
        match &self.write {
            Some(path) => {
                self.config.save_to_file(path)?;
                println!("💾 Configuration written to {path}");
            }
            None => print!("{}", self.config.redacted().to_toml()?),
        }
        Ok(())
    }
}
