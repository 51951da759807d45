use async_trait::async_trait;
use std::io::{BufRead, Write};
use tracing::warn;

use attendance_tracker::permissions::{Capability, PermissionPrompter};

/// Asks the person at the terminal before granting device access
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

#[async_trait]
impl PermissionPrompter for TerminalPrompter {
    async fn request(&self, capability: Capability) -> bool {
        let question = format!("🔐 Allow attendance to use your {capability}? [y/N] ");
        match read_line(question).await {
            Some(answer) => is_affirmative(&answer),
            None => false,
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Print `prompt` and read one line from stdin; `None` on EOF or error
pub async fn read_line(prompt: String) -> Option<String> {
    let result = tokio::task::spawn_blocking(move || {
        print!("{prompt}");
        std::io::stdout().flush()?;
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        Ok::<_, std::io::Error>((read > 0).then_some(line))
    })
    .await;

    match result {
        Ok(Ok(line)) => line,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to read from terminal");
            None
        }
        Err(e) => {
            warn!(error = %e, "Terminal reader task failed");
            None
        }
    }
}
