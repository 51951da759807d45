use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use attendance_tracker::permissions::PermissionPrompter;
use attendance_tracker::{AttendanceApp, AttendanceConfig, AttendanceRecord, AttendanceWorkflow};

use crate::cli::prompter::TerminalPrompter;

pub mod config;
pub mod mark;
pub mod session;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Build the app, granting access up front when `yes` is set
pub fn build_app(config: &AttendanceConfig, yes: bool) -> Result<AttendanceApp> {
    let prompter: Arc<dyn PermissionPrompter> = if yes {
        Arc::new(attendance_tracker::permissions::PresetPrompter::allow_all())
    } else {
        Arc::new(TerminalPrompter)
    };
    attendance_tracker::build_app(config, prompter)
}

/// Run `operation` while echoing the workflow's loading messages
pub async fn with_progress<F, T>(workflow: &Arc<AttendanceWorkflow>, operation: F) -> T
where
    F: Future<Output = T>,
{
    let watched = Arc::clone(workflow);
    let reporter = tokio::spawn(async move {
        let mut last: Option<String> = None;
        loop {
            let message = watched.snapshot().await.loading_message;
            if message.is_some() && message != last {
                if let Some(text) = &message {
                    println!("⏳ {text}");
                }
            }
            last = message;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    let output = operation.await;
    reporter.abort();
    output
}

pub fn print_record(record: &AttendanceRecord) {
    let coordinates = record.coordinates();
    println!("✅ Attendance recorded");
    println!("   🆔 {}", record.id());
    println!("   📧 {}", record.email());
    println!("   🕒 {}", record.timestamp().format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "   📍 {:.6}, {:.6}",
        coordinates.latitude, coordinates.longitude
    );
    println!("   🏠 {}", record.address());
    println!("   📷 photo: {} bytes", record.photo_data_url().len());
}

pub async fn show_how_to_record() -> Result<()> {
    println!("🗓️  Attendance - location verified check-ins");
    println!();
    println!("To get started:");
    println!("  🚶 attendance session            # Guided capture flow");
    println!("  ✅ attendance mark --email <you> # Record one entry");
    println!("  ⚙️  attendance config            # Show configuration");
    println!();
    println!("💡 Set GEMINI_API_KEY to resolve real street addresses.");
    Ok(())
}
