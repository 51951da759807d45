use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use attendance_tracker::camera::CameraStatus;
use attendance_tracker::{AttendanceConfig, AttendanceWorkflow, WorkflowError, WorkflowStep};

use super::{build_app, print_record, with_progress, Command};
use crate::cli::prompter::read_line;

/// Guided terminal flow mirroring the capture screens
pub struct SessionCommand {
    pub yes: bool,
    config: AttendanceConfig,
}

impl SessionCommand {
    pub fn new(config: AttendanceConfig) -> Self {
        Self { yes: false, config }
    }

    pub fn with_yes(mut self, yes: bool) -> Self {
        self.yes = yes;
        self
    }
}

enum Flow {
    Continue,
    Quit,
}

impl Command for SessionCommand {
    async fn execute(&self) -> Result<()> {
        let app = build_app(&self.config, self.yes)?;
        let workflow = Arc::new(app.workflow);

        println!("🗓️  ATTENDANCE SESSION");
        println!("=====================");
        if !app.address_lookup_configured {
            println!("⚠️  No AI credential configured; addresses will be mocked");
        }
        println!();

        loop {
            let flow = match workflow.snapshot().await.step {
                WorkflowStep::Idle => idle_screen(&workflow).await,
                WorkflowStep::CapturingPhoto => capture_screen(&workflow).await,
                WorkflowStep::Confirming => confirm_screen(&workflow).await,
            };
            if let Flow::Quit = flow {
                break;
            }
        }

        let history = workflow.history().await;
        println!();
        println!("📋 SESSION HISTORY: {} record(s)", history.len());
        for record in &history {
            println!(
                "   • {} {} at {}",
                record.timestamp().format("%H:%M:%S"),
                record.email(),
                record.address()
            );
        }

        let stats = app.address_metrics.get_stats();
        println!(
            "🏠 Address lookups: {} ({} cached, {} fallback, {} mocked)",
            stats.total_lookups, stats.cache_hits, stats.fallbacks, stats.mock_responses
        );
        app.address_metrics.log_stats();
        Ok(())
    }
}

async fn idle_screen(workflow: &Arc<AttendanceWorkflow>) -> Flow {
    let Some(line) = read_line("📧 Email (blank to quit): ".to_string()).await else {
        return Flow::Quit;
    };
    let email = line.trim();
    if email.is_empty() {
        return Flow::Quit;
    }

    if let Err(e) = with_progress(workflow, workflow.start(email)).await {
        report(workflow, &e).await;
    }
    Flow::Continue
}

async fn capture_screen(workflow: &Arc<AttendanceWorkflow>) -> Flow {
    let snapshot = workflow.snapshot().await;
    if let Some(address) = &snapshot.record.address {
        println!("📍 {address}");
    }
    match snapshot.camera {
        Some(CameraStatus::Live) => println!("📷 Camera is live"),
        Some(CameraStatus::Unavailable(message)) => println!("❌ {message}"),
        Some(CameraStatus::Starting) | None => println!("⏳ Starting camera..."),
    }

    let Some(line) = read_line("[c]apture, [x] cancel: ".to_string()).await else {
        let _ = workflow.cancel().await;
        return Flow::Quit;
    };
    let result = match line.trim() {
        "c" | "capture" => workflow.capture_photo().await,
        "x" | "cancel" => workflow.cancel().await,
        other => {
            println!("❓ Unknown choice: {other:?}");
            Ok(())
        }
    };
    if let Err(e) = result {
        report(workflow, &e).await;
    }
    Flow::Continue
}

async fn confirm_screen(workflow: &Arc<AttendanceWorkflow>) -> Flow {
    let record = workflow.snapshot().await.record;
    println!("🔎 Review your attendance:");
    if let Some(email) = &record.email {
        println!("   📧 {email}");
    }
    if let Some(timestamp) = &record.timestamp {
        println!("   🕒 {}", timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(coordinates) = &record.coordinates {
        println!("   📍 {coordinates}");
    }
    if let Some(address) = &record.address {
        println!("   🏠 {address}");
    }

    let Some(line) = read_line("[s]ubmit, [r]etake: ".to_string()).await else {
        return Flow::Quit;
    };
    match line.trim() {
        "s" | "submit" => match with_progress(workflow, workflow.confirm()).await {
            Ok(record) => print_record(&record),
            Err(e) => report(workflow, &e).await,
        },
        "r" | "retake" => {
            if let Err(e) = workflow.retake().await {
                report(workflow, &e).await;
            }
        }
        other => println!("❓ Unknown choice: {other:?}"),
    }
    Flow::Continue
}

/// Show a workflow error and wait out the automatic reset
async fn report(workflow: &Arc<AttendanceWorkflow>, error: &WorkflowError) {
    let snapshot = workflow.snapshot().await;
    match &snapshot.banner {
        Some(banner) => println!("❌ {}", banner.message),
        None => println!("❌ {}", error.user_message()),
    }

    if snapshot.reset_pending {
        while workflow.snapshot().await.reset_pending {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        println!("🔄 Ready for a new attempt");
    }
}
