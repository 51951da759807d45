use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::info;

use attendance_tracker::camera::CameraStatus;
use attendance_tracker::{AttendanceConfig, AttendanceWorkflow, WorkflowError};

use super::{build_app, print_record, with_progress, Command};
use crate::cli::prompter::read_line;

/// Runs a single capture cycle, asking for confirmation unless `yes` is set
pub struct MarkCommand {
    pub email: String,
    pub yes: bool,
    pub json: bool,
    config: AttendanceConfig,
}

impl MarkCommand {
    pub fn new(config: AttendanceConfig, email: String) -> Self {
        Self {
            email,
            yes: false,
            json: false,
            config,
        }
    }

    pub fn with_yes(mut self, yes: bool) -> Self {
        self.yes = yes;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

enum Decision {
    Submit,
    Retake,
    Cancel,
}

fn surfaced(error: WorkflowError) -> anyhow::Error {
    anyhow!(error.user_message())
}

async fn ensure_camera(workflow: &AttendanceWorkflow) -> Result<()> {
    if let Some(CameraStatus::Unavailable(message)) = workflow.snapshot().await.camera {
        workflow.cancel().await.map_err(surfaced)?;
        return Err(anyhow!(message));
    }
    Ok(())
}

async fn ask(workflow: &AttendanceWorkflow) -> Decision {
    let record = workflow.snapshot().await.record;
    println!("🔎 Review your attendance:");
    if let Some(coordinates) = &record.coordinates {
        println!("   📍 {coordinates}");
    }
    if let Some(address) = &record.address {
        println!("   🏠 {address}");
    }

    loop {
        let Some(line) = read_line("[s]ubmit, [r]etake, [x] cancel: ".to_string()).await else {
            return Decision::Cancel;
        };
        match line.trim() {
            "s" | "submit" => return Decision::Submit,
            "r" | "retake" => return Decision::Retake,
            "x" | "cancel" => return Decision::Cancel,
            other => println!("❓ Unknown choice: {other:?}"),
        }
    }
}

impl Command for MarkCommand {
    async fn execute(&self) -> Result<()> {
        let app = build_app(&self.config, self.yes)?;
        let workflow = Arc::new(app.workflow);

        with_progress(&workflow, workflow.start(&self.email))
            .await
            .map_err(surfaced)?;

        loop {
            ensure_camera(&workflow).await?;
            workflow.capture_photo().await.map_err(surfaced)?;

            if self.yes {
                break;
            }
            match ask(&workflow).await {
                Decision::Submit => break,
                Decision::Retake => workflow.retake().await.map_err(surfaced)?,
                Decision::Cancel => {
                    // Cancel is only valid from the capture step
                    workflow.retake().await.map_err(surfaced)?;
                    workflow.cancel().await.map_err(surfaced)?;
                    println!("🚫 Attendance cancelled");
                    return Ok(());
                }
            }
        }

        let record = with_progress(&workflow, workflow.confirm())
            .await
            .map_err(surfaced)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            print_record(&record);
        }

        let stats = app.address_metrics.get_stats();
        info!(
            lookups = stats.total_lookups,
            mock = stats.mock_responses,
            fallbacks = stats.fallbacks,
            "Mark command finished"
        );
        Ok(())
    }
}
