use actix_web::{post, web, HttpResponse};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::services::{JobOutcome, JobTrigger};

pub struct JobState {
    trigger: Box<dyn JobTrigger>,
    running: Mutex<()>,
}

impl JobState {
    pub fn new(trigger: Box<dyn JobTrigger>) -> Self {
        JobState {
            trigger,
            running: Mutex::new(()),
        }
    }
}

#[derive(Serialize)]
struct JobStatus {
    status: &'static str,
}

/// Runs the batch job to completion. Meant for a scheduler; details only go
/// to the logs.
#[post("/")]
pub async fn run_job(state: web::Data<JobState>) -> HttpResponse {
    let Ok(_guard) = state.running.try_lock() else {
        log::warn!("Job triggered while a previous run is still in progress.");
        return HttpResponse::Conflict().json(JobStatus { status: "Busy" });
    };

    log::info!("Job triggered by scheduler.");

    match state.trigger.run().await {
        Ok(JobOutcome::Completed(report)) => {
            log::info!("Job finished successfully: {:?}", report);
            HttpResponse::Ok().json(JobStatus { status: "OK" })
        }
        Ok(JobOutcome::NoKeywords) => {
            log::info!("Job finished without keywords to process.");
            HttpResponse::Ok().json(JobStatus { status: "NoOp" })
        }
        Err(e) => {
            log::error!("An error occurred during job execution: {:?}", e);
            HttpResponse::InternalServerError().json(JobStatus { status: "Error" })
        }
    }
}
