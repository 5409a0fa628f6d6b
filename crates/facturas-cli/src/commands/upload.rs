//! Upload command - send an invoice PDF and follow it to a terminal status.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use facturas::broadcast::UploadEventKind;
use facturas::sanitize::redact_path;
use facturas::{
    CandidateFile, ClientConfig, FacturasError, HttpUploadApi, UploadCoordinator, UploadJob,
    UploadOutcome,
};

use super::print_job;

/// Arguments for the upload command.
#[derive(Args)]
pub struct UploadArgs {
    /// Invoice PDF to upload
    #[arg(required = true)]
    pub file: PathBuf,

    /// Return as soon as the backend accepts the file
    #[arg(long)]
    pub no_wait: bool,

    /// Print the resulting job as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: UploadArgs, config: &ClientConfig) -> anyhow::Result<()> {
    let coordinator = UploadCoordinator::new(HttpUploadApi::new(config)?, config);

    // Progress goes to stderr, results to stdout.
    let mut events = coordinator.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.kind {
                UploadEventKind::Submitted | UploadEventKind::StatusChanged => {
                    eprintln!("{}", event.message)
                }
                UploadEventKind::Completed | UploadEventKind::Failed => break,
            }
        }
    });

    info!("Uploading {}", redact_path(&args.file));

    let job = match upload_file(&coordinator, &args.file).await {
        Ok(job) => job,
        Err(e) => {
            progress.abort();
            anyhow::bail!("No se pudo iniciar la carga: {}", e);
        }
    };

    if args.no_wait {
        progress.abort();
        coordinator.cancel_polling();
        return print_job(&job, args.json);
    }

    let outcome = coordinator.wait_for_outcome().await;
    progress.abort();

    match outcome {
        Some(UploadOutcome::Completed { job }) => print_job(&job, args.json),
        Some(UploadOutcome::Failed { message, .. }) => {
            anyhow::bail!("La factura no pudo procesarse: {}", message)
        }
        None => anyhow::bail!("Se dejó de consultar el estado de la carga {}", job.id),
    }
}

async fn upload_file(
    coordinator: &UploadCoordinator<HttpUploadApi>,
    path: &Path,
) -> Result<UploadJob, FacturasError> {
    let file = CandidateFile::from_path(path).await?;
    coordinator.upload(file).await
}
