//! Status command - check an upload once, or keep polling until it finishes.

use clap::Args;

use facturas::{ClientConfig, HttpUploadApi, UploadApi, UploadCoordinator, UploadJob, UploadOutcome};

use super::print_job;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Upload id returned when the file was submitted
    #[arg(required = true)]
    pub upload_id: String,

    /// Keep polling until the upload completes or fails
    #[arg(short, long)]
    pub watch: bool,

    /// Print the job as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs, config: &ClientConfig) -> anyhow::Result<()> {
    let api = HttpUploadApi::new(config)?;

    if !args.watch {
        let response = api.fetch_status(&args.upload_id).await?;
        return print_job(&UploadJob::from_response(response), args.json);
    }

    let coordinator = UploadCoordinator::new(api, config);
    if !coordinator.resume(&args.upload_id) {
        anyhow::bail!("No se pudo consultar la carga {}", args.upload_id);
    }
    eprintln!("Procesando factura...");

    match coordinator.wait_for_outcome().await {
        Some(UploadOutcome::Completed { job }) => print_job(&job, args.json),
        Some(UploadOutcome::Failed { job, message }) => {
            if args.json {
                print_job(&job, true)?;
            }
            anyhow::bail!("La factura no pudo procesarse: {}", message)
        }
        None => anyhow::bail!("Se dejó de consultar el estado de la carga {}", args.upload_id),
    }
}
