pub mod config;
pub mod contract;
pub mod status;
pub mod upload;

use facturas::{UploadJob, UploadStatus};

/// Prints a job either as JSON or as a short Spanish summary.
pub(crate) fn print_job(job: &UploadJob, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(job)?);
        return Ok(());
    }

    println!("Carga:   {}", job.id);
    if !job.filename.is_empty() {
        println!("Archivo: {}", job.filename);
    }
    println!("Estado:  {}", job.status);

    match job.status {
        UploadStatus::Completed => match &job.result {
            Some(factura) => {
                println!("Factura procesada correctamente");
                println!("  Número:    {}", factura.numero_factura);
                println!(
                    "  Proveedor: {} (NIT {})",
                    factura.proveedor_nombre, factura.proveedor_nit
                );
                println!("  Valor:     {}", factura.formatted_valor());
                println!("  Estado:    {}", factura.estado);
                println!("  Oficinas:  {}", factura.oficinas_count);
            }
            None => println!("Factura procesada correctamente"),
        },
        UploadStatus::Error => {
            println!(
                "La factura no pudo procesarse: {}",
                job.error_message.as_deref().unwrap_or_default()
            );
        }
        _ => println!("Procesando factura..."),
    }

    Ok(())
}
