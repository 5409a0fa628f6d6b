//! Contract command - attach a signed contract PDF or download it.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use tracing::info;

use facturas::sanitize::redact_path;
use facturas::{CandidateFile, ClientConfig, ContractAttachmentClient};

/// Arguments for the contract command.
#[derive(Args)]
pub struct ContractArgs {
    #[command(subcommand)]
    pub action: ContractAction,
}

#[derive(Subcommand)]
pub enum ContractAction {
    /// Upload the PDF for a contract
    Attach {
        /// Contract id
        id: i64,
        /// Contract PDF
        file: PathBuf,
    },

    /// Download the PDF of a contract
    Fetch {
        /// Contract id
        id: i64,
        /// Where to write the PDF
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub async fn run(args: ContractArgs, config: &ClientConfig) -> anyhow::Result<()> {
    let client = ContractAttachmentClient::new(config)?;

    match args.action {
        ContractAction::Attach { id, file } => {
            let candidate = CandidateFile::from_path(&file).await?;
            let stored = client.attach(id, candidate).await?;
            println!("{} ({})", stored.message, stored.path);
        }
        ContractAction::Fetch { id, output } => {
            let bytes = client.fetch_contract_pdf(id).await?;
            tokio::fs::write(&output, &bytes).await?;
            info!("Wrote {} bytes to {}", bytes.len(), redact_path(&output));
            println!("{}", output.display());
        }
    }

    Ok(())
}
