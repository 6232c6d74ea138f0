use docstream_proto::{
    grammar_jobs_client::GrammarJobsClient, status_response::JobStatus, stream_event::Kind,
    OutputRequest, StatusRequest, StatusResponse, StreamEvent, StreamRequest, SubmitRequest,
};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tonic::transport::{Certificate, Channel, ClientTlsConfig};
use tonic::{Request, Status};
use tracing::debug;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error("invalid server address: {0}")]
    Address(String),
    #[error("{}: {}", .0.code(), .0.message())]
    Rpc(#[from] Status),
    #[error("{0}")]
    Stream(String),
}

pub struct ClientCli {
    inner: GrammarJobsClient<Channel>,
}

impl ClientCli {
    pub async fn connect(server_addr: &str, ca_cert: Option<&Path>) -> Result<Self, CliError> {
        let mut endpoint = Channel::from_shared(server_addr.to_string())
            .map_err(|err| CliError::Address(err.to_string()))?;
        if let Some(ca_cert) = ca_cert {
            let ca_cert = Certificate::from_pem(tokio::fs::read(ca_cert).await?);
            endpoint = endpoint.tls_config(ClientTlsConfig::new().ca_certificate(ca_cert))?;
        }
        let channel = endpoint.connect().await?;
        debug!(server = server_addr, "connected");
        Ok(Self {
            inner: GrammarJobsClient::new(channel).send_gzip().accept_gzip(),
        })
    }

    pub async fn submit(&mut self, path: &Path) -> Result<(), CliError> {
        let document = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let response = self
            .inner
            .submit_document(Request::new(SubmitRequest { document, filename }))
            .await?
            .into_inner();
        for message in &response.messages {
            eprintln!("warning: {}", message);
        }
        println!("Submitted job id: {}", response.job_id);
        println!("{}", response.markup);
        Ok(())
    }

    async fn fetch_status(&mut self, job_id: &str) -> Result<StatusResponse, CliError> {
        let response = self
            .inner
            .query_status(Request::new(StatusRequest {
                job_id: job_id.into(),
            }))
            .await?;
        Ok(response.into_inner())
    }

    pub async fn query_status(&mut self, job_id: &str) -> Result<(), CliError> {
        let status = self.fetch_status(job_id).await?;
        print_status(&status);
        Ok(())
    }

    /// Poll until the job leaves the processing state.
    pub async fn wait(&mut self, job_id: &str, interval: Duration) -> Result<(), CliError> {
        loop {
            let status = self.fetch_status(job_id).await?;
            if status.status() != JobStatus::Processing {
                print_status(&status);
                return Ok(());
            }
            debug!(chunks_sent = status.chunks_sent, "still processing");
            tokio::time::sleep(interval).await;
        }
    }

    /// Print every frame exactly as it would appear on an event-stream connection.
    pub async fn stream(&mut self, job_id: &str) -> Result<(), CliError> {
        let request = Request::new(StreamRequest {
            job_id: job_id.into(),
        });
        let mut stream = self.inner.stream_corrections(request).await?.into_inner();
        let stdout = io::stdout();
        while let Some(event) = stream.message().await? {
            let mut out = stdout.lock();
            out.write_all(&event.frame)?;
            out.flush()?;
            if let Some(err) = stream_error(&event) {
                return Err(err);
            }
        }
        Ok(())
    }

    pub async fn output(&mut self, job_id: &str) -> Result<(), CliError> {
        let response = self
            .inner
            .fetch_output(Request::new(OutputRequest {
                job_id: job_id.into(),
            }))
            .await?;
        println!("{}", response.into_inner().markup);
        Ok(())
    }
}

fn print_status(status: &StatusResponse) {
    match status.status() {
        JobStatus::Processing => println!("processing ({} chunks sent)", status.chunks_sent),
        JobStatus::Completed => println!("completed ({} chunks sent)", status.chunks_sent),
        JobStatus::Failed => println!("failed ({} chunks sent)", status.chunks_sent),
    }
}

fn stream_error(event: &StreamEvent) -> Option<CliError> {
    match event.kind() {
        Kind::Error => Some(CliError::Stream(event.data.clone())),
        Kind::Data | Kind::End => None,
    }
}
