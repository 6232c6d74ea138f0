use crate::error::{Result, ServeError};
use crate::logging::LogFormat;
use clap::{ArgEnum, Parser};
use docstream_jobs::{ChunkSource, FixedChunks, JobConfig, MarkupBlocks};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Identity;

/// Serve grammar correction jobs over gRPC
#[derive(Debug, Parser)]
#[clap(name = "docstream-server", version)]
pub struct ServerArgs {
    /// Address to listen on
    #[clap(long, env = "DOCSTREAM_ADDR", default_value = "[::1]:50051")]
    pub addr: SocketAddr,

    /// Delay before each streamed fragment, in milliseconds
    #[clap(long, env = "DOCSTREAM_PACING_MS", default_value = "2000")]
    pub pacing_ms: u64,

    /// Mark jobs completed on status queries once they are this old, even if never streamed
    #[clap(long, env = "DOCSTREAM_COMPLETE_AFTER_SECS")]
    pub complete_after_secs: Option<u64>,

    /// Evict jobs this long after creation
    #[clap(long, env = "DOCSTREAM_RETENTION_SECS")]
    pub retention_secs: Option<u64>,

    /// How often expired jobs are swept, in seconds
    #[clap(long, env = "DOCSTREAM_SWEEP_SECS", default_value = "60")]
    pub sweep_secs: u64,

    /// Maximum number of live jobs
    #[clap(long, env = "DOCSTREAM_MAX_JOBS")]
    pub max_jobs: Option<usize>,

    /// Where streamed fragments come from
    #[clap(long, arg_enum, env = "DOCSTREAM_CHUNK_SOURCE", default_value = "markup")]
    pub chunk_source: ChunkSourceKind,

    /// PEM certificate for TLS; requires --tls-key
    #[clap(long, env = "DOCSTREAM_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for TLS; requires --tls-cert
    #[clap(long, env = "DOCSTREAM_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    #[clap(long, arg_enum, env = "DOCSTREAM_LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ArgEnum)]
pub enum ChunkSourceKind {
    /// stream the submitted document's own paragraphs
    Markup,
    /// stream a fixed set of sample paragraphs for every job
    Demo,
}

impl ServerArgs {
    pub fn job_config(&self) -> JobConfig {
        let mut config = JobConfig::default().with_pacing(Duration::from_millis(self.pacing_ms));
        if let Some(secs) = self.complete_after_secs {
            config = config.with_completion_after(Duration::from_secs(secs));
        }
        if let Some(secs) = self.retention_secs {
            config = config.with_retention(Duration::from_secs(secs), Duration::from_secs(self.sweep_secs));
        }
        if let Some(max_jobs) = self.max_jobs {
            config = config.with_max_jobs(max_jobs);
        }
        config
    }

    pub fn chunk_source(&self) -> Arc<dyn ChunkSource> {
        match self.chunk_source {
            ChunkSourceKind::Markup => Arc::new(MarkupBlocks::new()),
            ChunkSourceKind::Demo => Arc::new(FixedChunks::demo()),
        }
    }

    /// Load the server identity, if TLS is configured.
    pub async fn tls_identity(&self) -> Result<Option<Identity>> {
        match (&self.tls_cert, &self.tls_key) {
            (None, None) => Ok(None),
            (Some(cert), Some(key)) => {
                let cert = tokio::fs::read(cert).await?;
                let key = tokio::fs::read(key).await?;
                Ok(Some(Identity::from_pem(cert, key)))
            }
            _ => Err(ServeError::Config(
                "--tls-cert and --tls-key must be given together".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = ServerArgs::try_parse_from(["docstream-server"]).unwrap();
        let config = args.job_config();
        assert_eq!(config.pacing, Duration::from_secs(2));
        assert_eq!(config.completion_after, None);
        assert_eq!(config.retention, None);
        assert_eq!(args.chunk_source, ChunkSourceKind::Markup);
        assert_eq!(args.log_format, LogFormat::Compact);
    }

    #[test]
    fn overrides() {
        let args = ServerArgs::try_parse_from([
            "docstream-server",
            "--pacing-ms",
            "10",
            "--complete-after-secs",
            "10",
            "--retention-secs",
            "3600",
            "--sweep-secs",
            "5",
            "--max-jobs",
            "100",
            "--chunk-source",
            "demo",
        ])
        .unwrap();
        let config = args.job_config();
        assert_eq!(config.pacing, Duration::from_millis(10));
        assert_eq!(config.completion_after, Some(Duration::from_secs(10)));
        assert_eq!(config.retention, Some(Duration::from_secs(3600)));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.max_jobs, Some(100));
        assert_eq!(args.chunk_source, ChunkSourceKind::Demo);
    }

    #[tokio::test]
    async fn half_a_tls_config_is_rejected() {
        let args =
            ServerArgs::try_parse_from(["docstream-server", "--tls-cert", "server.cert"]).unwrap();
        assert!(matches!(
            args.tls_identity().await,
            Err(ServeError::Config(_))
        ));
    }
}
