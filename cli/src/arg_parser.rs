use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Connect to a grammar correction job server
#[derive(Debug, Parser)]
#[clap(name = "docstream", version)]
pub struct ArgParser {
    /// The address of the server, e.g. http://[::1]:50051
    #[clap(short = 's', long = "server", env = "DOCSTREAM_SERVER")]
    pub server: String,
    /// PEM CA certificate to verify the server with; switches the connection to TLS
    #[clap(long = "ca-cert", env = "DOCSTREAM_CA_CERT")]
    pub ca_cert: Option<PathBuf>,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum SubCommand {
    /// submit a document and print its job id and rendered markup
    Submit {
        /// path of the document to upload
        path: PathBuf,
    },
    /// get a job's status
    Status {
        /// job id as printed by submit
        job_id: String,
    },
    /// poll a job's status until it is no longer processing
    Wait {
        /// job id as printed by submit
        job_id: String,

        #[clap(long, default_value = "5")]
        /// seconds between polls
        interval_secs: u64,
    },
    /// stream a job's corrections as event-stream frames
    Stream {
        /// job id as printed by submit
        job_id: String,
    },
    /// print the corrected document of a completed job
    Output {
        /// job id as printed by submit
        job_id: String,
    },
}
