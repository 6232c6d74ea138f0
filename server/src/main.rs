mod config;
mod convert;
mod error;
mod logging;
mod services;

use clap::Parser;
use config::ServerArgs;
use convert::PlainTextConverter;
use docstream_jobs::JobCoordinator;
use docstream_proto::grammar_jobs_server::GrammarJobsServer;
use services::jobservice::GrammarJobsService;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Server, ServerTlsConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();
    logging::init(args.log_format)?;

    let listener = TcpListener::bind(args.addr).await?;
    if let Err(err) = serve(listener, &args, shutdown_signal()).await {
        error!(%err, "server exited with error");
        return Err(err.into());
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

async fn serve(
    listener: TcpListener,
    args: &ServerArgs,
    shutdown: impl Future<Output = ()>,
) -> error::Result<()> {
    let addr = listener.local_addr()?;
    let config = args.job_config();
    info!(
        %addr,
        source = ?args.chunk_source,
        pacing = ?config.pacing,
        completion_after = ?config.completion_after,
        retention = ?config.retention,
        "starting job server"
    );

    let coordinator = JobCoordinator::spawn(config, args.chunk_source());
    let job_service = GrammarJobsService::new(coordinator, Arc::new(PlainTextConverter));
    let grammar_jobs_server = GrammarJobsServer::new(job_service)
        .send_gzip()
        .accept_gzip();

    let mut builder = Server::builder();
    if let Some(identity) = args.tls_identity().await? {
        info!("TLS enabled");
        builder = builder.tls_config(ServerTlsConfig::new().identity(identity))?;
    }
    info!(%addr, "listening");

    builder
        .add_service(grammar_jobs_server)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstream_proto::grammar_jobs_client::GrammarJobsClient;
    use docstream_proto::{
        status_response, stream_event, OutputRequest, StatusRequest, StreamEvent, StreamRequest,
        SubmitRequest,
    };
    use std::net::SocketAddr;
    use tonic::transport::Channel;

    // start a server on an ephemeral port
    async fn start_server(extra_args: &[&str]) -> SocketAddr {
        let mut argv = vec!["docstream-server", "--pacing-ms", "10"];
        argv.extend_from_slice(extra_args);
        let args = ServerArgs::try_parse_from(argv).expect("bad test args");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = serve(listener, &args, futures::future::pending()).await;
        });
        addr
    }

    async fn build_client(addr: SocketAddr) -> GrammarJobsClient<Channel> {
        let channel = Channel::from_shared(format!("http://{}", addr))
            .expect("channel parse error")
            .connect()
            .await
            .expect("channel connect");
        GrammarJobsClient::new(channel)
    }

    async fn submit(client: &mut GrammarJobsClient<Channel>, document: &[u8]) -> String {
        client
            .submit_document(SubmitRequest {
                document: document.to_vec(),
                filename: "test.txt".into(),
            })
            .await
            .expect("Bad submit response")
            .into_inner()
            .job_id
    }

    async fn stream_all(client: &mut GrammarJobsClient<Channel>, job_id: &str) -> Vec<StreamEvent> {
        let mut stream = client
            .stream_corrections(StreamRequest {
                job_id: job_id.into(),
            })
            .await
            .expect("no stream response")
            .into_inner();
        let mut received = vec![];
        while let Some(event) = stream.message().await.expect("stream broke") {
            received.push(event);
        }
        received
    }

    #[tokio::test]
    async fn submit_poll_and_stream() {
        let addr = start_server(&[]).await;
        let mut client = build_client(addr).await;

        let response = client
            .submit_document(SubmitRequest {
                document: b"first paragraph\n\nsecond paragraph".to_vec(),
                filename: "essay.txt".into(),
            })
            .await
            .expect("Bad submit response")
            .into_inner();
        assert_eq!(
            response.markup,
            "<p>first paragraph</p><p>second paragraph</p>"
        );
        let job_id = response.job_id;

        let status = client
            .query_status(StatusRequest {
                job_id: job_id.clone(),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(status.status(), status_response::JobStatus::Processing);
        assert_eq!(status.chunks_sent, 0);

        let events = stream_all(&mut client, &job_id).await;
        let frames: Vec<String> = events
            .iter()
            .map(|event| String::from_utf8_lossy(&event.frame).into_owned())
            .collect();
        assert_eq!(
            frames,
            vec![
                "data: <p>first paragraph</p>\n\n",
                "data: <p>second paragraph</p>\n\n",
                "event: end\ndata: finished\n\n",
            ]
        );
        assert_eq!(events[2].kind(), stream_event::Kind::End);

        let status = client
            .query_status(StatusRequest {
                job_id: job_id.clone(),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(status.status(), status_response::JobStatus::Completed);
        assert_eq!(status.chunks_sent, 2);

        let output = client
            .fetch_output(OutputRequest { job_id })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(output.markup, "<p>first paragraph</p><p>second paragraph</p>");
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() {
        let addr = start_server(&[]).await;
        let mut client = build_client(addr).await;
        let response = client
            .submit_document(SubmitRequest {
                document: vec![],
                filename: "empty.txt".into(),
            })
            .await;
        match response {
            Err(status) => assert_eq!(status.code(), tonic::Code::InvalidArgument),
            Ok(_) => panic!("empty document was accepted"),
        }
    }

    #[tokio::test]
    async fn unknown_jobs() {
        let addr = start_server(&[]).await;
        let mut client = build_client(addr).await;

        for job_id in ["nonexistent", "2b1f5bd4-8d0e-4f5c-9d55-0f4c1a0c2f11"] {
            let response = client
                .query_status(StatusRequest {
                    job_id: job_id.into(),
                })
                .await;
            match response {
                Err(status) => assert_eq!(status.code(), tonic::Code::NotFound),
                Ok(_) => panic!("unknown job {} has a status", job_id),
            }

            let events = stream_all(&mut client, job_id).await;
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind(), stream_event::Kind::Error);
            assert_eq!(events[0].frame, b"event: error\ndata: Job not found\n\n".to_vec());
        }
    }

    #[tokio::test]
    async fn output_waits_for_completion() {
        let addr = start_server(&["--chunk-source", "demo"]).await;
        let mut client = build_client(addr).await;
        let job_id = submit(&mut client, b"anything").await;

        let response = client
            .fetch_output(OutputRequest {
                job_id: job_id.clone(),
            })
            .await;
        match response {
            Err(status) => assert_eq!(status.code(), tonic::Code::FailedPrecondition),
            Ok(_) => panic!("output of a processing job"),
        }

        let events = stream_all(&mut client, &job_id).await;
        assert_eq!(events.len(), 4);
        assert!(events[..3]
            .iter()
            .all(|event| event.kind() == stream_event::Kind::Data));
    }

    #[tokio::test]
    async fn concurrent_streams_stay_separate() {
        let addr = start_server(&[]).await;
        let mut client = build_client(addr).await;
        let j = submit(&mut client, b"j1\n\nj2\n\nj3").await;
        let k = submit(&mut client, b"k1\n\nk2").await;

        let mut j_client = client.clone();
        let mut k_client = client.clone();
        let (j_events, k_events) = tokio::join!(
            stream_all(&mut j_client, &j),
            stream_all(&mut k_client, &k),
        );
        let payloads = |events: &[StreamEvent]| -> Vec<String> {
            events.iter().map(|event| event.data.clone()).collect()
        };
        assert_eq!(
            payloads(&j_events),
            vec!["<p>j1</p>", "<p>j2</p>", "<p>j3</p>", "finished"]
        );
        assert_eq!(payloads(&k_events), vec!["<p>k1</p>", "<p>k2</p>", "finished"]);
    }
}
