tonic::include_proto!("grammarjobs");
