tonic::include_proto!("jobs");
