use std::path::PathBuf;

use chronoquic::session::SessionConfig;
use chronoquic::transport::TransportConfig;
use chronoquic::{Server, ServerConfig};
use serde::Serialize;

use crate::cmd::duration::{parse_delay, parse_duration};
use crate::cmd::ServeArgs;
use crate::exit::{server_error, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat, Report};

#[derive(Serialize)]
struct Listening {
    address: String,
    cert: PathBuf,
    delay_ms: u128,
    workers: usize,
}

impl Report for Listening {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("address", self.address.clone()),
            ("cert", self.cert.display().to_string()),
            ("delay_ms", self.delay_ms.to_string()),
            ("workers", self.workers.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.address.clone()
    }
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let processing_delay = parse_delay(&args.delay)?;
    let drain_timeout = parse_duration(&args.drain_timeout)?;
    let workers = args.workers.max(1);

    let config = ServerConfig {
        transport: TransportConfig {
            host: args.host,
            port: args.port,
            cert_path: args.cert.clone(),
            key_path: args.key,
            ..TransportConfig::default()
        },
        session: SessionConfig {
            drain_timeout,
            ..SessionConfig::default()
        },
        worker_threads: workers,
        processing_delay,
    };

    let server = Server::start(config).map_err(|err| server_error("start failed", err))?;
    print_report(
        &Listening {
            address: server.local_addr().to_string(),
            cert: args.cert,
            delay_ms: processing_delay.as_millis(),
            workers,
        },
        format,
    );

    server
        .run_until_signal()
        .map_err(|err| server_error("server failed", err))?;
    Ok(SUCCESS)
}
