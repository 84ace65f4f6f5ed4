use std::time::Instant;

use chronoquic::frame::Payload;
use chronoquic::session::{connect, ClientConfig, RequesterConfig};
use chronoquic::transport::ClientTransportConfig;
use serde::Serialize;
use tracing::debug;

use crate::cmd::duration::parse_duration;
use crate::cmd::RequestArgs;
use crate::exit::{io_error, session_error, CliError, CliResult, DATA_INVALID, SUCCESS, TIMEOUT};
use crate::output::{print_report, OutputFormat, Report};

#[derive(Serialize)]
struct Formatted {
    pattern: String,
    timestamp: String,
    server: String,
    elapsed_ms: u128,
}

impl Report for Formatted {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pattern", self.pattern.clone()),
            ("timestamp", self.timestamp.clone()),
            ("server", self.server.clone()),
            ("elapsed_ms", self.elapsed_ms.to_string()),
        ]
    }

    fn raw(&self) -> String {
        self.timestamp.clone()
    }
}

pub fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = ClientConfig {
        transport: ClientTransportConfig {
            host: args.host,
            port: args.port,
            server_name: args.server_name,
            ca_cert_path: args.ca_cert,
            ..ClientTransportConfig::default()
        },
        requester: RequesterConfig {
            request_timeout: timeout,
            ..RequesterConfig::default()
        },
        ..ClientConfig::default()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    let pattern = args.pattern;
    let report = runtime.block_on(async move {
        let client = tokio::time::timeout(timeout, connect(config))
            .await
            .map_err(|_| CliError::new(TIMEOUT, format!("connect timed out after {timeout:?}")))?
            .map_err(|err| session_error("connect failed", err))?;

        let started = Instant::now();
        let response = client.request_response(Payload::from(pattern.clone())).await;
        let elapsed = started.elapsed();
        let server = client.remote_address().to_string();
        if let Err(err) = client.close().await {
            debug!(error = %err, "client close failed");
        }

        let response = response.map_err(|err| session_error("request failed", err))?;
        let timestamp = response
            .data_utf8()
            .map_err(|err| CliError::new(DATA_INVALID, format!("response is not UTF-8: {err}")))?
            .to_string();

        Ok::<_, CliError>(Formatted {
            pattern,
            timestamp,
            server,
            elapsed_ms: elapsed.as_millis(),
        })
    })?;

    print_report(&report, format);
    Ok(SUCCESS)
}
