use clap::{Args, Subcommand};
use std::path::PathBuf;

use chronoquic::transport::{
    DEFAULT_CERT_PATH, DEFAULT_HOST, DEFAULT_KEY_PATH, DEFAULT_PORT, DEFAULT_SERVER_NAME,
};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod duration;
pub mod gencert;
pub mod request;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the date-format server until interrupted.
    Serve(ServeArgs),
    /// Ask a server to format the current time.
    Request(RequestArgs),
    /// Write a self-signed certificate and key.
    Gencert(GencertArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Request(args) => request::run(args, format),
        Command::Gencert(args) => gencert::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// UDP port to listen on.
    #[arg(env = "CHRONOQUIC_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Address to bind.
    #[arg(long, env = "CHRONOQUIC_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// PEM certificate chain.
    #[arg(long, env = "CHRONOQUIC_CERT", default_value = DEFAULT_CERT_PATH)]
    pub cert: PathBuf,
    /// PEM private key.
    #[arg(long, env = "CHRONOQUIC_KEY", default_value = DEFAULT_KEY_PATH)]
    pub key: PathBuf,
    /// Processing delay per request (e.g. 100ms, 0).
    #[arg(long, env = "CHRONOQUIC_DELAY", default_value = "100ms")]
    pub delay: String,
    /// Runtime worker threads.
    #[arg(long, env = "CHRONOQUIC_WORKERS", default_value_t = 1)]
    pub workers: usize,
    /// How long in-flight requests may finish after shutdown starts.
    #[arg(long, env = "CHRONOQUIC_DRAIN_TIMEOUT", default_value = "5s")]
    pub drain_timeout: String,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// strftime-style pattern, e.g. "%Y-%m-%d %H:%M:%S".
    pub pattern: String,
    /// Server host.
    #[arg(long, env = "CHRONOQUIC_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Server port.
    #[arg(long, env = "CHRONOQUIC_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Name checked against the server certificate.
    #[arg(long, default_value = DEFAULT_SERVER_NAME)]
    pub server_name: String,
    /// PEM certificate trusted as the server's root.
    #[arg(long, env = "CHRONOQUIC_CA_CERT", default_value = DEFAULT_CERT_PATH)]
    pub ca_cert: PathBuf,
    /// Time allowed for connecting and for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct GencertArgs {
    /// Where to write the certificate.
    #[arg(long, default_value = DEFAULT_CERT_PATH)]
    pub cert: PathBuf,
    /// Where to write the private key.
    #[arg(long, default_value = DEFAULT_KEY_PATH)]
    pub key: PathBuf,
    /// Subject alternative name. Repeat for several.
    #[arg(long = "san", default_value = DEFAULT_SERVER_NAME)]
    pub san: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
