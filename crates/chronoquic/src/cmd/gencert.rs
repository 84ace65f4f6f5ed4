use std::path::PathBuf;

use chronoquic::transport::generate_self_signed;
use serde::Serialize;

use crate::cmd::GencertArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat, Report};

#[derive(Serialize)]
struct Generated {
    cert: PathBuf,
    key: PathBuf,
    subject_alt_names: Vec<String>,
}

impl Report for Generated {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("cert", self.cert.display().to_string()),
            ("key", self.key.display().to_string()),
            ("subject_alt_names", self.subject_alt_names.join(",")),
        ]
    }

    fn raw(&self) -> String {
        self.cert.display().to_string()
    }
}

pub fn run(args: GencertArgs, format: OutputFormat) -> CliResult<i32> {
    let generated = generate_self_signed(&args.san, &args.cert, &args.key)
        .map_err(|err| transport_error("certificate generation failed", err))?;

    print_report(
        &Generated {
            cert: generated.cert_path,
            key: generated.key_path,
            subject_alt_names: args.san,
        },
        format,
    );
    Ok(SUCCESS)
}
