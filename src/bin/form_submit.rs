//! Command line client for the relay: fills a form, attaches files, submits.
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use form_relay::client::{
    ClientProfile, FileSelection, FormData, SelectedFile, SubmissionAgent, SubmitOutcome,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormChoice {
    Contact,
    Quote,
}

#[derive(Debug, Parser)]
#[command(version, about = "Submit a contact or quote form to a relay")]
struct Cli {
    /// Base URL of the relay, e.g. https://example.com/forms
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    endpoint: String,
    #[arg(long, value_enum, default_value_t = FormChoice::Contact)]
    form: FormChoice,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    service: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    message: String,
    /// File to attach; repeat for several.
    #[arg(long = "file")]
    files: Vec<PathBuf>,
}

#[actix_web::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));
    let cli = Cli::parse();

    let profile = match cli.form {
        FormChoice::Contact => ClientProfile::CONTACT,
        FormChoice::Quote => ClientProfile::QUOTE,
    };

    let mut form = FormData::default();
    form.set("name", cli.name);
    form.set("email", cli.email);
    form.set("message", cli.message);
    for (field, value) in [
        ("subject", cli.subject),
        ("service", cli.service),
        ("phone", cli.phone),
    ] {
        if let Some(value) = value {
            form.set(field, value);
        }
    }

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        match SelectedFile::from_path(path) {
            Ok(file) => files.push(file),
            Err(err) => {
                eprintln!("Cannot read {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    let mut selection = FileSelection::default();
    if let Err(advisory) = selection.select(files) {
        eprintln!("{advisory}");
        return ExitCode::FAILURE;
    }
    if !selection.is_empty() {
        println!("{}", selection.summary());
    }

    let agent = SubmissionAgent::new(cli.endpoint, profile);
    match agent.submit(&form, &selection).await {
        Ok(outcome @ SubmitOutcome::Sent { .. }) => {
            println!("{}", outcome.notification(&profile));
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            eprintln!("{}", outcome.notification(&profile));
            ExitCode::FAILURE
        }
        Err(err) => {
            log::debug!("Submission failed: {err:?}");
            eprintln!("{}{err}", profile.error_prefix);
            ExitCode::FAILURE
        }
    }
}
