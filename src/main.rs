use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod relevance;

use config::Config;
use relevance::{Document, RelevanceService, TrainingExample};

fn base_path() -> String {
    std::env::var("JOBFIT_BASE_PATH").unwrap_or(format!(
        "{}/.local/share/jobfit",
        my_home()
            .expect("couldnt find home dir")
            .expect("couldnt find home dir")
            .to_string_lossy()
    ))
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("couldnt read {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}=warn", env!("CARGO_PKG_NAME")))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Args::parse();

    let base_path = base_path();
    let config = Config::load_with(&base_path);
    let service = RelevanceService::new(config, PathBuf::from(&base_path));

    match args.command {
        cli::Command::Normalize { file, keywords } => {
            let mut document = Document::new(read_text(&file)?);
            service.process(&mut document);

            if keywords {
                let phrases =
                    service.keywords(document.normalized_text.as_deref().unwrap_or(""), None)?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "raw_text": document.raw_text,
                        "normalized_text": document.normalized_text,
                        "keywords": phrases,
                    }))
                    .unwrap()
                );
            } else {
                println!("{}", serde_json::to_string_pretty(&document).unwrap());
            }
            Ok(())
        }

        cli::Command::Score { resume, job } => {
            let resume_text = read_text(&resume)?;
            let job_text = read_text(&job)?;

            let result = service.score(
                &resume_text,
                &job_text,
                &resume.to_string_lossy(),
                &job.to_string_lossy(),
            )?;
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
            Ok(())
        }

        cli::Command::Keywords { file, top_n } => {
            let text = read_text(&file)?;
            let phrases = service.keywords(&text, top_n)?;
            println!("{}", serde_json::to_string_pretty(&phrases).unwrap());
            Ok(())
        }

        cli::Command::Train { data } => {
            let raw = read_text(&data)?;
            let examples: Vec<TrainingExample> = serde_json::from_str(&raw)
                .with_context(|| format!("couldnt parse training data {}", data.display()))?;

            let report = service.train(&examples)?;
            println!("{}", serde_json::to_string_pretty(&report).unwrap());
            Ok(())
        }

        cli::Command::Predict { resume, job } => {
            let resume_text = read_text(&resume)?;
            let job_text = read_text(&job)?;

            let prediction = service.predict(&resume_text, &job_text)?;
            println!("{}", serde_json::to_string_pretty(&prediction).unwrap());
            Ok(())
        }

        cli::Command::Status {} => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "trained": service.classifier_status(),
                    "artifact": service.classifier_artifact(),
                }))
                .unwrap()
            );
            Ok(())
        }
    }
}
