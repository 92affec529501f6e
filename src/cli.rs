use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Normalize a document into its canonical token stream
    Normalize {
        /// Path to a UTF-8 text file
        #[clap(short, long)]
        file: PathBuf,

        /// Also extract top keyphrases (loads the embedding model)
        #[clap(long, default_value = "false")]
        keywords: bool,
    },

    /// Score a resume against a job description (cosine similarity)
    Score {
        /// Path to the resume text file
        #[clap(short, long)]
        resume: PathBuf,

        /// Path to the job description text file
        #[clap(short, long)]
        job: PathBuf,
    },

    /// Extract top keyphrases from a document
    Keywords {
        /// Path to a UTF-8 text file
        #[clap(short, long)]
        file: PathBuf,

        /// Number of keyphrases to return (config default when omitted)
        #[clap(short = 'n', long)]
        top_n: Option<usize>,
    },

    /// Train the relevance classifier from labeled pairs
    Train {
        /// JSON file: [{"resume": "...", "job": "...", "label": 0 or 1}, ...]
        #[clap(short, long)]
        data: PathBuf,
    },

    /// Predict relevance of a resume/job pair with the trained classifier
    Predict {
        /// Path to the resume text file
        #[clap(short, long)]
        resume: PathBuf,

        /// Path to the job description text file
        #[clap(short, long)]
        job: PathBuf,
    },

    /// Show whether a trained classifier artifact exists
    Status {},
}
