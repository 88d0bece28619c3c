use eyre::{Result, WrapErr, eyre};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use transcription_runner::{ExternalProgram, RunnerConfig};

pub use transcription_runner::{DEFAULT_TIMEOUT, DEFAULT_TRANSCRIPT_FILE_NAME};

pub const DEFAULT_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_JOBS_FILE: &str = "jobs.json";
pub const DEFAULT_RESULTS_DIR: &str = "results";
pub const DEFAULT_WORK_DIR: &str = "work";
pub const DEFAULT_PROGRAM: &str = "python";
pub const DEFAULT_PROGRAM_ARGS: &str = "youtube_transcriber.py";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub jobs_file: PathBuf,
    pub program: String,
    pub program_args: Vec<String>,
    pub results_dir: PathBuf,
    pub work_dir: PathBuf,
    pub transcript_file_name: String,
    pub timeout: Duration,
    /// How long finished jobs are kept. `None` keeps them forever.
    pub retention: Option<Duration>,
    pub sweep_interval: Duration,
}

impl ServiceConfig {
    /// Resolves the configuration from `lookup`, falling back to defaults for
    /// unset or empty keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let addr_value = get("TRANSCRIBER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_value
            .trim()
            .parse()
            .wrap_err_with(|| format!("Invalid TRANSCRIBER_ADDR: {}", addr_value))?;

        let program_args = get("TRANSCRIBER_ARGS")
            .unwrap_or_else(|| DEFAULT_PROGRAM_ARGS.to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let timeout = match parse_secs(get("TRANSCRIBE_TIMEOUT_SECS"), "TRANSCRIBE_TIMEOUT_SECS")? {
            Some(0) => return Err(eyre!("TRANSCRIBE_TIMEOUT_SECS must be greater than zero")),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };
        let sweep_secs = parse_secs(get("JOB_SWEEP_INTERVAL_SECS"), "JOB_SWEEP_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        if sweep_secs == 0 {
            return Err(eyre!("JOB_SWEEP_INTERVAL_SECS must be greater than zero"));
        }
        let retention = parse_secs(get("JOB_RETENTION_SECS"), "JOB_RETENTION_SECS")?
            .map(Duration::from_secs);

        Ok(Self {
            addr,
            jobs_file: get("JOBS_FILE")
                .unwrap_or_else(|| DEFAULT_JOBS_FILE.to_string())
                .into(),
            program: get("TRANSCRIBER_PROGRAM").unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
            program_args,
            results_dir: get("RESULTS_DIR")
                .unwrap_or_else(|| DEFAULT_RESULTS_DIR.to_string())
                .into(),
            work_dir: get("WORK_DIR")
                .unwrap_or_else(|| DEFAULT_WORK_DIR.to_string())
                .into(),
            transcript_file_name: get("TRANSCRIPT_FILE_NAME")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPT_FILE_NAME.to_string()),
            timeout,
            retention,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            results_dir: self.results_dir.clone(),
            work_root: self.work_dir.clone(),
            transcript_file_name: self.transcript_file_name.clone(),
            timeout: self.timeout,
        }
    }

    /// The delegated program runs from a per-job directory, so base arguments
    /// naming files relative to the service's own directory are made absolute.
    pub fn external_program(&self) -> ExternalProgram {
        let args = self
            .program_args
            .iter()
            .map(|arg| absolute_if_existing_file(arg))
            .collect();
        ExternalProgram::new(self.program.clone(), args)
    }
}

fn parse_secs(value: Option<String>, key: &str) -> Result<Option<u64>> {
    value
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .wrap_err_with(|| format!("Invalid {}: {}", key, value))
        })
        .transpose()
}

fn absolute_if_existing_file(arg: &str) -> String {
    let path = Path::new(arg);
    if path.is_relative() && path.is_file() {
        if let Ok(absolute) = std::path::absolute(path) {
            return absolute.display().to_string();
        }
    }
    arg.to_string()
}

// Extract configuration loading to a testable function
pub fn load_service_config() -> Result<ServiceConfig> {
    // Load .env file
    dotenv::dotenv().ok();

    ServiceConfig::from_lookup(|key| env::var(key).ok())
}
