//! Runs the SimulationCraft executable on a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value;
use uuid::Uuid;

use crate::jobs::{SimInput, SimOutput, SimRunError, SimRunner};

const INPUT_FILE: &str = "input.simc";
const JSON_REPORT: &str = "report.json";
const HTML_REPORT: &str = "report.html";

#[derive(Debug, Clone)]
pub struct SimcRunner {
    bin: PathBuf,
}

/// Removes the scratch directory however the run ends.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn create() -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("simcjob_{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.0) {
            tracing::warn!(path = %self.0.display(), error = %err, "failed to remove scratch dir");
        }
    }
}

impl SimcRunner {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// `<simc> <input> json2=<json> html=<html> [extra...]`
    pub fn command_args(input: &Path, json: &Path, html: &Path, extra: &[String]) -> Vec<String> {
        let mut args = vec![
            input.display().to_string(),
            format!("json2={}", json.display()),
            format!("html={}", html.display()),
        ];
        args.extend(extra.iter().cloned());
        args
    }
}

impl SimRunner for SimcRunner {
    fn run(&self, input: &SimInput) -> Result<SimOutput, SimRunError> {
        let scratch = ScratchDir::create()?;
        let input_path = scratch.path().join(INPUT_FILE);
        let json_path = scratch.path().join(JSON_REPORT);
        let html_path = scratch.path().join(HTML_REPORT);
        fs::write(&input_path, &input.simc_text)?;

        let args = Self::command_args(&input_path, &json_path, &html_path, &input.extra_args);
        tracing::debug!(bin = %self.bin.display(), ?args, "starting simc");
        let output = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()?;

        // stdout and stderr are reported together, stdout first
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(SimRunError::Exit {
                code: output.status.code().unwrap_or(-1),
                output: combined,
            });
        }

        let json = if json_path.exists() {
            serde_json::from_str(&fs::read_to_string(&json_path)?)?
        } else {
            Value::Object(Default::default())
        };
        let html = if html_path.exists() {
            fs::read_to_string(&html_path)?
        } else {
            String::new()
        };

        Ok(SimOutput {
            json,
            html,
            stdout: combined,
        })
    }
}
