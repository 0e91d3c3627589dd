//! `protogen generate`

use protogen_core::{CONFIG_FILE, DEFAULT_SCOPE, GenerationResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Find the configuration for an input directory
///
/// Accepts `<input>/config.json` and the `<input>/default/config.json`
/// layout. When neither exists the first is returned, so the missing-file
/// error names the conventional location.
pub fn locate_config(input: &Path) -> PathBuf {
    if input.is_file() {
        return input.to_path_buf();
    }

    let direct = input.join(CONFIG_FILE);
    if direct.is_file() {
        return direct;
    }

    let nested = input.join(DEFAULT_SCOPE).join(CONFIG_FILE);
    if nested.is_file() { nested } else { direct }
}

/// Generate once and map the outcome to the process exit code
pub fn run(input: &Path, output: &Path, config: Option<&Path>) -> ExitCode {
    let config_path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| locate_config(input));

    let result = protogen_core::generate(&config_path, output);
    report(&result);
    ExitCode::from(result.exit_code())
}

/// Emitted paths to stdout; a failure as one `error[<phase>]: <detail>` line on stderr
pub fn report(result: &GenerationResult) {
    match result {
        GenerationResult::Success { emitted_files } => {
            for file in emitted_files {
                println!("{}", file.display());
            }
        }
        GenerationResult::Failure { phase, detail, .. } => {
            eprintln!("{}", failure_line(phase, detail));
        }
    }
}

fn failure_line(phase: &str, detail: &str) -> String {
    format!("error[{phase}]: {detail}")
}
