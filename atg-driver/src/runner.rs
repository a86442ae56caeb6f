//! Thin wrappers over the external compiler and analyzer processes.

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// Execute a command, logging it and its stderr. A non-zero exit status
/// is an error.
pub fn run(command: &[String]) -> Result<Output> {
    let (program, args) = command
        .split_first()
        .context("empty command")?;
    debug!("{}", command.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("running {}", program))?;

    if !output.stderr.is_empty() {
        warn!("{}", String::from_utf8_lossy(&output.stderr).trim_end());
    }
    if !output.status.success() {
        bail!("command `{}` failed with {}", command.join(" "), output.status);
    }
    Ok(output)
}

/// Compile `source` with the given compiler command, run the produced
/// binary, and keep its stdout next to the source as a `.out` file.
pub fn compile_and_run(compiler: &[String], source: &Path) -> Result<()> {
    let binary = source.with_extension("bin");
    let mut compile = compiler.to_vec();
    compile.push("-o".to_string());
    compile.push(binary.display().to_string());
    compile.push(source.display().to_string());
    run(&compile)?;

    let output = run(&[binary.display().to_string()])?;
    let out_file = source.with_extension("out");
    fs::write(&out_file, &output.stdout)
        .with_context(|| format!("writing {}", out_file.display()))?;
    Ok(())
}

/// Run the analyzer on `source` and require a `TRUE` verification
/// verdict in its output.
pub fn check_analyzer(analyzer: &[String], source: &Path) -> Result<()> {
    let mut command = analyzer.to_vec();
    command.push(source.display().to_string());
    let output = run(&command)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains("Verification result:") {
        bail!("no verification verdict for {}", source.display());
    }
    if !stdout.contains("Verification result: TRUE.") {
        bail!("verification verdict is not TRUE for {}", source.display());
    }
    Ok(())
}
