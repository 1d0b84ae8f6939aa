//! Write protocol shared by every unit: stage the new text in a temp file,
//! then copy it over the live file through the privileged runner.

use std::io::Write;
use std::path::Path;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use crate::error::ApplyError;
use crate::privileged::{Credential, PrivilegedRunner};
use crate::reader::read_text;

/// SHA-256 of the text, hex encoded
pub fn content_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Fail if `path` no longer holds the text whose digest was taken at read time
pub fn ensure_unchanged(path: &Path, expected: &str) -> Result<(), ApplyError> {
    let current = read_text(path)?;
    if content_digest(&current) != expected {
        return Err(ApplyError::ConcurrentModification {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Write `text` to a uniquely named file in `dir`. The file is removed when
/// the handle drops.
pub fn stage_temp_file(dir: &Path, target: &Path, text: &str) -> Result<NamedTempFile, ApplyError> {
    let stem = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "netadmind".to_string());
    let prefix = format!("{}.{}.", stem, std::process::id());

    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(dir)
        .map_err(ApplyError::TempFile)?;
    file.write_all(text.as_bytes()).map_err(ApplyError::TempFile)?;
    file.flush().map_err(ApplyError::TempFile)?;
    Ok(file)
}

pub fn copy_argv(source: &Path, target: &Path) -> Vec<String> {
    vec![
        "cp".to_string(),
        source.display().to_string(),
        target.display().to_string(),
    ]
}

pub fn chown_argv(owner: &str, target: &Path) -> Vec<String> {
    vec![
        "chown".to_string(),
        owner.to_string(),
        target.display().to_string(),
    ]
}

/// Run one privileged command and turn an unsuccessful outcome into an error
pub async fn run_checked<R: PrivilegedRunner>(
    runner: &R,
    argv: Vec<String>,
    credential: &Credential,
) -> Result<String, ApplyError> {
    let outcome = runner.run(&argv, credential).await;
    if outcome.success {
        return Ok(outcome.stdout);
    }

    let command = argv.join(" ");
    if outcome.timed_out {
        return Err(ApplyError::Timeout {
            command,
            secs: runner.timeout().as_secs(),
        });
    }
    Err(ApplyError::CommandFailed {
        command,
        stderr: outcome.stderr.trim().to_string(),
    })
}

/// Stage `text` and copy it over `target`
pub async fn install<R: PrivilegedRunner>(
    runner: &R,
    temp_dir: &Path,
    target: &Path,
    text: &str,
    credential: &Credential,
) -> Result<(), ApplyError> {
    let staged = stage_temp_file(temp_dir, target, text)?;
    run_checked(runner, copy_argv(staged.path(), target), credential).await?;
    tracing::info!("Installed {}", target.display());
    Ok(())
}
