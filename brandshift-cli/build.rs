//! Embeds the short git revision as `BRANDSHIFT_BUILD_SHA`; shown by
//! `--version` and stamped into the JSON output.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn git_sha(repo: &Path) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let sha = String::from_utf8(out.stdout).ok()?.trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    let manifest_dir = env::var_os("CARGO_MANIFEST_DIR").unwrap_or_else(|| ".".into());
    let repo = PathBuf::from(manifest_dir).join("..");

    let sha = git_sha(&repo).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=BRANDSHIFT_BUILD_SHA={sha}");

    // Only watch HEAD when it exists; a missing path would rerun every build.
    let head = repo.join(".git").join("HEAD");
    if head.exists() {
        println!("cargo:rerun-if-changed={}", head.display());
    }
}
