use std::env;
use std::process::Command;

/// Revision from the environment, else `git rev-parse`, else "unknown".
fn revision() -> String {
    let from_env = env::var("LSDYNA_REVISION")
        .ok()
        .map(|rev| rev.trim().to_string())
        .filter(|rev| !rev.is_empty());
    if let Some(rev) = from_env {
        return rev;
    }
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|rev| rev.trim().to_string())
        .filter(|rev| !rev.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    // Release tarballs carry no .git, so packagers pass the revision in.
    println!("cargo:rerun-if-env-changed=LSDYNA_REVISION");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rustc-env=LSDYNA_REVISION={}", revision());
}
