use std::process::Command;

/// Short commit hash, from `SOURCE_COMMIT` when the deploy sets it, else git.
fn commit_hash() -> Option<String> {
    let full = match std::env::var("SOURCE_COMMIT") {
        Ok(hash) if !hash.trim().is_empty() => hash,
        _ => {
            let output = Command::new("git")
                .args(["rev-parse", "HEAD"])
                .output()
                .ok()?;
            if !output.status.success() {
                return None;
            }
            String::from_utf8_lossy(&output.stdout).into_owned()
        }
    };
    let full = full.trim();
    Some(full.get(..7).unwrap_or(full).to_string())
}

fn main() {
    let hash = commit_hash().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_COMMIT_HASH={hash}");
    println!("cargo:rerun-if-env-changed=SOURCE_COMMIT");

    if std::path::Path::new(".git/HEAD").exists() {
        println!("cargo:rerun-if-changed=.git/HEAD");
    }
}
