//! Stamps the binary with the git revision and build date

use std::process::Command;

fn git_rev() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8(output.stdout).ok()?;
    let rev = rev.trim();
    (!rev.is_empty()).then(|| rev.to_string())
}

fn main() {
    // Packagers building from a tarball can pin the revision
    let rev = std::env::var("OPSGRAPH_GIT_REV")
        .ok()
        .or_else(git_rev)
        .unwrap_or_else(|| "unknown".to_string());
    let date = chrono::Utc::now().format("%Y-%m-%d");

    println!("cargo:rustc-env=OPSGRAPH_GIT_REV={}", rev);
    println!("cargo:rustc-env=OPSGRAPH_BUILD_DATE={}", date);
    println!("cargo:rerun-if-env-changed=OPSGRAPH_GIT_REV");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
