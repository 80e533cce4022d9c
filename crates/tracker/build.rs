use std::process::Command;

fn main() {
    // Prefer the value injected by the container build, then fall back to git.
    let commit = std::env::var("TRACKER_GIT_COMMIT")
        .ok()
        .filter(|s| !s.is_empty() && s != "unknown")
        .or_else(|| {
            Command::new("git")
                .args(["rev-parse", "--short", "HEAD"])
                .output()
                .ok()
                .filter(|o| o.status.success())
                .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        });

    if let Some(commit) = commit {
        println!("cargo:rustc-env=TRACKER_GIT_COMMIT={}", commit);
    }

    if let Ok(output) = Command::new("date").args(["-u", "+%Y-%m-%dT%H:%M:%SZ"]).output()
        && output.status.success()
    {
        let timestamp = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=TRACKER_BUILD_TIMESTAMP={}", timestamp);
    }

    println!("cargo:rerun-if-env-changed=TRACKER_GIT_COMMIT");
    println!("cargo:rerun-if-changed=migrations");
}
