// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_DETECTOR_VERSION");

    // Packagers can pin the version string explicitly
    let version = std::env::var("CAMERA_DETECTOR_VERSION").unwrap_or_else(|_| describe_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version from `git describe`, falling back to the crate version.
///
/// An exact tag `v0.1.0` becomes `0.1.0-<hash>`, a build after a tag
/// (`v0.1.0-5-gabcdef1`) becomes `0.1.0-dirty-abcdef1`.
fn describe_version() -> String {
    let fallback = env!("CARGO_PKG_VERSION").to_string();

    let Some(described) = git(&["describe", "--tags", "--always", "--match", "v*"]) else {
        return fallback;
    };
    let described = described.strip_prefix('v').unwrap_or(&described).to_string();

    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    match parts.as_slice() {
        [hash, _commits, base] => {
            format!("{}-dirty-{}", base, hash.strip_prefix('g').unwrap_or(hash))
        }
        _ => match git(&["rev-parse", "--short", "HEAD"]) {
            Some(hash) if hash != described => format!("{}-{}", described, hash),
            _ => fallback,
        },
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
