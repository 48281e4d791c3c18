//! Embeds `BUILD_INFO_HUMAN` for `prtriage --version`.
//!
//! The string is `<crate version> (<git describe>, <commit date>) <rustc -V>`,
//! with any part that cannot be determined left out. Builds from a source
//! tarball without git simply report the crate version and toolchain.

use std::process::Command;

fn main() {
    for path in ["src", "build.rs", "Cargo.toml"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

/// Runs a command and returns its trimmed stdout when it succeeds with output.
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn git_details() -> Option<String> {
    let describe = command_output("git", &["describe", "--tags", "--always", "--dirty"])?;
    match command_output("git", &["log", "-1", "--format=%cs"]) {
        Some(date) => Some(format!("({describe}, {date})")),
        None => Some(format!("({describe})")),
    }
}

fn build_info() -> String {
    [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        git_details(),
        command_output("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}
