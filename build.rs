use std::process::Command;

// Embedded into the `version` subcommand output.
fn main() {
    let git_hash = output_of("git", &["rev-parse", "--short", "HEAD"]);
    let build_date = output_of("date", &["+%Y-%m-%d"]);

    println!(
        "cargo:rustc-env=ENTREGAS_GIT_HASH={}",
        git_hash.as_deref().unwrap_or("unknown")
    );
    println!(
        "cargo:rustc-env=ENTREGAS_BUILD_DATE={}",
        build_date.as_deref().unwrap_or("unknown")
    );

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}

fn output_of(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
