use std::env;
use std::process::Command;

fn main() {
    build_ver();
}

fn build_ver() {
    let cargo_ver = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let version = git_ver().unwrap_or(format!("{} (unknown commit)", cargo_ver));

    println!("cargo:rustc-env=PHINMSX_VERSION={}", version.trim());
    println!(
        "cargo:rustc-env=PHINMSX_PROFILE={}",
        env::var("PROFILE").unwrap_or_default()
    );
}

fn git_ver() -> Option<String> {
    ci_ver().or_else(git_cmd_ver)
}

fn git_cmd_ver() -> Option<String> {
    let mut git_cmd = Command::new("git");
    git_cmd.args(["describe", "--tags"]);

    match git_cmd.output() {
        Ok(output) if output.status.success() => {
            println!("cargo:rerun-if-changed=.git/HEAD");
            String::from_utf8(output.stdout).ok()
        }
        _ => None,
    }
}

fn ci_ver() -> Option<String> {
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
    env::var("GITHUB_SHA").ok()
}
