//! Build script - copies the linker script into the output directory and,
//! for the firmware target, passes the linker scripts the runtime and
//! defmt need.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    fs::copy("memory.x", out_dir.join("memory.x")).expect("memory.x missing");
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Host builds (tests) link normally; only the Cortex-M binary needs these.
    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("arm") {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
