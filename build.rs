use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!("cargo:warning=FFMPEG_DIR is not set; point it at an FFmpeg install (vcpkg works).");
        return;
    };

    let candidate = PathBuf::from(vcpkg_root).join("installed").join("x64-windows");
    if candidate.exists() {
        println!(
            "cargo:warning=found FFmpeg under {}; set FFMPEG_DIR to it to build the decoder.",
            candidate.display()
        );
    }
}
