/// Build script for spellout
///
/// Only matters with the `vosk-backend` feature: sets RPATH to $ORIGIN so
/// the binary finds libvosk.so next to itself, and honors VOSK_LIB_PATH.
fn main() {
    println!("cargo:rerun-if-env-changed=VOSK_LIB_PATH");

    #[cfg(target_os = "linux")]
    linux_config();
}

#[cfg(target_os = "linux")]
fn linux_config() {
    // Allow distributing the binary alongside the library
    println!("cargo:rustc-link-arg=-Wl,-rpath,$ORIGIN");

    if let Ok(vosk_path) = std::env::var("VOSK_LIB_PATH") {
        println!("cargo:rustc-link-search=native={}", vosk_path);
    }

    // Default fetch location: vosk-lib directory in the project root
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let vosk_lib_dir = std::path::Path::new(&manifest_dir).join("vosk-lib");
    if vosk_lib_dir.exists() {
        println!("cargo:rustc-link-search=native={}", vosk_lib_dir.display());
    }
}
