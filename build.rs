// build.rs

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // The headless build needs no native libraries.
    if std::env::var_os("CARGO_FEATURE_X11").is_none() {
        return;
    }

    // --- Link against X11 ---
    // Try pkg-config first; fall back to the conventional library name when
    // the .pc file is missing.
    if let Err(err) = pkg_config::probe_library("x11") {
        eprintln!(
            "pkg-config failed for library 'x11' ({}). Falling back to manual linking.",
            err
        );
        println!("cargo:rustc-link-lib=X11");
        println!("cargo:rustc-link-search=/usr/lib");
    }
}
