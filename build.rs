//! Builds the C shim over the Napatech driver when the `napatech` feature is on.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "napatech")]
    native::build();
}

#[cfg(feature = "napatech")]
mod native {
    use std::env;
    use std::path::PathBuf;

    const DEFAULT_ROOT: &str = "/opt/napatech3";

    pub fn build() {
        println!("cargo:rerun-if-changed=ntshim");
        println!("cargo:rerun-if-env-changed=NAPATECH_ROOT");

        let root = env::var("NAPATECH_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROOT));

        let dst = cmake::Config::new("ntshim").define("NAPATECH_ROOT", &root).build();

        println!("cargo:rustc-link-search=native={}", dst.join("lib").display());
        println!("cargo:rustc-link-lib=static=ntshim");
        println!("cargo:rustc-link-search=native={}", root.join("lib").display());
        println!("cargo:rustc-link-lib=dylib=ntapi");
        println!("cargo:rustc-link-lib=dylib=pthread");
    }
}
