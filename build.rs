fn main() {
    // The Tauri shell is optional; the session core builds without it.
    #[cfg(feature = "desktop")]
    tauri_build::build()
}
