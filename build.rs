fn main() {
    // The Tauri context (tauri.conf.json, capabilities) is only needed for the app shell.
    #[cfg(feature = "app")]
    tauri_build::build();
}
