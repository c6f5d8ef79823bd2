//! Host platform flag exposed to the presentation layer.

/// Host operating system identifier: "linux", "macos", "windows", ...
pub fn platform() -> &'static str {
    std::env::consts::OS
}
