use std::fs;
use tracing::warn;

const HOSTNAME_SOURCES: [&str; 2] = ["/proc/sys/kernel/hostname", "/etc/hostname"];

/// Node name of this machine, as `uname -n` reports it
pub fn hostname() -> String {
    HOSTNAME_SOURCES
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok())
        .find_map(|content| clean(&content))
        .unwrap_or_else(|| {
            warn!("[host] could not determine hostname, using 'localhost'");
            "localhost".to_string()
        })
}

fn clean(content: &str) -> Option<String> {
    let name = content.trim();
    (!name.is_empty()).then(|| name.to_string())
}
