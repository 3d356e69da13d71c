//! Where a launched server advertises the port it actually bound, so a
//! client started a moment later can find it without guessing.

use std::path::{Path, PathBuf};

/// `CIDELDILL_PORT_FILE` wins outright; otherwise `CIDELDILL_HOME/port`;
/// otherwise `<home>/.cideldill/port`.
pub fn discovery_file_path(home: &Path) -> PathBuf {
    if let Ok(explicit) = std::env::var("CIDELDILL_PORT_FILE") {
        return PathBuf::from(explicit);
    }
    if let Ok(cideldill_home) = std::env::var("CIDELDILL_HOME") {
        return PathBuf::from(cideldill_home).join("port");
    }
    home.join(".cideldill").join("port")
}

pub fn write_port_file(port: u16, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global, so these tests share a lock to avoid
    // stomping on each other when the test binary runs them concurrently.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn port_file_env_override_wins() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CIDELDILL_PORT_FILE", "/tmp/explicit-port-file-test");
        std::env::remove_var("CIDELDILL_HOME");
        let path = discovery_file_path(Path::new("/home/alice"));
        assert_eq!(path, PathBuf::from("/tmp/explicit-port-file-test"));
        std::env::remove_var("CIDELDILL_PORT_FILE");
    }

    #[test]
    fn cideldill_home_env_used_when_no_explicit_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("CIDELDILL_PORT_FILE");
        std::env::set_var("CIDELDILL_HOME", "/tmp/cideldill-home-test");
        let path = discovery_file_path(Path::new("/home/alice"));
        assert_eq!(path, PathBuf::from("/tmp/cideldill-home-test/port"));
        std::env::remove_var("CIDELDILL_HOME");
    }

    #[test]
    fn falls_back_to_home_dotfile() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("CIDELDILL_PORT_FILE");
        std::env::remove_var("CIDELDILL_HOME");
        let path = discovery_file_path(Path::new("/home/alice"));
        assert_eq!(path, PathBuf::from("/home/alice/.cideldill/port"));
    }

    #[test]
    fn write_port_file_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("cideldill-port-discovery-test-{}", std::process::id()));
        let file = dir.join("nested").join("port");
        write_port_file(5174, &file).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "5174");
        std::fs::remove_dir_all(&dir).ok();
    }
}
