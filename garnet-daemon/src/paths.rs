use std::path::PathBuf;

pub const DEFAULT_SOCKET: &str = "/tmp/garnet.sock";
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Largest payload read from a single collector connection.
pub const PAYLOAD_LIMIT: usize = 512;

pub fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET)
}

pub fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_DIR)
}
