use directories::UserDirs;
use std::{fs, path::PathBuf};

pub fn runtime_dir() -> PathBuf {
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    let dir = home.join(".local").join("run");
    let _ = fs::create_dir_all(&dir);
    dir
}

/// Control socket: status/snapshot/reset/profile ops.
pub fn socket_path() -> PathBuf {
    runtime_dir().join("jackcount.sock")
}

/// Frame socket: the pose process streams skeleton frames here.
pub fn frames_socket_path() -> PathBuf {
    runtime_dir().join("jackcount-frames.sock")
}
