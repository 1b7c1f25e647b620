use std::path::PathBuf;

/// The daemon binary installs next to the cli binary.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("wordwatch-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}
