/*
 * Resolves the per-user directories the organizer persists into: the local
 * configuration directory (runtime config blob, log file). Directory creation is
 * centralised here so storage implementations only deal with file names.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = "media_shelf.log";

/*
 * Makes sure `dir` exists, creating intermediate directories as needed.
 * Returns `None` (after logging) if the directory cannot be created.
 */
pub fn ensure_dir(dir: &Path) -> Option<PathBuf> {
    if dir.exists() {
        log::trace!("PathUtils: Directory already exists: {dir:?}");
        return Some(dir.to_path_buf());
    }
    if let Err(e) = fs::create_dir_all(dir) {
        log::error!("PathUtils: Failed to create directory {dir:?}: {e}");
        return None;
    }
    log::debug!("PathUtils: Created directory: {dir:?}");
    Some(dir.to_path_buf())
}

/*
 * Retrieves (and creates on first use) the application's local, non-roaming
 * configuration directory, e.g. `~/.config/<app_name>` or `AppData/Local/<app_name>`.
 * Returns `None` if the platform offers no home directory.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving base app config local dir for '{app_name}'");
    let proj_dirs = ProjectDirs::from("", "", app_name)?;
    ensure_dir(proj_dirs.config_local_dir())
}

pub fn get_log_file_path(app_name: &str) -> Option<PathBuf> {
    get_base_app_config_local_dir(app_name).map(|dir| dir.join(LOG_FILE_NAME))
}
