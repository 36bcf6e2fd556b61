use std::{
    env, fs,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("{0} environment variable is not set")]
    EnvMissing(&'static str),
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(target_os = "windows")]
const USER_HOME_VARS: &[&str] = &["USERPROFILE", "HOME"];
#[cfg(not(target_os = "windows"))]
const USER_HOME_VARS: &[&str] = &["HOME"];

#[cfg(target_os = "windows")]
const DEFAULT_BASE_VAR: &str = "APPDATA";
#[cfg(not(target_os = "windows"))]
const DEFAULT_BASE_VAR: &str = "HOME";

/// Resolve the server home directory.
///
/// - With `config_home`: a leading `~` expands to the user home; the result
///   must be absolute.
/// - Without: `$HOME/<default_subdir>` (`%APPDATA%` on Windows).
///
/// The directory is created when `create` is set.
pub fn resolve_home_dir(
    config_home: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = match config_home {
        Some(raw) => {
            let expanded = expand_tilde(&raw)?;
            if !expanded.is_absolute() {
                return Err(HomeDirError::AbsoluteRequired(
                    expanded.to_string_lossy().into_owned(),
                ));
            }
            expanded
        }
        None => {
            let base = env::var(DEFAULT_BASE_VAR)
                .map_err(|_| HomeDirError::EnvMissing(DEFAULT_BASE_VAR))?;
            Path::new(&base).join(default_subdir)
        }
    };

    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

fn expand_tilde(raw: &str) -> Result<PathBuf, HomeDirError> {
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(PathBuf::from(raw));
    };
    // `~user` forms are not supported.
    if !rest.is_empty() && !rest.starts_with(['/', '\\']) {
        return Ok(PathBuf::from(raw));
    }

    let home = USER_HOME_VARS
        .iter()
        .find_map(|var| env::var(var).ok())
        .ok_or(HomeDirError::EnvMissing(USER_HOME_VARS[0]))?;
    let rest = rest.trim_start_matches(['/', '\\']);
    Ok(if rest.is_empty() {
        PathBuf::from(home)
    } else {
        Path::new(&home).join(rest)
    })
}
