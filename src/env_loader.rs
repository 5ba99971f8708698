use std::path::{Path, PathBuf};

/// `.env` next to the config file, if a config file was given.
fn fallback_dotenv_path(config_path: Option<&Path>) -> Option<PathBuf> {
    let dir = config_path?.parent()?;
    Some(dir.join(".env"))
}

/// Load `.env` from the working directory, falling back to the config
/// file's directory. Variables already set in the environment win.
pub fn load_dotenv(config_path: Option<&Path>) {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let Some(path) = fallback_dotenv_path(config_path) else {
        return;
    };
    if path.is_file() {
        if let Err(e) = dotenvy::from_path(&path) {
            tracing::warn!("failed to load {}: {}", path.display(), e);
        }
    }
}
