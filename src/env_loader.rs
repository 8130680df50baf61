use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(
    quota_home: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(base) = quota_home {
        return Some(base.join(".env"));
    }
    let config = config_dir.or_else(|| home_dir.map(|home| home.join(".config")))?;
    Some(config.join("quotawatch/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("QUOTA_HOME").map(PathBuf::from),
        dirs::config_dir(),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
