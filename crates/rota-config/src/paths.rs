use std::path::PathBuf;

/// XDG app name used for config and state directories.
pub const APP_NAME: &str = "lead-rota";

/// When set, config and state live under this directory instead of XDG paths.
pub const HOME_ENV: &str = "LEAD_ROTA_HOME";

fn home_override() -> Option<PathBuf> {
    std::env::var_os(HOME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn project_config_dir(app_name: &str) -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", app_name).map(|dirs| dirs.config_dir().to_path_buf())
}

fn project_state_dir(app_name: &str) -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", app_name).map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

/// Directory holding `config.toml`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(home) = home_override() {
        return Some(home.join("config"));
    }
    project_config_dir(APP_NAME)
}

/// State root: data and leases default to subdirectories of this.
///
/// `state_dir()` is Linux-only in `directories`; other platforms use the
/// local data dir, and a temp-dir fallback covers containers without HOME.
pub fn state_dir() -> PathBuf {
    if let Some(home) = home_override() {
        return home.join("state");
    }
    project_state_dir(APP_NAME).unwrap_or_else(state_dir_fallback)
}

pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

/// Default document store root.
pub fn default_data_dir() -> PathBuf {
    state_dir().join("data")
}

/// Default directory for per-tenant lease files.
pub fn default_lease_dir() -> PathBuf {
    state_dir().join("leases")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        prev: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(value: &str) -> Self {
            let prev = std::env::var_os(HOME_ENV);
            // SAFETY: tests touching the environment are serialized.
            unsafe { std::env::set_var(HOME_ENV, value) };
            Self { prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: tests touching the environment are serialized.
            unsafe {
                match &self.prev {
                    Some(v) => std::env::set_var(HOME_ENV, v),
                    None => std::env::remove_var(HOME_ENV),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn test_home_override_roots_every_path() {
        let _guard = EnvGuard::set("/srv/rota");
        assert_eq!(config_dir(), Some(PathBuf::from("/srv/rota/config")));
        assert_eq!(state_dir(), PathBuf::from("/srv/rota/state"));
        assert_eq!(default_data_dir(), PathBuf::from("/srv/rota/state/data"));
        assert_eq!(
            default_lease_dir(),
            PathBuf::from("/srv/rota/state/leases")
        );
    }

    #[test]
    #[serial]
    fn test_empty_override_is_ignored() {
        let _guard = EnvGuard::set("");
        assert_ne!(state_dir(), PathBuf::from("state"));
    }

    #[test]
    fn test_fallback_is_under_temp_dir() {
        let fallback = state_dir_fallback();
        assert!(fallback.starts_with(std::env::temp_dir()));
        assert!(fallback.ends_with("lead-rota-state"));
    }
}
