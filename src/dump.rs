use std::{fs, path::PathBuf};

use crate::{env, error::DroneError, utils};

/// Appends every command sent to the drone and every reply received to a
/// per-session log file.
#[derive(Debug, Clone)]
pub struct ConnDumper {
    file: PathBuf,
}

impl ConnDumper {
    pub fn new(name: &str) -> Result<Self, DroneError> {
        let dir = utils::dir_with_slash(&env::ENV_TELLO_DUMP_DIR) + &utils::dir_with_slash(name);
        fs::create_dir_all(&dir)?;
        let file = PathBuf::from(dir).join(format!("dump_comm_{}.log", utils::now_secs()));
        Ok(Self { file })
    }

    /// Dumper enabled by `ENV_TELLO_DUMP`, `None` otherwise.
    pub fn from_env(name: &str) -> Option<Self> {
        if !*env::ENV_TELLO_DUMP {
            return None;
        }
        match Self::new(name) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!("can't create dump dir, dumping disabled: {e}");
                None
            }
        }
    }

    pub fn sent(&self, command: &str) {
        self.dump(">>", command);
    }

    pub fn received(&self, response: &str) {
        self.dump("<<", response);
    }

    fn dump(&self, dir: &str, line: &str) {
        let now = chrono::Local::now().format("%H:%M:%S%.3f");
        let entry = format!("{now} {dir} {}\n", line.trim_end());
        utils::append_to_file(&self.file.to_string_lossy(), entry.as_bytes());
    }
}
