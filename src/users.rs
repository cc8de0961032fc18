//! Persistent user-id allocation for interactive sessions.
//!
//! Simulated producers use trader ids 0..9999; real users get `USR10001`
//! and up, minted from a counter that survives process restarts via a
//! small state file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const FIRST_USER_ID: u64 = 10_001;

pub struct UserIdGenerator {
    next_id: AtomicU64,
    path: PathBuf,
}

impl UserIdGenerator {
    /// Load the counter from `path`, starting fresh at 10001 when the file
    /// is absent or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let next_id = fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&id| id >= FIRST_USER_ID)
            .unwrap_or(FIRST_USER_ID);
        Self {
            next_id: AtomicU64::new(next_id),
            path,
        }
    }

    /// Mint the next user id, first-come-first-served.
    pub fn next_user_id(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("USR{}", id)
    }

    /// Persist the counter for the next session.
    pub fn save(&self) -> std::io::Result<()> {
        fs::write(&self.path, self.next_id.load(Ordering::SeqCst).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("matchbook_test_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_fresh_counter_starts_at_10001() {
        let path = temp_path("fresh.dat");
        let _ = fs::remove_file(&path);
        let gen = UserIdGenerator::load(&path);
        assert_eq!(gen.next_user_id(), "USR10001");
        assert_eq!(gen.next_user_id(), "USR10002");
    }

    #[test]
    fn test_counter_persists_across_sessions() {
        let path = temp_path("persist.dat");
        let _ = fs::remove_file(&path);

        let gen = UserIdGenerator::load(&path);
        gen.next_user_id();
        gen.next_user_id();
        gen.save().unwrap();

        let reloaded = UserIdGenerator::load(&path);
        assert_eq!(reloaded.next_user_id(), "USR10003");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_state_file_falls_back() {
        let path = temp_path("corrupt.dat");
        fs::write(&path, "not a number").unwrap();
        let gen = UserIdGenerator::load(&path);
        assert_eq!(gen.next_user_id(), "USR10001");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_below_range_counter_rejected() {
        let path = temp_path("range.dat");
        fs::write(&path, "17").unwrap();
        let gen = UserIdGenerator::load(&path);
        assert_eq!(gen.next_user_id(), "USR10001");
        let _ = fs::remove_file(&path);
    }
}
