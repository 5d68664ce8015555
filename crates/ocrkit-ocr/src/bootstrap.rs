//! One-time platform preparation performed before a backend is probed.
//!
//! On Windows the native OCR payload ships next to the application: its
//! directory must be registered with the DLL loader and the backend must be
//! told where its trained data lives. Other platforms rely on the system
//! installation and need no preparation.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Process-wide bootstrap outcomes, one per data environment variable.
static APPLIED: LazyLock<Mutex<HashMap<&'static str, Arc<OnceLock<Outcome>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPolicy {
    /// The bundled payload must exist; probing fails without it.
    RequireBundled,
    /// The backend is discovered from the system installation.
    SystemDiscovery,
}

impl BootstrapPolicy {
    pub fn for_current_platform() -> Self {
        if cfg!(target_os = "windows") {
            BootstrapPolicy::RequireBundled
        } else {
            BootstrapPolicy::SystemDiscovery
        }
    }
}

#[derive(Debug)]
pub struct PlatformBootstrap {
    policy: BootstrapPolicy,
    payload_dir: Option<PathBuf>,
    data_subdir: &'static str,
    data_env_var: &'static str,
    outcome: Arc<OnceLock<Outcome>>,
}

#[derive(Debug, Clone, Default)]
struct Outcome {
    ready: bool,
    payload_dir: Option<PathBuf>,
    library_dirs: Vec<PathBuf>,
}

fn applied_cell(data_env_var: &'static str) -> Arc<OnceLock<Outcome>> {
    Arc::clone(APPLIED.lock().entry(data_env_var).or_default())
}

impl PlatformBootstrap {
    /// `payload_dir` is the bundled backend directory; `None` means it could
    /// not be resolved and is treated like a missing directory.
    ///
    /// Bundled bootstraps sharing `data_env_var` share one outcome for the
    /// whole process: the first one to prepare the environment applies its
    /// payload, every later one observes that result.
    pub fn new(
        policy: BootstrapPolicy,
        payload_dir: Option<PathBuf>,
        data_subdir: &'static str,
        data_env_var: &'static str,
    ) -> Self {
        Self {
            policy,
            payload_dir,
            data_subdir,
            data_env_var,
            outcome: match policy {
                BootstrapPolicy::RequireBundled => applied_cell(data_env_var),
                BootstrapPolicy::SystemDiscovery => Arc::new(OnceLock::new()),
            },
        }
    }

    pub fn policy(&self) -> BootstrapPolicy {
        self.policy
    }

    pub fn payload_dir(&self) -> Option<&Path> {
        self.payload_dir.as_deref()
    }

    /// Prepares the process environment. Runs at most once per process;
    /// later calls, from this or any other bundled bootstrap for the same
    /// variable, return the first outcome.
    pub fn prepare_environment(&self) -> bool {
        let outcome = self.outcome();
        if outcome.payload_dir.is_some() && outcome.payload_dir != self.payload_dir {
            debug!(
                var = self.data_env_var,
                applied = ?outcome.payload_dir,
                requested = ?self.payload_dir,
                "environment already prepared from another payload"
            );
        }
        outcome.ready
    }

    /// Directories registered as additional native library locations.
    pub fn library_dirs(&self) -> &[PathBuf] {
        &self.outcome().library_dirs
    }

    fn outcome(&self) -> &Outcome {
        self.outcome.get_or_init(|| match self.policy {
            BootstrapPolicy::SystemDiscovery => Outcome {
                ready: true,
                ..Outcome::default()
            },
            BootstrapPolicy::RequireBundled => self.apply_bundled(),
        })
    }

    fn apply_bundled(&self) -> Outcome {
        let Some(dir) = self.payload_dir.as_deref().filter(|dir| dir.is_dir()) else {
            debug!(
                payload = ?self.payload_dir,
                "bundled OCR payload not found; backend stays disabled"
            );
            return Outcome::default();
        };

        if let Err(err) = register_library_dir(dir) {
            warn!(dir = %dir.display(), "failed to register native library directory: {err}");
            return Outcome::default();
        }

        let data_dir = dir.join(self.data_subdir);
        // SAFETY: this runs at most once per variable and process, inside the
        // shared once cell, before any backend reading the variable is
        // loaded. Every other bootstrap for the variable blocks on the cell
        // and never writes it.
        unsafe {
            env::set_var(self.data_env_var, &data_dir);
        }
        info!(
            dir = %dir.display(),
            data = %data_dir.display(),
            var = self.data_env_var,
            "prepared bundled OCR payload"
        );

        Outcome {
            ready: true,
            payload_dir: Some(dir.to_path_buf()),
            library_dirs: vec![dir.to_path_buf()],
        }
    }
}

/// Directory holding the bundled payload next to the running executable.
pub fn bundled_payload_dir(name: &str) -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?.join(name);
    Some(dir.canonicalize().unwrap_or(dir))
}

#[cfg(target_os = "windows")]
fn register_library_dir(dir: &Path) -> Result<(), String> {
    use std::os::windows::ffi::OsStrExt;
    use windows::Win32::System::LibraryLoader::AddDllDirectory;
    use windows::core::PCWSTR;

    let wide: Vec<u16> = dir
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    // SAFETY: `wide` is a NUL-terminated UTF-16 path that outlives the call.
    let cookie = unsafe { AddDllDirectory(PCWSTR(wide.as_ptr())) };
    if cookie.is_null() {
        Err(std::io::Error::last_os_error().to_string())
    } else {
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
fn register_library_dir(_dir: &Path) -> Result<(), String> {
    // dlopen has no runtime search path API; the loader tries the recorded
    // directories explicitly.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_discovery_is_a_no_op() {
        let bootstrap = PlatformBootstrap::new(
            BootstrapPolicy::SystemDiscovery,
            None,
            "tessdata",
            "OCRKIT_TEST_UNUSED_PREFIX",
        );
        assert!(bootstrap.prepare_environment());
        assert!(bootstrap.library_dirs().is_empty());
        assert!(env::var_os("OCRKIT_TEST_UNUSED_PREFIX").is_none());
    }

    #[test]
    fn missing_payload_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrap = PlatformBootstrap::new(
            BootstrapPolicy::RequireBundled,
            Some(dir.path().join("tesseract_ocr")),
            "tessdata",
            "OCRKIT_TEST_MISSING_PREFIX",
        );
        assert!(!bootstrap.prepare_environment());
        assert!(bootstrap.library_dirs().is_empty());
        assert!(env::var_os("OCRKIT_TEST_MISSING_PREFIX").is_none());
    }

    #[test]
    fn unresolved_payload_is_not_ready() {
        let bootstrap = PlatformBootstrap::new(
            BootstrapPolicy::RequireBundled,
            None,
            "tessdata",
            "OCRKIT_TEST_UNRESOLVED_PREFIX",
        );
        assert!(!bootstrap.prepare_environment());
    }

    #[test]
    fn bundled_payload_sets_data_variable_once() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("tesseract_ocr");
        std::fs::create_dir_all(payload.join("tessdata")).unwrap();

        let bootstrap = PlatformBootstrap::new(
            BootstrapPolicy::RequireBundled,
            Some(payload.clone()),
            "tessdata",
            "OCRKIT_TEST_BUNDLED_PREFIX",
        );
        assert!(bootstrap.prepare_environment());
        assert_eq!(
            env::var_os("OCRKIT_TEST_BUNDLED_PREFIX").map(PathBuf::from),
            Some(payload.join("tessdata"))
        );
        assert_eq!(bootstrap.library_dirs(), &[payload.clone()]);

        // The payload disappearing later does not change the recorded outcome.
        drop(dir);
        assert!(bootstrap.prepare_environment());
    }

    #[test]
    fn second_bundled_bootstrap_reuses_first_application() {
        let dir = tempfile::tempdir().unwrap();
        let first_payload = dir.path().join("a");
        let second_payload = dir.path().join("b");
        std::fs::create_dir_all(&first_payload).unwrap();
        std::fs::create_dir_all(&second_payload).unwrap();

        let first = PlatformBootstrap::new(
            BootstrapPolicy::RequireBundled,
            Some(first_payload.clone()),
            "tessdata",
            "OCRKIT_TEST_SHARED_PREFIX",
        );
        let second = PlatformBootstrap::new(
            BootstrapPolicy::RequireBundled,
            Some(second_payload),
            "tessdata",
            "OCRKIT_TEST_SHARED_PREFIX",
        );

        assert!(first.prepare_environment());
        let after_first = env::var_os("OCRKIT_TEST_SHARED_PREFIX");
        assert!(second.prepare_environment());
        let after_second = env::var_os("OCRKIT_TEST_SHARED_PREFIX");

        assert_eq!(after_first, after_second);
        assert_eq!(
            after_second.map(PathBuf::from),
            Some(first_payload.join("tessdata"))
        );
        assert_eq!(second.library_dirs(), &[first_payload]);
    }

    #[test]
    fn failed_bundled_bootstrap_is_shared_too() {
        let dir = tempfile::tempdir().unwrap();
        let missing = PlatformBootstrap::new(
            BootstrapPolicy::RequireBundled,
            Some(dir.path().join("missing")),
            "tessdata",
            "OCRKIT_TEST_SHARED_MISSING_PREFIX",
        );
        assert!(!missing.prepare_environment());

        let present = dir.path().join("present");
        std::fs::create_dir_all(&present).unwrap();
        let later = PlatformBootstrap::new(
            BootstrapPolicy::RequireBundled,
            Some(present),
            "tessdata",
            "OCRKIT_TEST_SHARED_MISSING_PREFIX",
        );
        assert!(!later.prepare_environment());
        assert!(env::var_os("OCRKIT_TEST_SHARED_MISSING_PREFIX").is_none());
    }

    #[test]
    fn concurrent_bundled_bootstraps_apply_once() {
        let dir = tempfile::tempdir().unwrap();
        let payloads: Vec<PathBuf> = (0..4).map(|i| dir.path().join(format!("p{i}"))).collect();
        for payload in &payloads {
            std::fs::create_dir_all(payload).unwrap();
        }
        let bootstraps: Vec<_> = payloads
            .iter()
            .map(|payload| {
                PlatformBootstrap::new(
                    BootstrapPolicy::RequireBundled,
                    Some(payload.clone()),
                    "tessdata",
                    "OCRKIT_TEST_CONCURRENT_PREFIX",
                )
            })
            .collect();

        let dirs: Vec<Vec<PathBuf>> = std::thread::scope(|scope| {
            let handles: Vec<_> = bootstraps
                .iter()
                .map(|bootstrap| {
                    scope.spawn(move || {
                        assert!(bootstrap.prepare_environment());
                        bootstrap.library_dirs().to_vec()
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert!(dirs.windows(2).all(|pair| pair[0] == pair[1]));
        let applied = PathBuf::from(env::var_os("OCRKIT_TEST_CONCURRENT_PREFIX").unwrap());
        assert_eq!(applied, dirs[0][0].join("tessdata"));
    }
}
