//! Host platform detection and per-platform launch plans.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use vigil_core::{LOG_FILE_PLACEHOLDER, ProcessError, ServerConfig};

/// Platforms the server can be launched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    /// Direct executable.
    Windows,
    /// Executable, optionally behind a launcher such as `wine`.
    Linux,
}

impl HostPlatform {
    /// Resolve the platform from an override or the compile target.
    pub fn resolve(configured: Option<&str>) -> Result<Self, ProcessError> {
        let name = configured.unwrap_or(std::env::consts::OS);
        match name {
            "windows" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(ProcessError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Fully resolved command line for one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: BTreeMap<String, OsString>,
    pub working_dir: Option<PathBuf>,
    /// Script to run after the process exits.
    pub shutdown_script: Option<PathBuf>,
}

impl LaunchPlan {
    pub fn build(platform: HostPlatform, config: &ServerConfig) -> Self {
        let log_file = config.log_file.as_os_str();
        let mut args: Vec<OsString> = config
            .args
            .iter()
            .map(|arg| {
                if arg == LOG_FILE_PLACEHOLDER {
                    log_file.to_os_string()
                } else {
                    OsString::from(arg.replace(LOG_FILE_PLACEHOLDER, &log_file.to_string_lossy()))
                }
            })
            .collect();

        let mut env: BTreeMap<String, OsString> = config
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), OsString::from(v)))
            .collect();

        let working_dir = config.working_dir.clone().or_else(|| {
            config
                .executable
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
        });

        match platform {
            HostPlatform::Windows => Self {
                program: config.executable.clone().into_os_string(),
                args,
                env,
                working_dir,
                shutdown_script: None,
            },
            HostPlatform::Linux => {
                if let Some(ref lib) = config.library_path {
                    env.insert("LD_LIBRARY_PATH".to_string(), lib.clone().into_os_string());
                }
                let program = match config.launcher {
                    Some(ref launcher) => {
                        args.insert(0, config.executable.clone().into_os_string());
                        OsString::from(launcher)
                    }
                    None => config.executable.clone().into_os_string(),
                };
                Self {
                    program,
                    args,
                    env,
                    working_dir,
                    shutdown_script: config.shutdown_script.clone(),
                }
            }
        }
    }
}
