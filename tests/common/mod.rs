//! Shared test infrastructure for integration tests.
//!
//! Each sandbox installs shell-script stand-ins for the NCO tools that log
//! their arguments, serve canned `ncks --jsn` metadata, and copy input to
//! output for the data tools.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const TAS: &str = "tas_Amon_Model-X_historical_r1i1p1f1_gn_185001-185412.nc";
pub const TOS: &str = "tos_Omon_Model-X_historical_r1i1p1f1_gn_185001-185412.nc";

pub struct NcoSandbox {
    root: TempDir,
}

impl NcoSandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create sandbox");
        let sandbox = Self { root };
        fs::create_dir_all(sandbox.bin_dir()).expect("create bin dir");
        fs::create_dir_all(sandbox.data_dir()).expect("create data dir");
        sandbox.install_tools();
        sandbox.write_metadata("{}");
        sandbox.write_config();
        sandbox
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    fn bin_dir(&self) -> PathBuf {
        self.root().join("bin")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root().join("data")
    }

    fn log_path(&self) -> PathBuf {
        self.root().join("tools.log")
    }

    fn metadata_path(&self) -> PathBuf {
        self.root().join("metadata.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("config.json")
    }

    pub fn rules_path(&self) -> PathBuf {
        self.root().join("rules.json")
    }

    /// Make every attribute edit fail from now on.
    pub fn fail_attribute_edits(&self) {
        fs::write(self.root().join("fail-ncatted"), b"").expect("write fail marker");
    }

    pub fn write_metadata(&self, json: &str) {
        fs::write(self.metadata_path(), json).expect("write metadata");
    }

    pub fn write_rules(&self, json: &str) {
        fs::write(self.rules_path(), json).expect("write rules");
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        let path = self.data_dir().join(name);
        fs::write(&path, b"netcdf payload").expect("write data file");
        path
    }

    /// Tool invocations in order, one line each (`<tool> <args...>`).
    pub fn logged(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn data_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.data_dir())
            .expect("read data dir")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    pub fn ncfix<I, S>(&self, args: I) -> Output
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Command::new(env!("CARGO_BIN_EXE_ncfix"))
            .args(args)
            .env_remove("NCFIX_CONFIG")
            .env_remove("RUST_LOG")
            .env("NCFIX_LOG", "warn")
            .env("HOME", self.root())
            .env("XDG_CONFIG_HOME", self.root().join("xdg"))
            .output()
            .expect("run ncfix")
    }

    fn install_tools(&self) {
        let log = self.log_path();
        let log = log.display();
        let meta = self.metadata_path();
        let meta = meta.display();
        let fail = self.root().join("fail-ncatted");
        let fail = fail.display();
        self.install(
            "ncatted",
            &format!(
                "printf 'ncatted %s\\n' \"$*\" >> '{log}'\n\
                 if [ -f '{fail}' ]; then echo 'ncatted: forced failure' >&2; exit 1; fi\n"
            ),
        );
        self.install(
            "ncks",
            &format!(
                "if [ \"$1\" = \"--jsn\" ]; then cat '{meta}'; exit 0; fi\n\
                 printf 'ncks %s\\n' \"$*\" >> '{log}'\n"
            ),
        );
        for tool in ["ncap2", "ncpdq"] {
            self.install(
                tool,
                &format!(
                    "printf '{tool} %s\\n' \"$*\" >> '{log}'\n\
                     for arg; do prev=\"$last\"; last=\"$arg\"; done\n\
                     cp \"$prev\" \"$last\"\n"
                ),
            );
        }
    }

    fn install(&self, name: &str, body: &str) {
        let path = self.bin_dir().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write tool script");
        make_executable(&path);
    }

    fn write_config(&self) {
        let bin = self.bin_dir();
        let tool = |name: &str| bin.join(name).display().to_string();
        let config = serde_json::json!({
            "schema_version": 1,
            "tools": {
                "ncatted": tool("ncatted"),
                "ncks": tool("ncks"),
                "ncap2": tool("ncap2"),
                "ncpdq": tool("ncpdq"),
            }
        });
        fs::write(
            self.config_path(),
            serde_json::to_string_pretty(&config).expect("serialize config"),
        )
        .expect("write config");
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).expect("stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
