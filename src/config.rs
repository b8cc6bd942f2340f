//! Settings-file handling and the flag / file / prompt precedence chain.
//!
//! Connection settings come from command-line flags first, then from an INI
//! settings file, and anything still missing is asked for interactively.

use std::collections::BTreeMap;
use std::io::{BufRead as _, Write as _};
use std::path::{Path, PathBuf};

use tracing::debug;

/// XML-RPC port of the BidCos-RF interface.
pub const DEFAULT_PORT: u16 = 2001;

const SETTINGS_FILE: &str = ".config/hm-prowee-tools.ini";
const SECTION: &str = "connection";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read the settings file at {1:?}")]
    ReadFile(#[source] std::io::Error, PathBuf),
    #[error("settings file line {0} is not a section, comment or `key = value` pair: `{1}`")]
    Syntax(usize, String),
    #[error("`{0}` in the settings file is not a port number")]
    Port(String),
    #[error("could not read `{1}` from the terminal")]
    Prompt(#[source] std::io::Error, &'static str),
}

/// Fully resolved connection settings.
pub struct Settings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

#[derive(Default)]
pub struct Partial {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Partial {
    /// Fill fields missing in `self` from `other`.
    fn merge(&mut self, other: Partial) {
        self.server = self.server.take().or(other.server);
        self.port = self.port.take().or(other.port);
        self.user = self.user.take().or(other.user);
        self.password = self.password.take().or(other.password);
    }

    /// Apply the precedence chain and prompt for whatever is still missing.
    pub fn resolve(mut self, file: Option<&Path>) -> Result<Settings, Error> {
        if let Some(from_file) = load_settings_file(file)? {
            self.merge(from_file);
        }
        let server = match self.server {
            Some(server) => server,
            None => prompt("server")?,
        };
        let user = match self.user {
            Some(user) => user,
            None => prompt("user")?,
        };
        let password = match self.password {
            Some(password) => password,
            None => prompt("password")?,
        };
        Ok(Settings { server, port: self.port.unwrap_or(DEFAULT_PORT), user, password })
    }
}

fn default_settings_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(SETTINGS_FILE))
}

fn load_settings_file(file: Option<&Path>) -> Result<Option<Partial>, Error> {
    let (path, explicit) = match file {
        Some(path) => (path.to_path_buf(), true),
        None => match default_settings_path() {
            Some(path) => (path, false),
            None => return Ok(None),
        },
    };
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        // The default settings file is optional; one named with `--config`
        // is not.
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::ReadFile(e, path)),
    };
    debug!(message = "loaded settings file", ?path);
    let values = parse_ini(&text)?;
    let key = |name: &str| values.get(&(SECTION.to_string(), name.to_string())).cloned();
    let port = match key("port") {
        None => None,
        Some(text) => Some(text.parse::<u16>().map_err(|_| Error::Port(text))?),
    };
    Ok(Some(Partial {
        server: key("server"),
        port,
        user: key("user"),
        password: key("password"),
    }))
}

/// Minimal INI reader: `[section]` headers, `key = value` pairs, `#`/`;`
/// comments, blank lines. Values keep internal whitespace, ends trimmed.
fn parse_ini(text: &str) -> Result<BTreeMap<(String, String), String>, Error> {
    let mut values = BTreeMap::new();
    let mut section = String::new();
    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[') {
            let Some(name) = header.strip_suffix(']') else {
                return Err(Error::Syntax(number, line.to_string()));
            };
            section = name.trim().to_ascii_lowercase();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::Syntax(number, line.to_string()));
        };
        values.insert(
            (section.clone(), key.trim().to_ascii_lowercase()),
            value.trim().to_string(),
        );
    }
    Ok(values)
}

/// Ask for a missing setting on the terminal.
///
/// The prompt goes to stderr so piped stdout stays clean. The reply is read
/// from stdin with echo on; there is no portable way to suppress it without
/// another dependency, and the settings file is the supported way to avoid
/// typing the password.
fn prompt(name: &'static str) -> Result<String, Error> {
    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{name}: ").map_err(|e| Error::Prompt(e, name))?;
    stderr.flush().map_err(|e| Error::Prompt(e, name))?;
    let mut reply = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut reply)
        .map_err(|e| Error::Prompt(e, name))?;
    Ok(reply.trim_end_matches(['\r', '\n']).to_string())
}
