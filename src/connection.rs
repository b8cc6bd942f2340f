//! Authenticated XML-RPC session with the CCU.
//!
//! Every remote call is a single HTTP POST carrying one `<methodCall>`
//! document; there is no pipelining and no retry beyond the initial
//! connection check. The handle is passed explicitly into each command that
//! talks to the hub.

use std::path::PathBuf;

use tracing::{debug, info, trace};

use crate::config;
use crate::paramset::ParameterSet;
use crate::xmlrpc::{self, Response, Value};

/// Device-lookup mode of `getPeerId` that selects by device type string.
const LOOKUP_BY_TYPE: i64 = 4;

/// Paramset operations go through the device's maintenance channel.
const MAINTENANCE_CHANNEL: i64 = 0;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Settings(#[from] config::Error),
    #[error("could not construct the HTTP client")]
    CreateClient(#[source] reqwest::Error),
    #[error("could not reach the hub at `{1}`")]
    Connect(#[source] reqwest::Error, String),
    #[error("`{1}` call failed in transit")]
    Transport(#[source] reqwest::Error, &'static str),
    #[error("could not parse the `{1}` response")]
    ParseResponse(#[source] xmlrpc::Error, &'static str),
    #[error("hub rejected `{0}` with fault {1}: {2}")]
    Fault(&'static str, i64, String),
    #[error("`{0}` succeeded but returned {1} where {2} was expected")]
    UnexpectedShape(&'static str, &'static str, &'static str),
}

#[derive(clap::Parser, Clone)]
#[group(id = "connection::Args")]
pub struct Args {
    /// Hostname or address of the CCU.
    #[arg(long, short = 's')]
    server: Option<String>,

    /// XML-RPC port of the BidCos-RF interface.
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// User to authenticate as.
    #[arg(long, short = 'u')]
    user: Option<String>,

    /// Password for the user.
    ///
    /// Prefer the settings file over this flag; the password ends up in the
    /// shell history otherwise.
    #[arg(long)]
    password: Option<String>,

    /// Settings file to consult for anything not given as a flag.
    ///
    /// Defaults to `~/.config/hm-prowee-tools.ini`.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Give up on a remote call after this long.
    #[arg(long, default_value = "15s")]
    timeout: humantime::Duration,
}

pub struct Connection {
    client: reqwest::blocking::Client,
    endpoint: String,
    user: String,
    password: String,
}

impl Connection {
    /// Resolve settings, build the client and run the single connection
    /// check (`system.listMethods`).
    pub fn open(args: Args) -> Result<Connection, Error> {
        let flags = config::Partial {
            server: args.server,
            port: args.port,
            user: args.user,
            password: args.password,
        };
        let settings = flags.resolve(args.config.as_deref())?;
        let endpoint = format!("https://{}:{}/", settings.server, settings.port);
        // The CCU serves a self-signed certificate.
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(*args.timeout)
            .build()
            .map_err(Error::CreateClient)?;
        let connection = Connection {
            client,
            endpoint,
            user: settings.user,
            password: settings.password,
        };
        info!(message = "connecting...", endpoint = connection.endpoint.as_str());
        let methods = connection.call("system.listMethods", vec![])?;
        let methods = match &methods {
            Value::Array(items) => items.len(),
            _ => 0,
        };
        debug!(message = "connected", methods);
        Ok(connection)
    }

    /// Ids of paired devices matching a device type, e.g. `HM-CC-RT-DN`.
    pub fn list_devices_by_type(&self, device_type: &str) -> Result<Vec<i64>, Error> {
        let value = self.call(
            "getPeerId",
            vec![Value::Int(LOOKUP_BY_TYPE), Value::String(device_type.to_string())],
        )?;
        let Value::Array(items) = value else {
            return Err(Error::UnexpectedShape("getPeerId", "a non-array", "an array"));
        };
        items
            .iter()
            .map(|item| {
                item.as_i64().ok_or(Error::UnexpectedShape(
                    "getPeerId",
                    "a non-integer element",
                    "device ids",
                ))
            })
            .collect()
    }

    /// Display name of a device.
    pub fn get_device_name(&self, id: i64) -> Result<String, Error> {
        let value = self.call("getDeviceInfo", vec![Value::Int(id)])?;
        let Value::Struct(members) = value else {
            return Err(Error::UnexpectedShape("getDeviceInfo", "a non-struct", "a struct"));
        };
        members
            .get("Name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(Error::UnexpectedShape("getDeviceInfo", "a struct without Name", "Name"))
    }

    /// Read a device parameter set, normally `MASTER`.
    pub fn get_paramset(&self, id: i64, set_name: &str) -> Result<ParameterSet, Error> {
        let value = self.call(
            "getParamset",
            vec![
                Value::Int(id),
                Value::Int(MAINTENANCE_CHANNEL),
                Value::String(set_name.to_string()),
            ],
        )?;
        match value {
            Value::Struct(members) => Ok(members),
            _ => Err(Error::UnexpectedShape("getParamset", "a non-struct", "a struct")),
        }
    }

    /// Write parameter-set entries to a device.
    pub fn put_paramset(
        &self,
        id: i64,
        set_name: &str,
        values: ParameterSet,
    ) -> Result<(), Error> {
        self.call(
            "putParamset",
            vec![
                Value::Int(id),
                Value::Int(MAINTENANCE_CHANNEL),
                Value::String(set_name.to_string()),
                Value::Struct(values),
            ],
        )?;
        Ok(())
    }

    fn call(&self, method: &'static str, params: Vec<Value>) -> Result<Value, Error> {
        let body = xmlrpc::write_call(method, &params);
        trace!(message = "calling", method, body_len = body.len());
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    Error::Connect(e, self.endpoint.clone())
                } else {
                    Error::Transport(e, method)
                }
            })?;
        let text = response.text().map_err(|e| Error::Transport(e, method))?;
        trace!(message = "response received", method, body_len = text.len());
        match xmlrpc::parse_response(&text).map_err(|e| Error::ParseResponse(e, method))? {
            Response::Success(value) => Ok(value),
            Response::Fault { code, message } => Err(Error::Fault(method, code, message)),
        }
    }
}
