pub mod list {
    use crate::{connection, output};

    /// List paired radiator thermostats.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        /// Device type to look for.
        #[arg(long, default_value = "HM-CC-RT-DN")]
        device_type: String,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("hub communication failed")]
        Connection(#[source] connection::Error),
        #[error("could not produce the device listing")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    struct Device {
        id: i64,
        name: String,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = connection::Connection::open(args.connection).map_err(Error::Connection)?;
        let ids = connection
            .list_devices_by_type(&args.device_type)
            .map_err(Error::Connection)?;
        tracing::debug!(message = "devices found", count = ids.len());
        let mut output = args.output.open(&["Id", "Name"]).map_err(Error::Output)?;
        for id in ids {
            let name = connection.get_device_name(id).map_err(Error::Connection)?;
            output
                .row(vec![id.to_string(), name.clone()], Device { id, name })
                .map_err(Error::Output)?;
        }
        output.commit().map_err(Error::Output)
    }
}

pub mod print_config {
    use crate::connection;

    /// Dump a device's MASTER parameter set as JSON.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        /// The device id, as shown by `list`.
        id: i64,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("hub communication failed")]
        Connection(#[source] connection::Error),
        #[error("could not serialize the parameter set")]
        Serialize(#[source] serde_json::Error),
        #[error("could not write data to the terminal")]
        WriteStdout(#[source] std::io::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = connection::Connection::open(args.connection).map_err(Error::Connection)?;
        let set = connection.get_paramset(args.id, "MASTER").map_err(Error::Connection)?;
        let json = serde_json::to_string_pretty(&set).map_err(Error::Serialize)?;
        use std::io::Write as _;
        writeln!(std::io::stdout().lock(), "{json}").map_err(Error::WriteStdout)
    }
}

pub mod print_temp {
    use crate::{connection, paramset};

    /// Print a device's stored temperature program as an editable schedule.
    ///
    /// The output is accepted back by `set-temp` unchanged.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        /// The device id, as shown by `list`.
        id: i64,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("hub communication failed")]
        Connection(#[source] connection::Error),
        #[error("device {1} returned an unusable temperature program")]
        Decode(#[source] paramset::DecodeError, i64),
        #[error("could not write data to the terminal")]
        WriteStdout(#[source] std::io::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let connection = connection::Connection::open(args.connection).map_err(Error::Connection)?;
        let set = connection.get_paramset(args.id, "MASTER").map_err(Error::Connection)?;
        let schedule = paramset::decode(&set).map_err(|e| Error::Decode(e, args.id))?;
        use std::io::Write as _;
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{schedule}").map_err(Error::WriteStdout)
    }
}

pub mod set_temp {
    use std::path::PathBuf;

    use tracing::{debug, info};

    use crate::{connection, paramset, schedule};

    /// Push a weekly schedule file to a device.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        /// The device id, as shown by `list`.
        id: i64,
        /// Path to the schedule file.
        file: PathBuf,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not read the schedule file at {1:?}")]
        ReadFile(#[source] std::io::Error, PathBuf),
        #[error("schedule file {1:?} is malformed")]
        Parse(#[source] schedule::ParseError, PathBuf),
        #[error("schedule does not fit the device")]
        Encode(#[source] paramset::EncodeError),
        #[error("hub communication failed")]
        Connection(#[source] connection::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let text = std::fs::read_to_string(&args.file)
            .map_err(|e| Error::ReadFile(e, args.file.clone()))?;
        let schedule = schedule::parse_weekly_schedule(&text)
            .map_err(|e| Error::Parse(e, args.file.clone()))?;
        let set = paramset::encode(&schedule).map_err(Error::Encode)?;
        // Everything that will reach the device, before it does.
        for (key, value) in &set {
            debug!(message = "will send", key = key.as_str(), value = %DisplayValue(value));
        }
        // The whole file must be good before anything is sent; a half-applied
        // schedule on the device is worse than none.
        let connection = connection::Connection::open(args.connection).map_err(Error::Connection)?;
        let entries = set.len();
        connection.put_paramset(args.id, "MASTER", set).map_err(Error::Connection)?;
        info!(message = "schedule written", device = args.id, entries);
        Ok(())
    }

    struct DisplayValue<'a>(&'a crate::xmlrpc::Value);

    impl std::fmt::Display for DisplayValue<'_> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            use crate::xmlrpc::Value;
            match self.0 {
                Value::Int(n) => write!(f, "{n}"),
                Value::Double(n) => write!(f, "{n:.1}"),
                Value::Bool(b) => write!(f, "{b}"),
                Value::String(s) => f.write_str(s),
                Value::Array(_) | Value::Struct(_) => f.write_str("<composite>"),
            }
        }
    }
}
