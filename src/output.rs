//! Output selection for tabular commands: a rendered table on the terminal,
//! one JSON object per line, or CSV.

use std::path::PathBuf;

use csv_core::WriteResult;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Format {
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser)]
#[group(id = "output::Args")]
pub struct Args {
    /// Write to this file instead of the terminal.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Table)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the specified output file at {1:?}")]
    OpenOutputFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the output file at {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize a record to JSON")]
    SerializeJson(#[source] serde_json::Error),
}

impl Args {
    pub fn open(self, headers: &[&'static str]) -> Result<Output, Error> {
        let io: Box<dyn std::io::Write> = match &self.output {
            None => Box::new(std::io::stdout().lock()),
            Some(path) => Box::new(
                std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::OpenOutputFile(e, path.clone()))?,
            ),
        };
        let mut output = Output {
            sink: match &self.format {
                Format::Table => {
                    let mut table = comfy_table::Table::new();
                    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                    table.set_header(headers.to_vec());
                    Sink::Table(table)
                }
                Format::Jsonl => Sink::Jsonl,
                Format::Csv => Sink::Csv,
            },
            io,
            destination: self.output,
        };
        if let Sink::Csv = output.sink {
            let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
            output.csv_row(&headers)?;
        }
        Ok(output)
    }
}

pub struct Output {
    sink: Sink,
    io: Box<dyn std::io::Write>,
    destination: Option<PathBuf>,
}

enum Sink {
    Table(comfy_table::Table),
    Jsonl,
    Csv,
}

impl Output {
    /// Emit one record; `cells` feeds the table and csv formats, `record`
    /// the jsonl one.
    pub fn row<R: serde::Serialize>(
        &mut self,
        cells: Vec<String>,
        record: R,
    ) -> Result<(), Error> {
        match &mut self.sink {
            Sink::Table(table) => {
                table.add_row(cells);
            }
            Sink::Jsonl => {
                serde_json::to_writer(&mut self.io, &record).map_err(Error::SerializeJson)?;
                writeln!(self.io).map_err(|e| self.write_error(e))?;
            }
            Sink::Csv => self.csv_row(&cells)?,
        }
        Ok(())
    }

    fn csv_row(&mut self, cells: &[String]) -> Result<(), Error> {
        // csv-core needs an output buffer big enough for the worst-case
        // quoted field.
        let longest = cells.iter().map(String::len).max().unwrap_or(0);
        let mut buffer = vec![0; 2 + 2 * longest];
        let mut writer = csv_core::Writer::new();
        for cell in cells {
            let (result, read, written) = writer.field(cell.as_bytes(), &mut buffer);
            assert!(matches!(result, WriteResult::InputEmpty) && read == cell.len());
            self.io.write_all(&buffer[..written]).map_err(|e| self.write_error(e))?;
            let (result, written) = writer.delimiter(&mut buffer);
            assert!(matches!(result, WriteResult::InputEmpty));
            self.io.write_all(&buffer[..written]).map_err(|e| self.write_error(e))?;
        }
        let (result, written) = writer.terminator(&mut buffer);
        assert!(matches!(result, WriteResult::InputEmpty));
        self.io.write_all(&buffer[..written]).map_err(|e| self.write_error(e))
    }

    /// Flush buffered output; the table format renders only here.
    pub fn commit(mut self) -> Result<(), Error> {
        if let Sink::Table(table) = &self.sink {
            writeln!(self.io, "{table}").map_err(|e| self.write_error(e))?;
        }
        self.io.flush().map_err(|e| self.write_error(e))
    }

    fn write_error(&self, e: std::io::Error) -> Error {
        match &self.destination {
            None => Error::WriteStdout(e),
            Some(path) => Error::WriteFile(e, path.clone()),
        }
    }
}
