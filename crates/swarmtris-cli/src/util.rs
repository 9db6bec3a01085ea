use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, BufReader, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};

/// Where JSON results go: stdout, or a file given on the command line.
#[derive(Debug)]
pub enum Output {
    Stdout(StdoutLock<'static>),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    /// Writes `value` as pretty JSON to `path`, or to stdout when there is none.
    pub fn save_json<T>(value: &T, path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let mut output = match path {
            Some(path) => Self::create(path)?,
            None => Self::Stdout(io::stdout().lock()),
        };
        output.write_json(value, true)
    }

    /// Opens `path`, truncating any previous content.
    pub fn create(path: PathBuf) -> anyhow::Result<Self> {
        Self::open_with(path, OpenOptions::new().write(true).create(true).truncate(true))
    }

    /// Opens `path` for appending, creating it if needed.
    pub fn append(path: PathBuf) -> anyhow::Result<Self> {
        Self::open_with(path, OpenOptions::new().create(true).append(true))
    }

    fn open_with(path: PathBuf, options: &OpenOptions) -> anyhow::Result<Self> {
        let file = options
            .open(&path)
            .with_context(|| format!("Failed to open output file: {}", path.display()))?;
        Ok(Self::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Writes one JSON document and a trailing newline, then flushes.
    ///
    /// Compact documents stay on a single line, for JSON Lines logs.
    pub fn write_json<T>(&mut self, value: &T, pretty: bool) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let written = if pretty {
            serde_json::to_writer_pretty(&mut *self, value)
        } else {
            serde_json::to_writer(&mut *self, value)
        };
        written.with_context(|| format!("Failed to write JSON to {self}"))?;
        writeln!(self)
            .and_then(|()| self.flush())
            .with_context(|| format!("Failed to finish writing to {self}"))
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout(_) => f.write_str("stdout"),
            Self::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(writer) => writer.write(buf),
            Self::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(writer) => writer.flush(),
            Self::File { writer, .. } => writer.flush(),
        }
    }
}

/// Reads a JSON file; `file_kind` names the file in error messages.
pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "swarmtris-cli-{name}-{}-{nanos}.json",
            std::process::id()
        ))
    }

    #[test]
    fn test_append_writes_one_line_per_value() {
        let path = scratch_file("append");
        for round in 1..=2 {
            let mut output = Output::append(path.clone()).unwrap();
            output
                .write_json(&serde_json::json!({ "round": round }), false)
                .unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"round\":1}\n{\"round\":2}\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_save_then_read_json() {
        let path = scratch_file("save");
        Output::save_json(&vec![1, 2, 3], Some(path.clone())).unwrap();
        Output::save_json(&vec![4], Some(path.clone())).unwrap();
        let value: Vec<u32> = read_json_file("test", &path).unwrap();
        assert_eq!(value, vec![4]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_output_names_its_target() {
        let path = scratch_file("name");
        let output = Output::create(path.clone()).unwrap();
        assert_eq!(output.to_string(), path.display().to_string());
        drop(output);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_missing_file_names_kind() {
        let path = scratch_file("missing");
        let err = read_json_file::<u32, _>("config", &path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to open config file"));
    }
}
