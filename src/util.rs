use std::{
    io,
    path::{Component, Path, PathBuf},
};

use futures_util::StreamExt as _;
use log::*;
use serde_json::ser::{Formatter, PrettyFormatter};

use crate::{Error, ItemProgress, ProgressCallback};

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

pub fn get_file_name_from_url(url: &str) -> &str {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    let url = url.trim_end_matches('/');
    url.rsplit('/').next().unwrap_or(url)
}

pub fn uri_to_file_path(uri: &str) -> &str {
    match uri.strip_prefix("file://") {
        // file:///C:/foo -> C:/foo, file:///tmp/foo -> /tmp/foo
        Some(path) if is_drive_prefixed(path) => &path[1..],
        Some(path) => path,
        None => uri,
    }
}

fn is_drive_prefixed(path: &str) -> bool {
    matches!(path.as_bytes(), [b'/', drive, b':', ..] if drive.is_ascii_alphabetic())
}

/// Normalises a path for display: drops `.` components and repeated separators.
pub fn display_path(path: &Path) -> String {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        ".".to_string()
    } else {
        normalized.display().to_string()
    }
}

/// Two-space pretty printer that writes every non-ASCII character as a `\uXXXX`
/// escape (UTF-16 surrogate pairs above the BMP), so output is plain ASCII.
pub struct AsciiPrettyFormatter<'a>(PrettyFormatter<'a>);
impl Default for AsciiPrettyFormatter<'_> {
    fn default() -> Self {
        Self(PrettyFormatter::new())
    }
}
impl Formatter for AsciiPrettyFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut units = [0; 2];
        for (start, c) in fragment.char_indices() {
            if c.is_ascii() {
                writer.write_all(&fragment.as_bytes()[start..start + 1])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Downloads the body of `url` into memory, reporting progress to `callback`.
/// Any status other than 200 is rejected before the body is read.
pub async fn download_to_buffer(
    url: &str,
    callback: Option<ProgressCallback>,
) -> Result<Vec<u8>, Error> {
    let item_name = get_file_name_from_url(url);
    let report = |progress: ItemProgress| {
        if let Some(cb) = callback {
            cb(item_name, progress);
        }
    };

    let response = reqwest::get(url).await.map_err(|source| Error::Request {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        warn!("{} responded with {}", url, status);
        report(ItemProgress::Failed);
        return Err(Error::Fetch {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let total_size = response.content_length().unwrap_or(0);
    report(ItemProgress::Downloading(0, total_size));

    let mut buffer = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(source) => {
                report(ItemProgress::Failed);
                return Err(Error::Request {
                    url: url.to_string(),
                    source,
                });
            }
        };
        buffer.extend_from_slice(&chunk);
        report(ItemProgress::Downloading(buffer.len() as u64, total_size));
    }

    report(ItemProgress::Completed(buffer.len() as u64));
    Ok(buffer)
}
