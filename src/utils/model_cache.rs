//! Local cache for downloaded model weights.

use crate::core::errors::{LayoutError, LayoutResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Suffix of the partial file written while a download is in flight.
const PARTIAL_SUFFIX: &str = ".download";

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Makes sure a weight file exists at `path`, downloading it when allowed.
///
/// Returns the path when the file is present afterwards. A missing file with
/// no URL, downloads disabled, or a failed download yields
/// [`LayoutError::ModelUnavailable`].
pub fn ensure_model(
    model_name: &str,
    path: &Path,
    url: Option<&str>,
    allow_download: bool,
) -> LayoutResult<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let Some(url) = url else {
        return Err(LayoutError::model_unavailable(
            model_name,
            format!("{} is missing and no download URL is configured", path.display()),
        ));
    };
    if !allow_download {
        return Err(LayoutError::model_unavailable(
            model_name,
            format!("{} is missing and downloads are disabled", path.display()),
        ));
    }

    download_to(url, path).map_err(|e| {
        warn!(model = model_name, url, error = %e, "Model download failed");
        LayoutError::model_unavailable(model_name, e.to_string())
    })?;
    Ok(path.to_path_buf())
}

/// Fetches `url` into `path`.
///
/// The body is written to `<path>.download` first and renamed into place once
/// complete, so `path` never holds a truncated file.
pub fn download_to(url: &str, path: &Path) -> LayoutResult<()> {
    let download_error = |source: Box<dyn std::error::Error + Send + Sync>| LayoutError::Download {
        url: url.to_string(),
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    info!(url, path = %path.display(), "Downloading model weights");
    let bytes = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(|e| download_error(Box::new(e)))?;

    let partial = partial_path(path);
    let written = fs::File::create(&partial)
        .and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&partial, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(download_error(Box::new(e)));
    }

    info!(bytes = bytes.len(), path = %path.display(), "Model weights cached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    /// Serves a single HTTP response on a loopback port and returns its URL.
    fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).is_ok() {
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    line.clear();
                }
                let header = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(body);
            }
        });
        format!("http://{addr}/east.onnx")
    }

    #[test]
    fn test_existing_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("east.onnx");
        fs::write(&path, b"weights").unwrap();
        assert_eq!(ensure_model("east", &path, None, false).unwrap(), path);
    }

    #[test]
    fn test_missing_without_url_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_model("east", &dir.path().join("east.onnx"), None, true).unwrap_err();
        assert!(err.is_model_unavailable());
    }

    #[test]
    fn test_download_disabled_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_model(
            "east",
            &dir.path().join("east.onnx"),
            Some("http://127.0.0.1:9/east.onnx"),
            false,
        )
        .unwrap_err();
        assert!(err.is_model_unavailable());
    }

    #[test]
    fn test_download_writes_atomically() {
        let url = serve_once("200 OK", b"onnx-bytes");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("east.onnx");
        ensure_model("east", &path, Some(&url), true).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"onnx-bytes");
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_http_error_leaves_no_file() {
        let url = serve_once("404 Not Found", b"");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("east.onnx");
        let err = ensure_model("east", &path, Some(&url), true).unwrap_err();
        assert!(err.is_model_unavailable());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }
}
