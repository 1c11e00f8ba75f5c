use std::{
    io::{Read as _, Write as _},
    net::TcpListener,
    path::Path,
    process::{Command, Output},
};

const EXAMPLE_MANIFEST: &str = r#"{"versions":{"0.7.0":{"url":"b"},"0.6.4":{"url":"a"}}}"#;

fn command(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_fusion-manifest"));
    command.args(args).env_remove("RUST_LOG");
    command
}

fn run(args: &[&str]) -> Output {
    command(args).output().unwrap()
}

fn write_source(dir: &Path) -> String {
    let source = dir.join("upstream.json");
    std::fs::write(&source, EXAMPLE_MANIFEST).unwrap();
    source.to_str().unwrap().to_string()
}

/// Answers one request on a background thread with an empty-bodied response.
fn serve_status_once(status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status_line
        );
        stream.write_all(response.as_bytes()).unwrap();
    });
    format!("http://{}/cli/manifest.json", addr)
}

#[test]
fn single_version_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let output = dir.path().join("share").join("fusion-manifest.json");
    let output_str = output.to_str().unwrap();

    let result = run(&["--url", &source, "--version", "0.6.4", "--output", output_str]);
    assert!(result.status.success());
    assert_eq!(
        String::from_utf8_lossy(&result.stdout),
        format!("Wrote manifest with 1 version(s) to {}\n", output_str)
    );

    let written = std::fs::read_to_string(&output).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value, serde_json::json!({"versions": {"0.6.4": {"url": "a"}}}));
}

#[test]
fn all_versions_are_written_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let output = dir.path().join("out.json");
    let output_str = output.to_str().unwrap();

    let result = run(&["--url", &source, "--output", output_str]);
    assert!(result.status.success());
    assert_eq!(
        String::from_utf8_lossy(&result.stdout),
        format!("Wrote manifest with 2 version(s) to {}\n", output_str)
    );

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.find("\"0.6.4\"").unwrap() < written.find("\"0.7.0\"").unwrap());
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    let source: serde_json::Value = serde_json::from_str(EXAMPLE_MANIFEST).unwrap();
    assert_eq!(value, source);
}

#[test]
fn missing_version_fails() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let output = dir.path().join("out.json");

    let result = run(&[
        "--url",
        &source,
        "--version",
        "9.9.9",
        "--output",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("9.9.9"));
    assert!(result.stdout.is_empty());
    assert!(!output.exists());
}

#[test]
fn server_error_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.json");
    let url = serve_status_once("500 Internal Server Error");

    let result = run(&["--url", &url, "--output", output.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("500"));
    assert!(!output.exists());
}

#[test]
fn malformed_source_fails() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.json");
    std::fs::write(&source, "not json").unwrap();
    let output = dir.path().join("out.json");

    let result = run(&[
        "--url",
        source.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn default_output_path_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());

    let result = command(&["--url", &source])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(result.status.success());
    assert_eq!(
        String::from_utf8_lossy(&result.stdout),
        "Wrote manifest with 2 version(s) to share/fusion-manifest.json\n"
    );

    let output = dir.path().join("share").join("fusion-manifest.json");
    let written = std::fs::read_to_string(output).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["versions"].as_object().unwrap().len(), 2);
}

#[cfg(unix)]
#[test]
fn output_path_is_normalized_in_status_line() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());

    let args: [&str; 6] = [
        "--url",
        &source,
        "--version",
        "0.7.0",
        "--output",
        "./cache//m.json",
    ];
    let result = command(&args)
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(result.status.success());
    assert_eq!(
        String::from_utf8_lossy(&result.stdout),
        "Wrote manifest with 1 version(s) to cache/m.json\n"
    );
    assert!(dir.path().join("cache").join("m.json").exists());
}
