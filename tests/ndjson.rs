/// Integration tests for stream mode over NDJSON and concatenated JSON.
use std::io::Write;
use std::process::{Command, Stdio};

fn jpick_stdin(args: &[&str], input: &str) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_jpick"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            child
                .stdin
                .take()
                .unwrap()
                .write_all(input.as_bytes())
                .unwrap();
            child.wait_with_output()
        })
        .expect("failed to run jpick");

    assert!(
        output.status.success(),
        "jpick {:?} exited with {}: stderr={}",
        args,
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("jpick output was not valid UTF-8")
}

fn jpick_file(args: &[&str], content: &str) -> String {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.jsonl");
    std::fs::write(&path, content).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_jpick"))
        .args(args)
        .arg(&path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to run jpick");

    assert!(
        output.status.success(),
        "jpick {:?} {} exited with {}: stderr={}",
        args,
        path.display(),
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("jpick output was not valid UTF-8")
}

#[test]
fn ndjson_lines() {
    let input = "{\"id\":1,\"name\":\"a\"}\n{\"id\":2,\"name\":\"b\"}\n{\"id\":3,\"name\":\"c\"}\n";
    assert_eq!(jpick_stdin(&["-s", ".id"], input), "1\n2\n3\n");
    assert_eq!(jpick_stdin(&["-s", "-r", ".name"], input), "a\nb\nc\n");
}

#[test]
fn crlf_and_blank_lines() {
    let input = "{\"v\":1}\r\n\r\n\n{\"v\":2}\r\n";
    assert_eq!(jpick_stdin(&["-s", ".v"], input), "1\n2\n");
}

#[test]
fn values_without_whitespace() {
    assert_eq!(jpick_stdin(&["-s", ".v"], r#"{"v":1}{"v":2}[3]"#), "1\n2\n");
    assert_eq!(jpick_stdin(&["-s", "[0]"], "[1][2] [3]"), "1\n2\n3\n");
}

#[test]
fn scalars_in_stream() {
    assert_eq!(jpick_stdin(&["-s", ""], "1 \"two\" true null [3]"), "1\n\"two\"\ntrue\nnull\n[3]\n");
    // A deeper selector skips scalars without complaint.
    assert_eq!(jpick_stdin(&["-s", ".a"], "1 {\"a\":2} \"x\""), "2\n");
}

#[test]
fn missing_keys_are_skipped() {
    let input = "{\"a\":1}\n{\"b\":2}\n{\"a\":3,\"b\":4}\n";
    assert_eq!(jpick_stdin(&["-s", ".a"], input), "1\n3\n");
    assert_eq!(jpick_stdin(&["-s", "{.b,.a}"], input), "1\n2\n3\n4\n");
}

#[test]
fn large_file() {
    let mut input = String::new();
    for i in 0..20_000 {
        input.push_str(&format!(
            "{{\"id\":{i},\"payload\":{{\"blob\":\"{}\",\"list\":[1,2,3]}},\"tag\":\"t{i}\"}}\n",
            "x".repeat(i % 50)
        ));
    }
    let out = jpick_file(&["-s", "-r", ".tag"], &input);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 20_000);
    assert_eq!(lines[0], "t0");
    assert_eq!(lines[19_999], "t19999");
}

#[test]
fn nested_wildcards_across_lines() {
    let input = "{\"xs\":[{\"k\":1},{\"k\":2}]}\n{\"xs\":[]}\n{\"xs\":[{\"k\":3}]}\n";
    assert_eq!(jpick_file(&["-s", ".xs[*].k"], input), "1\n2\n3\n");
}
