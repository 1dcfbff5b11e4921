//! gif2webp integration tests.
//!
//! Most tests run against stub shell scripts standing in for the real
//! binary, so they only exercise argument building and process plumbing.
//! The end-to-end test runs when a real gif2webp is on `PATH`.

#![cfg(unix)]

use std::fs;
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use serial_test::serial;
use tempfile::TempDir;
use webpbin_av::{
    Animation, AnimationFrame, Error, Gif2WebP, Tool, ToolConfig, ToolRegistry, ToolsConfig,
};

// ===== Fixtures =====

fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A gif2webp stand-in that records its arguments in `args.txt`, echoes
/// piped input back when writing to stdout, and otherwise writes a small
/// RIFF payload to the `-o` target.
fn recording_stub(dir: &Path) -> ToolConfig {
    let body = format!(
        r#"if [ "$1" = "-version" ]; then
  printf 'WebP Encoder version: 1.2.0\nWebP Mux version: 1.2.0\n'
  exit 0
fi
printf '%s\n' "$@" > "{dir}/args.txt"
out=""
prev=""
stdin=0
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  if [ "$prev" = "--" ] && [ "$a" = "-" ]; then stdin=1; fi
  prev="$a"
done
if [ "$out" = "-" ]; then
  if [ $stdin = 1 ]; then cat; else printf 'RIFFstub'; fi
else
  if [ $stdin = 1 ]; then cat > "{dir}/stdin.bin"; fi
  printf 'RIFFstub' > "$out"
fi
"#,
        dir = dir.display()
    );
    ToolConfig::new(Tool::Gif2WebP, write_stub(dir, "gif2webp", &body))
}

fn failing_stub(dir: &Path) -> ToolConfig {
    let body = "cat > /dev/null\necho 'bad input' >&2\nexit 1\n";
    ToolConfig::new(Tool::Gif2WebP, write_stub(dir, "gif2webp-fail", body))
}

fn recorded_args(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("args.txt"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn two_frame_animation() -> Animation {
    let mut animation = Animation::new(1, 1);
    animation
        .push(AnimationFrame::new(
            RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255])),
            Duration::from_millis(100),
        ))
        .push(AnimationFrame::new(
            RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])),
            Duration::from_millis(100),
        ));
    animation
}

// ===== Stubbed binary =====

#[test]
#[serial]
fn version_returns_tool_output() {
    let dir = TempDir::new().unwrap();
    let g = Gif2WebP::with_tool(recording_stub(dir.path()));
    assert_eq!(
        g.version().unwrap(),
        "WebP Encoder version: 1.2.0WebP Mux version: 1.2.0"
    );
}

#[test]
#[serial]
fn registry_version_uses_configured_path() {
    let dir = TempDir::new().unwrap();
    let stub = recording_stub(dir.path());
    let config = ToolsConfig {
        gif2webp_path: Some(stub.path.clone()),
        ..Default::default()
    };
    let registry = ToolRegistry::discover(&config);
    assert_eq!(
        webpbin_av::version(&registry, Tool::Gif2WebP).unwrap(),
        "WebP Encoder version: 1.2.0WebP Mux version: 1.2.0"
    );
}

#[test]
#[serial]
fn animation_is_piped_as_gif() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.webp");
    let animation = two_frame_animation();

    Gif2WebP::with_tool(recording_stub(dir.path()))
        .input_animation(&animation)
        .quality(100)
        .output_file(&out)
        .run()
        .unwrap();

    assert_eq!(
        recorded_args(dir.path()),
        [
            "-min_size",
            "-mt",
            "-q",
            "100",
            "-o",
            out.to_str().unwrap(),
            "--",
            "-"
        ]
    );
    let piped = fs::read(dir.path().join("stdin.bin")).unwrap();
    assert!(piped.starts_with(b"GIF89a"));
    assert!(fs::metadata(&out).unwrap().len() > 0);
}

#[test]
#[serial]
fn file_input_is_passed_as_argument() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.gif");
    fs::write(&input, webpbin_av::encode_gif(&two_frame_animation()).unwrap()).unwrap();
    let mut webp = Vec::new();

    Gif2WebP::with_tool(recording_stub(dir.path()))
        .input_file(&input)
        .output_writer(&mut webp)
        .run()
        .unwrap();

    assert_eq!(webp, b"RIFFstub");
    assert_eq!(
        recorded_args(dir.path()),
        ["-min_size", "-mt", "-o", "-", input.to_str().unwrap()]
    );
}

#[test]
#[serial]
fn job_runs_with_its_reported_arguments() {
    let dir = TempDir::new().unwrap();
    let animation = two_frame_animation();
    let out = dir.path().join("out.webp");

    let job = Gif2WebP::with_tool(recording_stub(dir.path()))
        .quality(42)
        .input_animation(&animation)
        .output_file(&out)
        .build()
        .unwrap();
    let expected: Vec<String> = job
        .arguments()
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    job.run().unwrap();

    assert_eq!(recorded_args(dir.path()), expected);
}

#[test]
#[serial]
fn stream_input_to_stream_output() {
    let dir = TempDir::new().unwrap();
    let payload = vec![7u8; 512 * 1024];
    let mut echoed = Vec::new();

    Gif2WebP::with_tool(recording_stub(dir.path()))
        .input_reader(Cursor::new(payload.clone()))
        .output_writer(&mut echoed)
        .run()
        .unwrap();

    assert_eq!(echoed.len(), payload.len());
    assert_eq!(
        recorded_args(dir.path()),
        ["-min_size", "-mt", "-o", "-", "--", "-"]
    );
}

#[test]
#[serial]
fn failure_joins_exit_status_and_stderr() {
    let dir = TempDir::new().unwrap();
    let animation = two_frame_animation();

    let err = Gif2WebP::with_tool(failing_stub(dir.path()))
        .input_animation(&animation)
        .output_file(dir.path().join("out.webp"))
        .run()
        .unwrap_err();

    match err {
        Error::ToolFailed { tool, message } => {
            assert_eq!(tool, "gif2webp");
            assert!(message.contains("exit status: 1. bad input"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
#[serial]
fn builder_is_reusable_after_failure() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("second.webp");

    let mut g = Gif2WebP::with_tool(failing_stub(dir.path()));
    g.quality(50).input_file("missing.gif").output_file("nowhere.webp");
    assert!(g.run().is_err());
    assert!(matches!(g.run(), Err(Error::UndefinedInput)));

    let mut g = Gif2WebP::with_tool(recording_stub(dir.path()));
    g.input_file("in.gif").output_file(&out).run().unwrap();
    g.reset().input_file("again.gif").output_file(&out).run().unwrap();
    assert_eq!(
        recorded_args(dir.path()),
        ["-min_size", "-mt", "-o", out.to_str().unwrap(), "again.gif"]
    );
}

#[test]
#[serial]
fn unexecutable_binary_is_a_spawn_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gif2webp");
    fs::write(&path, "not a program").unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o644);
    fs::set_permissions(&path, perms).unwrap();

    let err = Gif2WebP::with_tool(ToolConfig::new(Tool::Gif2WebP, &path))
        .input_file("in.gif")
        .output_file("out.webp")
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }), "unexpected error: {err}");
}

#[test]
#[serial]
fn jobs_run_concurrently() {
    let dir = TempDir::new().unwrap();
    let tool = recording_stub(dir.path());

    std::thread::scope(|s| {
        let handles: Vec<_> = (0u8..4)
            .map(|i| {
                let tool = tool.clone();
                s.spawn(move || {
                    let payload = vec![i; 64 * 1024];
                    let mut echoed = Vec::new();
                    Gif2WebP::with_tool(tool)
                        .input_reader(Cursor::new(payload.clone()))
                        .output_writer(&mut echoed)
                        .run()
                        .unwrap();
                    echoed == payload
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    });
}

// ===== Real binary =====

#[test]
#[serial]
fn end_to_end_with_real_gif2webp() {
    let registry = ToolRegistry::discover(&ToolsConfig::default());
    if !registry.contains(Tool::Gif2WebP) {
        eprintln!("gif2webp not installed, skipping");
        return;
    }

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("test2.webp");
    let animation = two_frame_animation();

    Gif2WebP::new(&registry)
        .unwrap()
        .input_animation(&animation)
        .quality(100)
        .output_file(&out)
        .run()
        .unwrap();

    let bytes = fs::read(&out).unwrap();
    assert!(!bytes.is_empty());
    assert!(bytes.starts_with(b"RIFF"));
}
