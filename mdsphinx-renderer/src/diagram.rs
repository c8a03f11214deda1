//! Mermaid diagrams rendered through the `minlag/mermaid-cli` container.
//!
//! The container only sees a scratch directory mounted at `/data`; input and
//! output are staged there and the produced image is copied to its final
//! destination afterwards.

use std::path::{Path, PathBuf};

use mdsphinx_core::{Invocation, ProcessRunner};

use crate::error::{diagram_io, DiagramError};

pub const MERMAID_IMAGE: &str = "minlag/mermaid-cli";
pub const OUTPUT_EXTENSIONS: &[&str] = &["svg", "png", "pdf"];

/// Diagram source: inline mermaid text or a `.mmd` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramInput {
    Inline(String),
    File(PathBuf),
}

/// Renderer flags passed through to mermaid-cli.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramOptions {
    pub theme: String,
    pub scale: u32,
    pub width: u32,
    pub height: Option<u32>,
    pub background_color: String,
}

impl Default for DiagramOptions {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            scale: 3,
            width: 800,
            height: None,
            background_color: "white".to_string(),
        }
    }
}

/// Render `input` to the image `out`.
///
/// The extension of `out` picks the format. An existing `out` is never
/// overwritten.
pub fn render_diagram(
    runner: &dyn ProcessRunner,
    input: &DiagramInput,
    out: &Path,
    opts: &DiagramOptions,
) -> Result<(), DiagramError> {
    let out_name = out
        .file_name()
        .ok_or_else(|| DiagramError::UnsupportedOutput { path: out.to_path_buf() })?;

    let ext = out
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(DiagramError::UnsupportedOutput { path: out.to_path_buf() });
    }
    if out.exists() {
        return Err(DiagramError::OutputExists { path: out.to_path_buf() });
    }

    let scratch = tempfile::TempDir::new().map_err(|e| diagram_io(std::env::temp_dir(), e))?;
    let tmp_out = scratch.path().join(out_name);

    let tmp_inp = match input {
        DiagramInput::Inline(text) => {
            let path = scratch.path().join(Path::new(out_name).with_extension("mmd"));
            std::fs::write(&path, text).map_err(|e| diagram_io(&path, e))?;
            path
        }
        DiagramInput::File(src) => {
            if !src.is_file() {
                return Err(DiagramError::InputNotFound { path: src.clone() });
            }
            let is_mmd = src
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("mmd"));
            if !is_mmd {
                return Err(DiagramError::UnsupportedInput { path: src.clone() });
            }
            let name = src
                .file_name()
                .ok_or_else(|| DiagramError::UnsupportedInput { path: src.clone() })?;
            let path = scratch.path().join(name);
            std::fs::copy(src, &path).map_err(|e| diagram_io(src, e))?;
            path
        }
    };

    let invocation = mermaid_invocation(scratch.path(), &tmp_inp, &tmp_out, opts);
    tracing::info!(action = "mermaid", out = %out.display());
    runner.run(&invocation)?;

    if !tmp_out.is_file() {
        return Err(DiagramError::ImageNotFound { path: tmp_out });
    }
    std::fs::copy(&tmp_out, out).map_err(|e| diagram_io(out, e))?;
    Ok(())
}

/// `docker run --rm -v <scratch>:/data minlag/mermaid-cli …`, with input and
/// output named relative to the mount.
pub fn mermaid_invocation(
    scratch: &Path,
    inp: &Path,
    out: &Path,
    opts: &DiagramOptions,
) -> Invocation {
    let file_name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let mut invocation = Invocation::new("docker")
        .args(["run", "--rm", "-v"])
        .arg(format!("{}:/data", scratch.display()))
        .arg(MERMAID_IMAGE)
        .arg("-t")
        .arg(&opts.theme)
        .arg("-b")
        .arg(&opts.background_color)
        .arg("-s")
        .arg(opts.scale.to_string())
        .arg("-w")
        .arg(opts.width.to_string());
    if let Some(height) = opts.height {
        invocation = invocation.arg("-H").arg(height.to_string());
    }
    invocation
        .arg("-i")
        .arg(file_name(inp))
        .arg("-o")
        .arg(file_name(out))
        .current_dir(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdsphinx_core::ProcessError;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes the requested `-o` file into the mounted scratch directory.
    #[derive(Default)]
    struct FakeMermaid {
        calls: Mutex<Vec<Vec<String>>>,
        produce: bool,
    }

    impl ProcessRunner for FakeMermaid {
        fn run(&self, invocation: &Invocation) -> Result<(), ProcessError> {
            let argv = invocation.argv();
            self.calls.lock().unwrap().push(argv.clone());
            if self.produce {
                let mount = argv[4].trim_end_matches(":/data");
                let out = argv.iter().position(|a| a == "-o").unwrap() + 1;
                std::fs::write(Path::new(mount).join(&argv[out]), b"IMG").unwrap();
            }
            Ok(())
        }
    }

    #[test]
    fn invocation_matches_container_contract() {
        let opts = DiagramOptions {
            height: Some(600),
            ..DiagramOptions::default()
        };
        let inv = mermaid_invocation(Path::new("/s"), Path::new("/s/a.mmd"), Path::new("/s/a.png"), &opts);
        assert_eq!(
            inv.argv(),
            vec![
                "docker", "run", "--rm", "-v", "/s:/data", "minlag/mermaid-cli", "-t", "default",
                "-b", "white", "-s", "3", "-w", "800", "-H", "600", "-i", "a.mmd", "-o", "a.png",
            ]
        );
        assert_eq!(inv.cwd.as_deref(), Some(Path::new("/s")));
    }

    #[test]
    fn inline_diagram_is_copied_to_destination() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("flow.svg");
        let runner = FakeMermaid { produce: true, ..Default::default() };

        render_diagram(&runner, &DiagramInput::Inline("graph TD; A-->B".into()), &out, &DiagramOptions::default())
            .expect("render");

        assert_eq!(std::fs::read(&out).unwrap(), b"IMG");
        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].ends_with(&["-i".into(), "flow.mmd".into(), "-o".into(), "flow.svg".into()]));
    }

    #[test]
    fn rejects_bad_extensions_and_existing_output() {
        let tmp = TempDir::new().unwrap();
        let runner = FakeMermaid::default();
        let inline = DiagramInput::Inline("graph TD".into());
        let opts = DiagramOptions::default();

        let err = render_diagram(&runner, &inline, &tmp.path().join("a.gif"), &opts).unwrap_err();
        assert!(matches!(err, DiagramError::UnsupportedOutput { .. }), "got: {err}");

        let existing = tmp.path().join("a.png");
        std::fs::write(&existing, b"old").unwrap();
        let err = render_diagram(&runner, &inline, &existing, &opts).unwrap_err();
        assert!(matches!(err, DiagramError::OutputExists { .. }), "got: {err}");

        let txt = tmp.path().join("a.txt");
        std::fs::write(&txt, "graph TD").unwrap();
        let err = render_diagram(&runner, &DiagramInput::File(txt), &tmp.path().join("b.png"), &opts)
            .unwrap_err();
        assert!(matches!(err, DiagramError::UnsupportedInput { .. }), "got: {err}");

        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_image_after_success_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.mmd");
        std::fs::write(&src, "graph TD").unwrap();
        let runner = FakeMermaid::default();

        let err = render_diagram(&runner, &DiagramInput::File(src), &tmp.path().join("a.pdf"), &DiagramOptions::default())
            .unwrap_err();
        assert!(matches!(err, DiagramError::ImageNotFound { .. }), "got: {err}");
        assert!(!tmp.path().join("a.pdf").exists());
    }
}
