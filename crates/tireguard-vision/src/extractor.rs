//! Fingerprint extractor implementations

use std::path::{Path, PathBuf};
use std::process::Command;

use tireguard_types::{Error, ExtractedIdentity, Result};

use crate::ai::prompts::build_fingerprint_prompt;
use crate::ai::response::parse_response;

/// Reads tire identity attributes from one photograph.
///
/// Implementations must be safe to call from several worker threads at once.
pub trait FingerprintExtractor: Send + Sync {
    fn extract(&self, photo: &Path) -> Result<ExtractedIdentity>;
}

/// Runs an external vision CLI once per photo.
///
/// The command line is split shell-style; `{image}` and `{prompt}` inside
/// any argument are replaced with the photo path and the extraction prompt.
/// If no argument mentions `{image}`, the path is appended.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
    prompt: String,
}

impl CommandExtractor {
    pub fn new(command_line: &str) -> Result<Self> {
        let mut words = shell_words::split(command_line)
            .map_err(|e| Error::InvalidInput(format!("extractor command: {}", e)))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| Error::InvalidInput("extractor command is empty".to_string()))?;

        Ok(Self {
            program,
            args: words.collect(),
            prompt: build_fingerprint_prompt(),
        })
    }

    /// Replace the default prompt
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    fn build_args(&self, photo: &Path) -> Vec<String> {
        let image = photo.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{image}", &image).replace("{prompt}", &self.prompt))
            .collect();
        if !self.args.iter().any(|a| a.contains("{image}")) {
            args.push(image.into_owned());
        }
        args
    }
}

impl FingerprintExtractor for CommandExtractor {
    fn extract(&self, photo: &Path) -> Result<ExtractedIdentity> {
        let output = Command::new(&self.program)
            .args(self.build_args(photo))
            .output()
            .map_err(|e| Error::ExtractionFailure(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let truncated: String = stderr.trim().chars().take(200).collect();
            return Err(Error::ExtractionFailure(format!(
                "{} exited with {}: {}",
                self.program, output.status, truncated
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(photo = %photo.display(), bytes = stdout.len(), "extractor responded");
        parse_response(&stdout)
    }
}

/// Reads `<photo>.json` written next to the photo by an upstream tool
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarExtractor;

impl SidecarExtractor {
    pub fn sidecar_path(photo: &Path) -> PathBuf {
        let mut name = photo.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }
}

impl FingerprintExtractor for SidecarExtractor {
    fn extract(&self, photo: &Path) -> Result<ExtractedIdentity> {
        let sidecar = Self::sidecar_path(photo);
        let content = std::fs::read_to_string(&sidecar).map_err(|e| {
            Error::ExtractionFailure(format!("no sidecar {}: {}", sidecar.display(), e))
        })?;
        parse_response(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_command_placeholders() {
        let extractor = CommandExtractor::new("vision-cli --json -p '{prompt}' --image {image}")
            .unwrap()
            .with_prompt("read it");
        let args = extractor.build_args(Path::new("/tmp/a b.jpg"));
        assert_eq!(args, vec!["--json", "-p", "read it", "--image", "/tmp/a b.jpg"]);
    }

    #[test]
    fn test_command_appends_image_without_placeholder() {
        let extractor = CommandExtractor::new("vision-cli").unwrap();
        assert_eq!(extractor.build_args(Path::new("x.jpg")), vec!["x.jpg"]);
    }

    #[test]
    fn test_command_rejects_bad_command_line() {
        assert!(CommandExtractor::new("").is_err());
        assert!(CommandExtractor::new("vision 'unterminated").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_parses_stdout() {
        let extractor =
            CommandExtractor::new(r#"sh -c 'echo "{\"brand\":\"MICHELIN\",\"model\":\"X MULTI\"}"' {image}"#)
                .unwrap();
        let identity = extractor.extract(Path::new("tire.jpg")).unwrap();
        assert_eq!(identity.brand.as_deref(), Some("MICHELIN"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_is_extraction_failure() {
        let extractor = CommandExtractor::new("false").unwrap();
        let result = extractor.extract(Path::new("tire.jpg"));
        assert!(matches!(result, Err(Error::ExtractionFailure(_))));
    }

    #[test]
    fn test_sidecar_extractor() {
        let dir = tempdir().unwrap();
        let photo = dir.path().join("1.jpg");
        fs::write(&photo, b"not really a jpeg").unwrap();
        fs::write(
            dir.path().join("1.jpg.json"),
            r#"{"brand":"BRIDGESTONE","model":"M726","treadDepthMm":"11mm"}"#,
        )
        .unwrap();

        let identity = SidecarExtractor.extract(&photo).unwrap();
        assert_eq!(identity.model.as_deref(), Some("M726"));
        assert_eq!(identity.tread_depth_mm, Some(11.0));

        let missing = SidecarExtractor.extract(&dir.path().join("2.jpg"));
        assert!(matches!(missing, Err(Error::ExtractionFailure(_))));
    }
}
