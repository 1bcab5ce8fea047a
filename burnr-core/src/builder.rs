//! Builds a hybrid disc image from a source directory with `hdiutil makehybrid`.
use crate::error::{Error, Result};
use crate::image::ImageArtifact;
use crate::layout::{SourceDir, StageDir};
use crate::profile::MediumKind;
use crate::runner::{CommandRunner, command_line};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Default volume label when the operator does not supply one.
pub const DEFAULT_LABEL: &str = "BD_BACKUP";

const IMAGE_EXTENSION: &str = "iso";

/// Filesystem layers for a medium.
///
/// DVD-class media get ISO9660 + Joliet. BDXL media additionally carry UDF,
/// which large-capacity drives and players expect.
pub fn format_flags(kind: MediumKind) -> &'static [&'static str] {
    match kind {
        MediumKind::Dvd => &["-iso", "-joliet"],
        MediumKind::Bdxl => &["-udf", "-iso", "-joliet"],
    }
}

/// `{stage}/{label}_{YYYYmmdd_HHMMSS}.iso`
pub fn image_path(stage: &Path, label: &str, now: DateTime<Local>) -> PathBuf {
    stage.join(format!(
        "{}_{}.{}",
        label,
        now.format("%Y%m%d_%H%M%S"),
        IMAGE_EXTENSION
    ))
}

fn check_label(label: &str) -> Result<()> {
    if label.trim().is_empty() || label.contains(['/', '\\']) || label == "." || label == ".." {
        return Err(Error::InvalidLabel(label.to_string()));
    }
    Ok(())
}

fn makehybrid_args(source: &Path, output: &Path, kind: MediumKind, label: &str) -> Vec<String> {
    let mut args = vec!["makehybrid".to_string()];
    args.extend(format_flags(kind).iter().map(|f| f.to_string()));
    args.extend(["-default-volume-name".to_string(), label.to_string()]);
    args.extend(["-joliet-volume-name".to_string(), label.to_string()]);
    if kind == MediumKind::Bdxl {
        args.extend(["-udf-volume-name".to_string(), label.to_string()]);
    }
    args.extend([
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
        source.to_string_lossy().into_owned(),
    ]);
    args
}

/// Resolves where the tool actually left the image.
///
/// `hdiutil` sometimes appends its own extension, producing `name.iso.iso`.
/// When the expected path is absent but that variant exists, it is renamed
/// into place.
fn normalize_output(expected: &Path) -> Result<PathBuf> {
    if expected.exists() {
        return Ok(expected.to_path_buf());
    }

    let mut doubled = expected.as_os_str().to_owned();
    doubled.push(".");
    doubled.push(IMAGE_EXTENSION);
    let doubled = PathBuf::from(doubled);

    if doubled.exists() {
        log::info!(
            "renaming {} to {}",
            doubled.display(),
            expected.display()
        );
        fs::rename(&doubled, expected).map_err(|e| Error::io(&doubled, e))?;
        return Ok(expected.to_path_buf());
    }

    Err(Error::ImageMissingAfterCreation(expected.to_path_buf()))
}

/// Creates an image of `source` inside `stage`, stamped with the current time.
///
/// The result exists and is non-empty, but is not yet known to be readable;
/// pass it to [`crate::validator::validate`] before burning.
pub fn build<R: CommandRunner + ?Sized>(
    runner: &R,
    source: &SourceDir,
    stage: &StageDir,
    kind: MediumKind,
    label: &str,
) -> Result<ImageArtifact> {
    build_at(runner, source, stage, kind, label, Local::now())
}

pub(crate) fn build_at<R: CommandRunner + ?Sized>(
    runner: &R,
    source: &SourceDir,
    stage: &StageDir,
    kind: MediumKind,
    label: &str,
    now: DateTime<Local>,
) -> Result<ImageArtifact> {
    check_label(label)?;
    let expected = image_path(&stage.path, label, now);
    let args = makehybrid_args(&source.path, &expected, kind, label);

    log::info!("creating {} image {}", kind, expected.display());
    let output = runner.run("hdiutil", &args).map_err(|e| {
        Error::ImageCreationFailed(format!("{}: {}", command_line("hdiutil", &args), e))
    })?;
    if !output.success {
        return Err(Error::ImageCreationFailed(output.diagnostic()));
    }

    let path = normalize_output(&expected)?;
    let size_bytes = fs::metadata(&path).map_err(|e| Error::io(&path, e))?.len();
    if size_bytes == 0 {
        return Err(Error::ImageEmpty(path));
    }

    Ok(ImageArtifact {
        path,
        size_bytes,
        validated: false,
    })
}
