//! In-memory archive extraction (jars, zips, tarballs).

use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Shared-library entries the game loads from the natives directory.
pub fn is_native_library(entry_name: &str) -> bool {
    let lower = entry_name.to_ascii_lowercase();
    lower.ends_with(".dll") || lower.ends_with(".so") || lower.ends_with(".dylib")
}

/// Extract the entries of a zip/jar whose name satisfies `filter` into
/// `dest_dir`. With `flatten` every file lands directly in `dest_dir`
/// (directory components dropped). Returns the written paths.
pub fn extract_matching<F>(
    zip_bytes: &[u8],
    dest_dir: &Path,
    flatten: bool,
    filter: F,
) -> Result<Vec<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let mut archive =
        zip::ZipArchive::new(Cursor::new(zip_bytes)).context("Failed to open archive")?;
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create {:?}", dest_dir))?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() || !filter(file.name()) {
            continue;
        }

        // Entries escaping the destination (`../`, absolute) are dropped
        let Some(relative) = file.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry: {}", file.name());
            continue;
        };

        let outpath = if flatten {
            match relative.file_name() {
                Some(name) => dest_dir.join(name),
                None => continue,
            }
        } else {
            dest_dir.join(&relative)
        };

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = std::fs::File::create(&outpath)
            .with_context(|| format!("Failed to create {:?}", outpath))?;
        std::io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }

        written.push(outpath);
    }

    Ok(written)
}

/// Extract a whole zip archive, preserving its directory structure.
pub fn extract_zip(zip_bytes: &[u8], dest_dir: &Path) -> Result<()> {
    log::debug!("Extracting zip to: {:?}", dest_dir);
    extract_matching(zip_bytes, dest_dir, false, |_| true)?;
    Ok(())
}

/// Extract a tar.gz archive
pub fn extract_tar_gz(data: &[u8], dest: &Path) -> Result<()> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    log::debug!("Extracting tar.gz to: {:?}", dest);
    std::fs::create_dir_all(dest)?;
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    archive
        .unpack(dest)
        .with_context(|| format!("Failed to unpack archive into {:?}", dest))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build an in-memory zip from `(name, bytes)` pairs.
    pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            for (name, data) in entries {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }
}
