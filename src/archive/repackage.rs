//! Canonical package archive

use eco_classifier::{GlobError, PackageFilter};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Errors building the canonical archive
#[derive(Debug, thiserror::Error)]
pub enum RepackError {
    #[error("Package directory not found: {0}")]
    MissingPackageDir(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid package directory name: {0}")]
    Filter(#[from] GlobError),
}

/// Rebuild `<source_root>/<package_dir>` as a canonical zip at `dest`.
///
/// The archive has the single top-level directory `<package_dir>/` and only
/// the entries the package filter accepts, so build byproducts such as
/// `elm-stuff/` and `docs.json` never reach it. Repackaging the same tree
/// twice yields byte-identical archives.
pub fn repackage(source_root: &Path, package_dir: &str, dest: &Path) -> Result<PathBuf, RepackError> {
    let package_root = source_root.join(package_dir);
    if !package_root.is_dir() {
        return Err(RepackError::MissingPackageDir(package_root));
    }
    let filter = PackageFilter::for_root(package_dir)?;

    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    let dir_options = file_options.unix_permissions(0o755);

    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
    zip.add_directory(format!("{}/", package_dir), dir_options)?;

    let walker = WalkDir::new(&package_root)
        .follow_links(false)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || accepts(&filter, package_dir, &package_root, entry)
        });

    let mut entries = 0usize;
    for entry in walker {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        let name = entry_name(package_dir, &package_root, entry.path());
        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(format!("{}/", name), dir_options)?;
        } else if file_type.is_file() {
            zip.start_file(name, file_options)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut zip)?;
            entries += 1;
        } else {
            tracing::warn!(path = %entry.path().display(), "skipping non-regular file");
        }
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    tracing::debug!(archive = %dest.display(), files = entries, "built canonical archive");
    Ok(dest.to_path_buf())
}

fn accepts(filter: &PackageFilter, package_dir: &str, package_root: &Path, entry: &walkdir::DirEntry) -> bool {
    let name = entry_name(package_dir, package_root, entry.path());
    if entry.file_type().is_dir() {
        filter.is_package_file(&name) || filter.is_package_file(&format!("{}/", name))
    } else {
        filter.is_package_file(&name)
    }
}

/// Archive name for a path under the package root, always `/`-separated.
fn entry_name(package_dir: &str, package_root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(package_root).unwrap_or(path);
    let mut name = package_dir.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}
