//! Bundle stage: package input paths into a single archive.
//!
//! A single input that is already an archive or compressed file is adopted
//! as-is and packaging is skipped entirely. Otherwise every input (plus the
//! site README and the dataset's machine-readable descriptor, fetched from
//! the site host) is packaged under one archive whose extension is chosen by
//! total uncompressed size.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{DatacatError, Result};

/// Inputs at least this large are packaged with the higher-compression
/// format (500 MiB, inclusive).
pub const ARCHIVE_SIZE_THRESHOLD: u64 = 524_288_000;

/// Extensions recognized as already-packaged input, longest first.
const RECOGNIZED_EXTENSIONS: &[&str] =
    &["tar.bz2", "tar.gz", "tbz2", "tgz", "tar", "zip", "gz", "bz2"];

/// Formats able to hold more than one member.
const MULTI_MEMBER_EXTENSIONS: &[&str] = &["tar.bz2", "tar.gz", "tbz2", "tgz", "tar", "zip"];

/// The recognized archive extension of `path`, if any.
pub fn archive_extension(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    RECOGNIZED_EXTENSIONS
        .iter()
        .copied()
        .find(|ext| name.ends_with(&format!(".{}", ext)))
}

/// `tar.bz2` above the size threshold, `tar.gz` at or below it.
pub fn extension_for_size(total_size: u64) -> &'static str {
    if total_size >= ARCHIVE_SIZE_THRESHOLD {
        "tar.bz2"
    } else {
        "tar.gz"
    }
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Depth-first listing of all files under `paths`, directory children in
/// sorted order so inference is deterministic.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    fn walk(path: &Path, files: &mut Vec<PathBuf>) {
        if path.is_dir() {
            if let Ok(entries) = fs::read_dir(path) {
                let mut children: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
                children.sort();
                for child in children {
                    walk(&child, files);
                }
            }
        } else {
            files.push(path.to_path_buf());
        }
    }
    let mut files = Vec::new();
    for path in paths {
        walk(path, &mut files);
    }
    files
}

/// The most frequently occurring file extension among the inputs, ties
/// broken by first-seen order.
pub fn most_common_data_format(paths: &[PathBuf]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for file in collect_files(paths) {
        let Some(ext) = file.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        match counts.iter_mut().find(|(seen, _)| *seen == ext) {
            Some((_, count)) => *count += 1,
            None => counts.push((ext, 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (ext, count) in counts {
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((ext, count)),
        }
    }
    best.map(|(ext, _)| ext)
}

pub struct Bundler<'a> {
    config: &'a Config,
    dataset: String,
    paths: Vec<String>,
    fmt: Option<String>,
    archive: Option<PathBuf>,
    skip_packaging: bool,
}

impl<'a> Bundler<'a> {
    pub fn new(
        config: &'a Config,
        dataset: &str,
        paths: Vec<String>,
        fmt: Option<String>,
        archive: Option<PathBuf>,
    ) -> Result<Self> {
        if paths.is_empty() {
            return Err(DatacatError::Packaging(
                "Must provide at least one path to upload.".to_string(),
            ));
        }
        for path in &paths {
            if !is_remote(path) && !Path::new(path).exists() {
                return Err(DatacatError::Packaging(format!("Invalid path, {}", path)));
            }
        }

        let mut bundler = Self {
            config,
            dataset: dataset.to_string(),
            paths,
            fmt,
            archive: None,
            skip_packaging: false,
        };

        if bundler.paths.len() == 1 && !is_remote(&bundler.paths[0]) {
            let single = PathBuf::from(&bundler.paths[0]);
            if archive_extension(&single).is_some() {
                bundler.archive = Some(single);
                bundler.skip_packaging = true;
            }
        }

        if let Some(explicit) = archive {
            bundler.set_archive(explicit)?;
        }

        Ok(bundler)
    }

    fn set_archive(&mut self, path: PathBuf) -> Result<()> {
        let Some(ext) = archive_extension(&path) else {
            return Err(DatacatError::Packaging(format!(
                "Invalid path {}, not an archive or compressed file",
                path.display()
            )));
        };
        if self.paths.len() > 1 && !MULTI_MEMBER_EXTENSIONS.contains(&ext) {
            return Err(DatacatError::Packaging(
                "Multiple local paths must be packaged in an archive, not a compressed file."
                    .to_string(),
            ));
        }
        self.archive = Some(path);
        Ok(())
    }

    /// Packaging is elided when the single input was already an archive.
    pub fn skip_packaging(&self) -> bool {
        self.skip_packaging
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    fn local_paths(&self) -> Vec<PathBuf> {
        self.paths
            .iter()
            .filter(|p| !is_remote(p))
            .map(PathBuf::from)
            .collect()
    }

    /// Total uncompressed size of the local inputs.
    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0u64;
        for file in collect_files(&self.local_paths()) {
            total += fs::metadata(&file)?.len();
        }
        Ok(total)
    }

    /// The declared data format, inferred from the inputs when absent.
    pub fn fmt(&mut self) -> String {
        match &self.fmt {
            Some(fmt) => fmt.clone(),
            None => {
                let inferred = most_common_data_format(&self.local_paths())
                    .unwrap_or_else(|| "data".to_string());
                self.fmt = Some(inferred.clone());
                inferred
            }
        }
    }

    /// The archive path, synthesized on first use when not supplied:
    /// `datacat_<dataset>-<timestamp>.<ext>` in the working directory.
    pub fn archive_path(&mut self) -> Result<PathBuf> {
        match &self.archive {
            Some(path) => Ok(path.clone()),
            None => {
                let extension = extension_for_size(self.total_size()?);
                let timestamp = chrono::Local::now().format(&self.config.timestamp_format);
                let path = PathBuf::from(format!(
                    "datacat_{}-{}.{}",
                    self.dataset, timestamp, extension
                ));
                self.archive = Some(path.clone());
                Ok(path)
            }
        }
    }

    /// The archive's package format label (its recognized extension).
    pub fn pkg_fmt(&mut self) -> Result<String> {
        let path = self.archive_path()?;
        archive_extension(&path)
            .map(String::from)
            .ok_or_else(|| {
                DatacatError::Packaging(format!(
                    "Invalid path {}, not an archive or compressed file",
                    path.display()
                ))
            })
    }

    /// On-disk size of the finished archive.
    pub fn size(&mut self) -> Result<u64> {
        let path = self.archive_path()?;
        Ok(fs::metadata(&path)?.len())
    }

    /// Summary statistics over the input resources, reported to the catalog
    /// at notification time.
    pub fn summary(&self) -> Result<Value> {
        let files = collect_files(&self.local_paths());
        let mut formats = serde_json::Map::new();
        for file in &files {
            if let Some(ext) = file.extension().and_then(|e| e.to_str()) {
                let entry = formats
                    .entry(ext.to_ascii_lowercase())
                    .or_insert_with(|| json!(0));
                if let Some(count) = entry.as_u64() {
                    *entry = json!(count + 1);
                }
            }
        }
        Ok(json!({
            "file_count": files.len(),
            "total_size": self.total_size()?,
            "formats": Value::Object(formats),
        }))
    }

    /// Build the archive unless packaging was elided.
    ///
    /// Remote inputs and the two companion resources are fetched into a
    /// staging directory first. An input that cannot be fetched fails
    /// packaging; the companions are best-effort. The staging directory is
    /// removed only when packaging succeeds, and named in the error
    /// otherwise.
    pub async fn bundle(&mut self) -> Result<()> {
        if self.skip_packaging {
            debug!("Input is already an archive, skipping packaging");
            return Ok(());
        }
        let archive = self.archive_path()?;

        let staging = tempfile::Builder::new()
            .prefix("datacat-bundle-")
            .tempdir()?
            .keep();

        let mut staged = Vec::new();
        for path in self.paths.clone() {
            if is_remote(&path) {
                match self.fetch_into(&path, &staging).await {
                    Some(fetched) => staged.push(fetched),
                    None => {
                        return Err(DatacatError::Packaging(format!(
                            "Unable to fetch {} for packaging. Temporary files left in {}",
                            path,
                            staging.display()
                        )));
                    }
                }
            }
        }
        for url in [
            self.config.site_url("/README-datacat"),
            self.config
                .site_url(&format!("datasets/{}.yaml", self.dataset)),
        ] {
            if let Some(fetched) = self.fetch_into(&url, &staging).await {
                staged.push(fetched);
            }
        }

        let mut entries = self.local_paths();
        entries.extend(staged);

        info!("Packaging {} entries into {}", entries.len(), archive.display());
        if let Err(err) = self.write_archive(&archive, &entries) {
            return Err(DatacatError::Packaging(format!(
                "Unable to package files for upload ({}). Temporary files left in {}",
                err,
                staging.display()
            )));
        }

        fs::remove_dir_all(&staging)?;
        Ok(())
    }

    async fn fetch_into(&self, url: &str, staging: &Path) -> Option<PathBuf> {
        let basename = url
            .rsplit('/')
            .next()
            .map(|name| name.split('?').next().unwrap_or(name))
            .filter(|name| !name.is_empty())?;
        let target = staging.join(basename);
        match reqwest::get(url).await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(bytes) => {
                    if let Err(err) = fs::write(&target, &bytes) {
                        warn!("Could not stage {}: {}", url, err);
                        return None;
                    }
                    Some(target)
                }
                Err(err) => {
                    warn!("Could not read {}: {}", url, err);
                    None
                }
            },
            Ok(response) => {
                warn!("Could not fetch {}: HTTP {}", url, response.status());
                None
            }
            Err(err) => {
                warn!("Could not fetch {}: {}", url, err);
                None
            }
        }
    }

    fn write_archive(&self, archive: &Path, entries: &[PathBuf]) -> std::io::Result<()> {
        let root = archive
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| match archive_extension(archive) {
                Some(ext) => name.trim_end_matches(&format!(".{}", ext)).to_string(),
                None => name.to_string(),
            })
            .unwrap_or_else(|| format!("datacat_{}", self.dataset));

        let file = fs::File::create(archive)?;
        match archive_extension(archive) {
            Some("tar.bz2") | Some("tbz2") => {
                let encoder = BzEncoder::new(file, bzip2::Compression::best());
                Self::append_entries(tar::Builder::new(encoder), &root, entries)?.finish()?;
            }
            _ => {
                let encoder = GzEncoder::new(file, flate2::Compression::default());
                Self::append_entries(tar::Builder::new(encoder), &root, entries)?.finish()?;
            }
        }
        Ok(())
    }

    fn append_entries<W: Write>(
        mut builder: tar::Builder<W>,
        root: &str,
        entries: &[PathBuf],
    ) -> std::io::Result<W> {
        for path in entries {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("entry");
            let target = format!("{}/{}", root, name);
            if path.is_dir() {
                builder.append_dir_all(&target, path)?;
            } else {
                builder.append_path_with_name(path, &target)?;
            }
        }
        builder.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Config {
        Config {
            // Unroutable so companion fetches fail fast in tests
            site_host: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        }
    }

    fn touch(dir: &Path, name: &str, contents: &[u8]) -> String {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn extension_threshold_is_inclusive_of_large() {
        assert_eq!(extension_for_size(ARCHIVE_SIZE_THRESHOLD), "tar.bz2");
        assert_eq!(extension_for_size(ARCHIVE_SIZE_THRESHOLD - 1), "tar.gz");
        assert_eq!(extension_for_size(0), "tar.gz");
    }

    #[test]
    fn recognizes_compound_extensions_first() {
        assert_eq!(archive_extension(Path::new("a.tar.gz")), Some("tar.gz"));
        assert_eq!(archive_extension(Path::new("a.tar.bz2")), Some("tar.bz2"));
        assert_eq!(archive_extension(Path::new("a.gz")), Some("gz"));
        assert_eq!(archive_extension(Path::new("a.csv")), None);
    }

    #[test]
    fn single_archive_input_elides_packaging() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let input = touch(dir.path(), "already.tar.gz", b"pretend archive");
        let mut bundler =
            Bundler::new(&config, "monkeys", vec![input.clone()], None, None).unwrap();
        assert!(bundler.skip_packaging());
        assert_eq!(bundler.archive_path().unwrap(), PathBuf::from(input));
        assert_eq!(bundler.pkg_fmt().unwrap(), "tar.gz");
    }

    #[test]
    fn plain_inputs_are_packaged() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let input = touch(dir.path(), "data.csv", b"a,b\n1,2\n");
        let bundler = Bundler::new(&config, "monkeys", vec![input], None, None).unwrap();
        assert!(!bundler.skip_packaging());
    }

    #[test]
    fn missing_input_is_a_packaging_error() {
        let config = offline_config();
        let result = Bundler::new(&config, "monkeys", vec!["/no/such/file.csv".into()], None, None);
        assert!(matches!(result, Err(DatacatError::Packaging(_))));
    }

    #[test]
    fn no_inputs_is_a_packaging_error() {
        let config = offline_config();
        assert!(matches!(
            Bundler::new(&config, "monkeys", vec![], None, None),
            Err(DatacatError::Packaging(_))
        ));
    }

    #[test]
    fn explicit_archive_must_be_recognized() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let input = touch(dir.path(), "data.csv", b"a,b\n");
        let result = Bundler::new(
            &config,
            "monkeys",
            vec![input],
            None,
            Some(PathBuf::from("out.txt")),
        );
        assert!(matches!(result, Err(DatacatError::Packaging(_))));
    }

    #[test]
    fn multiple_inputs_reject_single_member_archives() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.csv", b"a\n");
        let b = touch(dir.path(), "b.csv", b"b\n");
        let result = Bundler::new(
            &config,
            "monkeys",
            vec![a, b],
            None,
            Some(PathBuf::from("out.gz")),
        );
        assert!(matches!(result, Err(DatacatError::Packaging(_))));
    }

    #[test]
    fn format_inference_picks_the_mode() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.csv", b"");
        let b = touch(dir.path(), "b.csv", b"");
        let c = touch(dir.path(), "c.tsv", b"");
        let paths: Vec<PathBuf> = [a, b, c].iter().map(PathBuf::from).collect();
        assert_eq!(most_common_data_format(&paths), Some("csv".to_string()));
    }

    #[test]
    fn format_inference_breaks_ties_by_first_seen() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.tsv", b"");
        let b = touch(dir.path(), "b.csv", b"");
        let paths: Vec<PathBuf> = [a, b].iter().map(PathBuf::from).collect();
        assert_eq!(most_common_data_format(&paths), Some("tsv".to_string()));
    }

    #[test]
    fn default_archive_path_uses_dataset_and_timestamp() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let input = touch(dir.path(), "data.csv", b"a,b\n");
        let mut bundler = Bundler::new(&config, "monkeys", vec![input], None, None).unwrap();
        let path = bundler.archive_path().unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("datacat_monkeys-"));
        assert!(name.ends_with(".tar.gz"));
    }

    #[tokio::test]
    async fn bundle_writes_an_archive_and_cleans_staging() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.csv", b"a,b\n1,2\n");
        let b = touch(dir.path(), "b.csv", b"c,d\n3,4\n");
        let archive = dir.path().join("bundle.tar.gz");
        let mut bundler = Bundler::new(
            &config,
            "monkeys",
            vec![a, b],
            Some("csv".to_string()),
            Some(archive.clone()),
        )
        .unwrap();
        bundler.bundle().await.unwrap();
        assert!(archive.exists());
        assert!(bundler.size().unwrap() > 0);
        assert_eq!(bundler.fmt(), "csv");
    }

    #[tokio::test]
    async fn unreachable_remote_input_fails_packaging() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let local = touch(dir.path(), "a.csv", b"a,b\n");
        let archive = dir.path().join("bundle.tar.gz");
        let mut bundler = Bundler::new(
            &config,
            "monkeys",
            vec![local, "http://127.0.0.1:1/missing.csv".to_string()],
            Some("csv".to_string()),
            Some(archive.clone()),
        )
        .unwrap();
        match bundler.bundle().await {
            Err(DatacatError::Packaging(message)) => {
                assert!(message.contains("http://127.0.0.1:1/missing.csv"));
            }
            other => panic!("expected packaging error, got {:?}", other),
        }
        assert!(!archive.exists());
    }

    #[test]
    fn summary_counts_files_and_formats() {
        let config = offline_config();
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.csv", b"12345");
        let b = touch(dir.path(), "b.csv", b"678");
        let bundler = Bundler::new(&config, "monkeys", vec![a, b], None, None).unwrap();
        let summary = bundler.summary().unwrap();
        assert_eq!(summary["file_count"], 2);
        assert_eq!(summary["total_size"], 8);
        assert_eq!(summary["formats"]["csv"], 2);
    }
}
