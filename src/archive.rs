//! One-song download orchestration: fetch every direct link, package the
//! result as a single archive in the output directory.

use std::{
    fs,
    io::{Read, Seek, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, trace};
use url::Url;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    error::{Error, Result},
    fetch::Fetcher,
    helpers::{sanitize::sanitize, staging::StagingDir},
    song::Song,
};

/// Turns a [`Song`]'s direct links into one local archive file.
pub struct Archiver {
    out_dir: PathBuf,
}

impl Archiver {
    /// Archives will be written into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Downloads `song` and returns the path of the resulting archive.
    ///
    /// A song pre-packaged upstream (a lone `"archive"` link) is fetched
    /// directly under the sanitized song name, keeping the remote archive
    /// format. Anything else is staged part-by-part and zipped. The archive
    /// is named `archive_name` when given, else the sanitized song name.
    #[tracing::instrument(skip_all, fields(song = %song.name))]
    pub async fn download(
        &self,
        fetcher: &mut Fetcher,
        song: &Song,
        archive_name: Option<&str>,
    ) -> Result<PathBuf> {
        let song_name = sanitize(&song.name);
        debug!(name = %song_name, "Downloading song");

        if song.is_prepackaged() {
            let (_, link) = song
                .direct_link_urls()
                .next()
                .ok_or_else(|| Error::Transfer {
                    url: song.link.clone().unwrap_or_default(),
                    message: "song record has no usable direct link".to_owned(),
                })?;
            let url = parse_link(link)?;

            return fetcher.fetch(&url, &self.out_dir, Some(&song_name)).await;
        }

        let staging = StagingDir::create(&self.out_dir, &song_name)?;

        for (part, link) in song.direct_link_urls() {
            trace!(part, link, "Fetching song part");
            let url = parse_link(link)?;
            fetcher.fetch(&url, staging.inner(), None).await?;
        }

        let archive_stem = archive_name.map_or(song_name, sanitize);
        let archive_path = self.out_dir.join(format!("{archive_stem}.zip"));

        trace!(path = ?archive_path, "Packaging staged parts");
        zip_dir_to(staging.outer(), &archive_path).await?;
        drop(staging);

        debug!(path = ?archive_path, "Song archived");
        Ok(archive_path)
    }
}

fn parse_link(link: &str) -> Result<Url> {
    Url::parse(link).map_err(|e| Error::Transfer {
        url: link.to_owned(),
        message: e.to_string(),
    })
}

/// Zips the contents of `dir` (entry paths relative to `dir`) into
/// `archive_path`. Runs on the blocking pool; zip writing is synchronous.
async fn zip_dir_to(dir: &Path, archive_path: &Path) -> Result<()> {
    let dir = dir.to_path_buf();
    let archive_path = archive_path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = fs::File::create(&archive_path)?;
        let mut zip = ZipWriter::new(file);
        zip_dir_contents(&mut zip, &dir, &dir)?;
        zip.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

fn zip_dir_contents<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    root: &Path,
    dir: &Path,
) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(std::fs::DirEntry::path);

    for entry in entries {
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?
            .to_string_lossy()
            .replace('\\', "/");

        if path.is_dir() {
            zip.add_directory(relative, options)?;
            zip_dir_contents(zip, root, &path)?;
        } else {
            zip.start_file(relative, options)?;
            let mut file = fs::File::open(&path)?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            zip.write_all(&buf)?;
        }
    }

    Ok(())
}
