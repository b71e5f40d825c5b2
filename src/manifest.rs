//! Manifest persistence
//!
//! A manifest is a small comma-delimited text file stored inside the
//! directory it describes:
//!
//! ```text
//! filename,filehash,pixelhash
//! a.jpg,<md5 of bytes>,<md5 of pixels>
//! ```
//!
//! Writes go to a `.new` sibling first, the live file is copied to `.bak`,
//! and the `.new` file is renamed over the live path. The live path never
//! disappears and always holds a complete manifest.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{PintError, Result};
use crate::models::{HexDigest, ManifestEntry};

/// Header row of every manifest file
pub const MANIFEST_HEADER: &str = "filename,filehash,pixelhash";

/// Characters a filename may not contain to be stored unquoted
const RESERVED_CHARS: [char; 4] = [',', '"', '\r', '\n'];

/// Whether a filename can be written to a manifest row
pub fn is_storable_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(&RESERVED_CHARS[..])
}

/// Filename to hashes mapping for one directory, ordered by filename
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.get(filename)
    }

    pub fn get_mut(&mut self, filename: &str) -> Option<&mut ManifestEntry> {
        self.entries.get_mut(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    /// Insert or replace an entry, returning the previous one
    pub fn insert(&mut self, filename: String, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.entries.insert(filename, entry)
    }

    pub fn remove(&mut self, filename: &str) -> Option<ManifestEntry> {
        self.entries.remove(filename)
    }

    /// Filenames in ascending order
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in ascending filename order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse manifest text. `source` is only used for error messages.
    pub fn parse(text: &str, source: &Path) -> Result<Self> {
        let mut lines = text.lines();
        match lines.next() {
            Some(header) if header == MANIFEST_HEADER => {}
            Some(header) => {
                return Err(PintError::manifest_parse(
                    source.to_path_buf(),
                    1,
                    format!("unexpected header {:?}", header),
                ))
            }
            None => {
                return Err(PintError::manifest_parse(
                    source.to_path_buf(),
                    1,
                    "missing header",
                ))
            }
        }

        let mut manifest = Manifest::new();
        for (idx, line) in lines.enumerate() {
            let line_no = idx + 2;
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() != 3 {
                return Err(PintError::manifest_parse(
                    source.to_path_buf(),
                    line_no,
                    format!("expected 3 columns, found {}", cols.len()),
                ));
            }

            let digest = |col: &str, what: &str| {
                HexDigest::parse(col).ok_or_else(|| {
                    PintError::manifest_parse(
                        source.to_path_buf(),
                        line_no,
                        format!("malformed {} {:?}", what, col),
                    )
                })
            };
            let entry = ManifestEntry {
                content_hash: digest(cols[1], "filehash")?,
                pixel_hash: digest(cols[2], "pixelhash")?,
            };

            if cols[0].is_empty() {
                return Err(PintError::manifest_parse(
                    source.to_path_buf(),
                    line_no,
                    "empty filename",
                ));
            }
            if manifest.insert(cols[0].to_string(), entry).is_some() {
                return Err(PintError::manifest_parse(
                    source.to_path_buf(),
                    line_no,
                    format!("duplicate filename {:?}", cols[0]),
                ));
            }
        }

        Ok(manifest)
    }

    /// Serialize with a header row and entries sorted by filename
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(MANIFEST_HEADER.len() + 1 + self.len() * 96);
        out.push_str(MANIFEST_HEADER);
        out.push('\n');
        for (name, entry) in self.iter() {
            out.push_str(name);
            out.push(',');
            out.push_str(entry.content_hash.as_str());
            out.push(',');
            out.push_str(entry.pixel_hash.as_str());
            out.push('\n');
        }
        out
    }
}

/// Loads and saves the manifest of a directory
#[derive(Debug, Clone)]
pub struct ManifestStore {
    manifest_name: String,
}

impl ManifestStore {
    /// Create a store for manifests named `manifest_name`
    pub fn new(manifest_name: impl Into<String>) -> Self {
        Self {
            manifest_name: manifest_name.into(),
        }
    }

    /// Path of the live manifest for a directory
    pub fn manifest_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.manifest_name)
    }

    /// Path of the backup written by the last update
    pub fn backup_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.bak", self.manifest_name))
    }

    /// Path of the staging file used during an update
    pub fn staging_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.new", self.manifest_name))
    }

    /// Whether a live manifest exists for the directory
    pub fn exists(&self, dir: &Path) -> bool {
        self.manifest_path(dir).is_file()
    }

    /// Load the manifest of a directory; empty if none exists yet
    pub fn load(&self, dir: &Path) -> Result<Manifest> {
        let path = self.manifest_path(dir);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No manifest found at {:?}", path);
                return Ok(Manifest::new());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(PintError::manifest_parse(path, 1, "manifest is not valid UTF-8"))
            }
            Err(e) => return Err(PintError::io(path, "load manifest", e)),
        };

        let manifest = Manifest::parse(&text, &path)?;
        debug!("Loaded {} manifest entries from {:?}", manifest.len(), path);
        Ok(manifest)
    }

    /// Atomically replace the directory's manifest, keeping the old one as `.bak`
    pub fn save(&self, dir: &Path, manifest: &Manifest) -> Result<()> {
        let live = self.manifest_path(dir);
        let staging = self.staging_path(dir);
        let backup = self.backup_path(dir);

        if let Some(bad) = manifest.filenames().find(|n| !is_storable_name(n)) {
            return Err(PintError::manifest_write(
                live,
                format!("filename {:?} cannot be stored in a manifest", bad),
            ));
        }

        let write_err = |path: &Path, op: &str, e: std::io::Error| {
            PintError::manifest_write(path.to_path_buf(), format!("{}: {}", op, e))
        };

        {
            let mut file = File::create(&staging).map_err(|e| write_err(&staging, "create", e))?;
            file.write_all(manifest.to_text().as_bytes())
                .map_err(|e| write_err(&staging, "write", e))?;
            file.sync_all().map_err(|e| write_err(&staging, "sync", e))?;
        }

        // Copy, not rename: the live path must exist until it is replaced
        if live.is_file() {
            fs::copy(&live, &backup).map_err(|e| write_err(&backup, "backup", e))?;
        }
        fs::rename(&staging, &live).map_err(|e| write_err(&live, "replace", e))?;

        info!("Wrote {} entries to {:?}", manifest.len(), live);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PintErrorKind;
    use proptest::prelude::*;

    fn digest(c: char) -> HexDigest {
        HexDigest::parse(&c.to_string().repeat(32)).unwrap()
    }

    fn entry(c: char, p: char) -> ManifestEntry {
        ManifestEntry {
            content_hash: digest(c),
            pixel_hash: digest(p),
        }
    }

    #[test]
    fn test_load_without_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        assert!(!store.exists(dir.path()));
        assert!(store.load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_header_only_is_empty_manifest() {
        let m = Manifest::parse("filename,filehash,pixelhash\n", Path::new("m")).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn test_save_sorted_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        let mut m = Manifest::new();
        m.insert("b.jpg".into(), entry('b', 'c'));
        m.insert("a.jpg".into(), entry('a', 'd'));
        store.save(dir.path(), &m).unwrap();

        let text = fs::read_to_string(store.manifest_path(dir.path())).unwrap();
        let expected = format!(
            "filename,filehash,pixelhash\na.jpg,{},{}\nb.jpg,{},{}\n",
            "a".repeat(32),
            "d".repeat(32),
            "b".repeat(32),
            "c".repeat(32)
        );
        assert_eq!(text, expected);
        assert!(!store.backup_path(dir.path()).exists());
        assert!(!store.staging_path(dir.path()).exists());
    }

    #[test]
    fn test_second_save_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        let mut m = Manifest::new();
        m.insert("a.jpg".into(), entry('1', '2'));
        store.save(dir.path(), &m).unwrap();
        let first = fs::read_to_string(store.manifest_path(dir.path())).unwrap();

        m.insert("b.jpg".into(), entry('3', '4'));
        store.save(dir.path(), &m).unwrap();

        let backup = fs::read_to_string(store.backup_path(dir.path())).unwrap();
        assert_eq!(backup, first);
        assert_eq!(store.load(dir.path()).unwrap(), m);
    }

    #[test]
    fn test_interrupted_update_leaves_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        let mut m = Manifest::new();
        m.insert("a.jpg".into(), entry('1', '2'));
        store.save(dir.path(), &m).unwrap();

        // Staging file written, process killed before the backup and replace
        fs::write(store.staging_path(dir.path()), "filename,filehash,pixel").unwrap();
        assert_eq!(store.load(dir.path()).unwrap(), m);

        // Next update overwrites the stale staging file
        m.insert("b.jpg".into(), entry('3', '4'));
        store.save(dir.path(), &m).unwrap();
        assert_eq!(store.load(dir.path()).unwrap(), m);
    }

    #[test]
    fn test_killed_between_backup_and_replace_keeps_live_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        let mut old = Manifest::new();
        old.insert("a.jpg".into(), entry('1', '2'));
        store.save(dir.path(), &old).unwrap();

        let mut new = old.clone();
        new.insert("b.jpg".into(), entry('3', '4'));
        store.save(dir.path(), &new).unwrap();

        // State left behind when killed after the backup step of the next
        // update: staging complete, backup refreshed, live not yet replaced
        let mut newer = new.clone();
        newer.remove("a.jpg");
        fs::write(store.staging_path(dir.path()), newer.to_text()).unwrap();
        fs::copy(store.manifest_path(dir.path()), store.backup_path(dir.path())).unwrap();

        assert!(store.exists(dir.path()));
        assert_eq!(store.load(dir.path()).unwrap(), new);
        let backup = fs::read_to_string(store.backup_path(dir.path())).unwrap();
        assert_eq!(backup, new.to_text());

        store.save(dir.path(), &newer).unwrap();
        assert_eq!(store.load(dir.path()).unwrap(), newer);
        assert!(!store.staging_path(dir.path()).exists());
    }

    #[test]
    fn test_save_never_removes_live_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        let mut m = Manifest::new();
        m.insert("a.jpg".into(), entry('1', '2'));
        store.save(dir.path(), &m).unwrap();

        // A backup path that cannot be written fails the update before the
        // live manifest is touched
        fs::create_dir(store.backup_path(dir.path())).unwrap();
        m.insert("b.jpg".into(), entry('3', '4'));
        let err = store.save(dir.path(), &m).unwrap_err();
        assert_eq!(err.kind, PintErrorKind::ManifestWrite);

        let live = store.load(dir.path()).unwrap();
        assert_eq!(live.len(), 1);
        assert!(live.contains("a.jpg"));
    }

    #[test]
    fn test_parse_then_serialize_is_byte_identical() {
        let text = format!(
            "{}\na.jpg,{},{}\nb.jpg,{},{}\n",
            MANIFEST_HEADER,
            "0123456789abcdef".repeat(2),
            "f".repeat(32),
            "e".repeat(32),
            "9".repeat(32)
        );
        let m = Manifest::parse(&text, Path::new(".pint.txt")).unwrap();
        assert_eq!(m.to_text(), text);
    }

    #[test]
    fn test_malformed_rows_are_errors() {
        let cases = [
            ("", "missing header"),
            ("name,hash\n", "unexpected header"),
            ("filename,filehash,pixelhash\na.jpg,abc\n", "expected 3 columns"),
            ("filename,filehash,pixelhash\n\n", "expected 3 columns"),
            ("filename,filehash,pixelhash\na.jpg,xyz,xyz\n", "malformed filehash"),
            (
                "filename,filehash,pixelhash\na.jpg,D41D8CD98F00B204E9800998ECF8427E,d41d8cd98f00b204e9800998ecf8427e\n",
                "malformed filehash",
            ),
        ];
        for (text, needle) in cases {
            let err = Manifest::parse(text, Path::new(".pint.txt")).unwrap_err();
            assert_eq!(err.kind, PintErrorKind::ManifestParse, "{:?}", text);
            assert!(err.message.contains(needle), "{:?} -> {}", text, err.message);
        }
    }

    #[test]
    fn test_duplicate_rows_are_errors() {
        let row = format!("a.jpg,{},{}\n", "a".repeat(32), "b".repeat(32));
        let text = format!("{}\n{}{}", MANIFEST_HEADER, row, row);
        let err = Manifest::parse(&text, Path::new(".pint.txt")).unwrap_err();
        assert_eq!(err.message, "line 3: duplicate filename \"a.jpg\"");
    }

    #[test]
    fn test_load_propagates_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        fs::write(
            store.manifest_path(dir.path()),
            "filename,filehash,pixelhash\nbroken\n",
        )
        .unwrap();
        let err = store.load(dir.path()).unwrap_err();
        assert_eq!(err.kind, PintErrorKind::ManifestParse);
    }

    #[test]
    fn test_save_rejects_unstorable_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(".pint.txt");
        let mut m = Manifest::new();
        m.insert("a,b.jpg".into(), entry('1', '2'));
        let err = store.save(dir.path(), &m).unwrap_err();
        assert_eq!(err.kind, PintErrorKind::ManifestWrite);
        assert!(!store.exists(dir.path()));
    }

    proptest! {
        #[test]
        fn prop_save_load_roundtrip(
            rows in proptest::collection::btree_map(
                "[a-zA-Z0-9 _.-]{1,20}",
                ("[0-9a-f]{32}", "[0-9a-f]{32}"),
                0..20,
            )
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = ManifestStore::new(".pint.txt");
            let mut m = Manifest::new();
            for (name, (c, p)) in &rows {
                m.insert(name.clone(), ManifestEntry {
                    content_hash: HexDigest::parse(c).unwrap(),
                    pixel_hash: HexDigest::parse(p).unwrap(),
                });
            }
            store.save(dir.path(), &m).unwrap();
            prop_assert_eq!(store.load(dir.path()).unwrap(), m);
        }
    }
}
