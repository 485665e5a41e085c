use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::api::common::ErrorCode;
use crate::error::BlogError;

pub const POST_EXTENSION: &str = "md";
const HEADING_MARKER: char = '#';
const SNIPPET_LEADING_CHARS: usize = 50;
const SNIPPET_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub filename: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub category: String,
    pub filename: String,
    pub title: String,
    pub snippet: String,
}

/// Rejects names that would escape the content tree or hide as dotfiles.
pub fn check_path_component(name: &str) -> Result<&str, BlogError> {
    let valid = !name.is_empty()
        && name.len() <= 200
        && !name.starts_with('.')
        && !name.contains(|ch: char| ch == '/' || ch == '\\' || ch == '\0');
    if valid {
        Ok(name)
    } else {
        Err(BlogError::validation(
            ErrorCode::InvalidName,
            format!("{:?} is not a valid name", name),
        ))
    }
}

fn heading_title(line: &str) -> Option<String> {
    let line = line.trim_start();
    if line.starts_with(HEADING_MARKER) {
        Some(line.trim_start_matches(HEADING_MARKER).trim().to_owned())
    } else {
        None
    }
}

/// Splits a stored document into its title and body. Without a heading line
/// the whole text is the body and the title falls back to `filename`.
pub fn split_document(raw: &str, filename: &str) -> Document {
    let mut lines = raw.lines();
    match lines.next().and_then(heading_title) {
        Some(title) => Document {
            title,
            body: lines.collect::<Vec<_>>().join("\n").trim().to_owned(),
        },
        None => Document {
            title: filename.to_owned(),
            body: raw.to_owned(),
        },
    }
}

pub fn render_document(title: &str, body: &str) -> String {
    format!("{} {}\n\n{}", HEADING_MARKER, title, body)
}

/// Char offset in `haystack` of the first case-insensitive occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }
    let mut lowered = Vec::new();
    let mut origin = Vec::new();
    for (index, ch) in haystack.chars().enumerate() {
        for lower in ch.to_lowercase() {
            lowered.push(lower);
            origin.push(index);
        }
    }
    lowered
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
        .map(|position| origin[position])
}

fn snippet_around(text: &str, query: &str) -> Option<String> {
    let index = find_case_insensitive(text, query)?;
    let start = index.saturating_sub(SNIPPET_LEADING_CHARS);
    Some(
        text.chars()
            .skip(start)
            .take(SNIPPET_CHARS)
            .map(|ch| if ch == '\n' { ' ' } else { ch })
            .collect(),
    )
}

/// Filesystem tree of posts: `{root}/{category folder}/{filename}.md`.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> ContentStore {
        ContentStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &str) -> Result<PathBuf, BlogError> {
        Ok(self.root.join(check_path_component(folder)?))
    }

    fn post_path(&self, folder: &str, filename: &str) -> Result<PathBuf, BlogError> {
        let filename = check_path_component(filename)?;
        Ok(self
            .folder_path(folder)?
            .join(format!("{}.{}", filename, POST_EXTENSION)))
    }

    pub fn ensure_folder(&self, folder: &str) -> Result<(), BlogError> {
        fs::create_dir_all(self.folder_path(folder)?)?;
        Ok(())
    }

    /// Removes an empty category folder.
    pub fn remove_folder(&self, folder: &str) -> Result<(), BlogError> {
        fs::remove_dir(self.folder_path(folder)?)?;
        Ok(())
    }

    pub fn folder_exists(&self, folder: &str) -> bool {
        self.folder_path(folder).map(|path| path.is_dir()).unwrap_or(false)
    }

    fn post_files(&self, folder: &str) -> Result<Vec<(String, PathBuf)>, BlogError> {
        let entries = match fs::read_dir(self.folder_path(folder)?) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(POST_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                files.push((stem.to_owned(), path.clone()));
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn has_posts(&self, folder: &str) -> Result<bool, BlogError> {
        Ok(!self.post_files(folder)?.is_empty())
    }

    /// Lists `(filename, title)` for every post in the folder, sorted by
    /// filename. Files that cannot be read are left out.
    pub fn list(&self, folder: &str) -> Result<Vec<PostSummary>, BlogError> {
        let mut posts = Vec::new();
        for (filename, path) in self.post_files(folder)? {
            let mut first_line = String::new();
            let read = File::open(&path)
                .and_then(|file| BufReader::new(file).read_line(&mut first_line));
            if let Err(e) = read {
                tracing::debug!("skipping unreadable post {}: {}", path.display(), e);
                continue;
            }
            let title = heading_title(&first_line).unwrap_or_else(|| filename.clone());
            posts.push(PostSummary { filename, title });
        }
        Ok(posts)
    }

    pub fn exists(&self, folder: &str, filename: &str) -> bool {
        self.post_path(folder, filename)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    pub fn read_raw(&self, folder: &str, filename: &str) -> Result<String, BlogError> {
        match fs::read_to_string(self.post_path(folder, filename)?) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlogError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub fn read(&self, folder: &str, filename: &str) -> Result<Document, BlogError> {
        Ok(split_document(&self.read_raw(folder, filename)?, filename))
    }

    /// Replaces the whole post. The new text is written next to the target
    /// and renamed over it, so readers see either the old or the new file.
    pub fn write(&self, folder: &str, filename: &str, title: &str, body: &str) -> Result<(), BlogError> {
        let path = self.post_path(folder, filename)?;
        let folder_path = self.folder_path(folder)?;
        fs::create_dir_all(&folder_path)?;
        let mut file = NamedTempFile::new_in(&folder_path)?;
        file.write_all(render_document(title, body).as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Returns whether a file was removed.
    pub fn delete(&self, folder: &str, filename: &str) -> Result<bool, BlogError> {
        match fs::remove_file(self.post_path(folder, filename)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Scans every post of every given folder. A post matches when the query
    /// occurs, ignoring case, in its title or its text.
    pub fn search(&self, query: &str, folders: &[String]) -> Result<Vec<SearchHit>, BlogError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let lowered_query = query.to_lowercase();
        let mut hits = Vec::new();
        for folder in folders {
            if !self.folder_exists(folder) {
                continue;
            }
            for (filename, path) in self.post_files(folder)? {
                let raw = match fs::read_to_string(&path) {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::debug!("skipping unreadable post {}: {}", path.display(), e);
                        continue;
                    }
                };
                let title = split_document(&raw, &filename).title;
                let snippet = snippet_around(&raw, query);
                if snippet.is_some() || title.to_lowercase().contains(&lowered_query) {
                    hits.push(SearchHit {
                        category: folder.clone(),
                        filename,
                        title,
                        snippet: snippet.unwrap_or_default(),
                    });
                }
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, ContentStore) {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());
        (dir, store)
    }

    #[rstest]
    #[case("# Hello\n\n<p>Hi</p>", "Hello", "<p>Hi</p>")]
    #[case("  ## Spaced  \nbody line", "Spaced", "body line")]
    #[case("no heading\nsecond", "fallback", "no heading\nsecond")]
    #[case("", "fallback", "")]
    fn splits_documents(#[case] raw: &str, #[case] title: &str, #[case] body: &str) {
        let document = split_document(raw, "fallback");
        assert_eq!(document.title, title);
        assert_eq!(document.body, body);
    }

    #[test]
    fn write_then_read_keeps_title_and_body() {
        let (_dir, store) = store();
        store.write("projects", "hello", "Hello", "<p>Hi</p>\n<p>There</p>").unwrap();
        assert_eq!(
            store.read_raw("projects", "hello").unwrap(),
            "# Hello\n\n<p>Hi</p>\n<p>There</p>"
        );
        let document = store.read("projects", "hello").unwrap();
        assert_eq!(document.title, "Hello");
        assert_eq!(document.body, "<p>Hi</p>\n<p>There</p>");

        store.write("projects", "hello", "Again", "new").unwrap();
        assert_eq!(store.read("projects", "hello").unwrap().title, "Again");
        let leftovers: Vec<_> = fs::read_dir(store.root().join("projects"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn missing_post_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.read("projects", "ghost"), Err(BlogError::NotFound)));
        assert!(!store.delete("projects", "ghost").unwrap());
        assert!(!store.exists("projects", "ghost"));
    }

    #[test]
    fn list_uses_heading_or_filename() {
        let (dir, store) = store();
        store.write("articles", "b-post", "Second", "text").unwrap();
        fs::write(dir.path().join("articles/a-post.md"), "plain text").unwrap();
        fs::write(dir.path().join("articles/notes.txt"), "# Ignored").unwrap();
        fs::write(dir.path().join("articles/binary.md"), [0xff, 0xfe, 0x00]).unwrap();
        let posts = store.list("articles").unwrap();
        assert_eq!(
            posts,
            vec![
                PostSummary { filename: "a-post".into(), title: "a-post".into() },
                PostSummary { filename: "b-post".into(), title: "Second".into() },
            ]
        );
        assert!(store.list("missing").unwrap().is_empty());
    }

    #[test]
    fn delete_removes_file() {
        let (_dir, store) = store();
        store.write("projects", "bye", "Bye", "").unwrap();
        assert!(store.has_posts("projects").unwrap());
        assert!(store.delete("projects", "bye").unwrap());
        assert!(!store.has_posts("projects").unwrap());
    }

    #[rstest]
    #[case("")]
    #[case("..")]
    #[case(".hidden")]
    #[case("a/b")]
    #[case("a\\b")]
    fn rejects_unsafe_names(#[case] name: &str) {
        let (_dir, store) = store();
        assert!(matches!(
            store.write("projects", name, "t", "b"),
            Err(BlogError::Validation(ErrorCode::InvalidName, _))
        ));
        assert!(matches!(
            store.write(name, "post", "t", "b"),
            Err(BlogError::Validation(ErrorCode::InvalidName, _))
        ));
    }

    #[test]
    fn search_matches_title_or_body_case_insensitively() {
        let (_dir, store) = store();
        store.write("projects", "rust", "Learning Rust", "ownership and borrowing").unwrap();
        store.write("tutorials", "sql", "SQL Basics", "SELECT statements explained").unwrap();
        store.write("articles", "misc", "Misc", "nothing relevant").unwrap();
        let folders = vec!["projects".to_owned(), "tutorials".to_owned(), "articles".to_owned(), "gone".to_owned()];

        let hits = store.search("BORROW", &folders).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, "projects");
        assert_eq!(hits[0].title, "Learning Rust");
        assert!(hits[0].snippet.contains("borrowing"));
        assert!(!hits[0].snippet.contains('\n'));

        let hits = store.search("sql basics", &folders).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "sql");

        assert!(store.search("   ", &folders).unwrap().is_empty());
        assert!(store.search("absent", &folders).unwrap().is_empty());
    }

    #[test]
    fn snippet_is_a_fixed_window_around_the_match() {
        let text = format!("{}NEEDLE{}", "a".repeat(80), "b".repeat(200));
        let snippet = snippet_around(&text, "needle").unwrap();
        assert_eq!(snippet.chars().count(), SNIPPET_CHARS);
        assert!(snippet.starts_with(&"a".repeat(50)));
        assert_eq!(&snippet[50..56], "NEEDLE");

        let short = snippet_around("line one\nneedle here", "Needle").unwrap();
        assert_eq!(short, "line one needle here");
    }

    #[test]
    fn search_offsets_count_characters_not_bytes() {
        let text = format!("{}كلمة", "ع".repeat(60));
        let snippet = snippet_around(&text, "كلمة").unwrap();
        assert_eq!(snippet.chars().count(), 54);
        assert!(snippet.ends_with("كلمة"));
    }
}
