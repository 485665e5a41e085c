use regex::Regex;
use serde::Serialize;

use crate::api::common::ErrorCode;
use crate::avatar::avatar_url;
use crate::content::{check_path_component, ContentStore, Document, PostSummary, SearchHit};
use crate::database::{category, comments, stats, Stores};
use crate::error::BlogError;
use crate::models::Comment;

pub const MAX_COMMENT_BYTES: usize = 4096;

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub author_name: String,
    pub avatar_url: String,
    pub body: String,
    pub created_at: String,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        CommentView {
            avatar_url: avatar_url(&comment.author_name),
            author_name: comment.author_name,
            body: comment.body,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub category: String,
    pub filename: String,
    pub title: String,
    pub body: String,
    pub views: i64,
    pub date: Option<String>,
    pub category_name: String,
    pub category_slug: String,
    pub comments: Vec<CommentView>,
    pub related_posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AdminPost {
    pub category_folder: String,
    pub category_name: String,
    pub category_slug: String,
    pub filename: String,
    pub title: String,
}

fn first_date(raw: &str) -> Option<String> {
    lazy_static! {
        static ref DATE_REGEX: Regex = Regex::new("\\d{4}-\\d{2}-\\d{2}").unwrap();
    }
    DATE_REGEX.find(raw).map(|found| found.as_str().to_owned())
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, BlogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BlogError::validation(ErrorCode::MissingField, format!("{} is required", field)));
    }
    Ok(value)
}

/// One post is a file in the content tree plus its view counter and comments
/// in the relational stores, addressed by `(category folder, filename)`.
#[derive(Clone)]
pub struct PostRepository {
    stores: Stores,
    content: ContentStore,
}

impl PostRepository {
    pub fn new(stores: Stores, content: ContentStore) -> PostRepository {
        PostRepository { stores, content }
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Writes a new post, replacing any post already stored under the same name.
    pub fn create(&self, category: &str, filename: &str, title: &str, body: &str) -> Result<(), BlogError> {
        let category = check_path_component(required(category, "category")?)?;
        let filename = check_path_component(required(filename, "filename")?)?;
        let title = required(title, "title")?;
        let mut connection = self.stores.accounts.get()?;
        if category::get_by_folder(&mut connection, category)?.is_none() {
            return Err(BlogError::NotFound);
        }
        self.content.write(category, filename, title, body)?;
        tracing::info!("saved post {}/{}", category, filename);
        Ok(())
    }

    pub fn update(&self, category: &str, filename: &str, title: &str, body: &str) -> Result<(), BlogError> {
        if !self.content.exists(category, filename) {
            return Err(BlogError::NotFound);
        }
        let title = required(title, "title")?;
        self.content.write(category, filename, title, body)?;
        tracing::info!("updated post {}/{}", category, filename);
        Ok(())
    }

    pub fn read(&self, category: &str, filename: &str) -> Result<Document, BlogError> {
        self.content.read(category, filename)
    }

    /// Counts a view and gathers everything a post page shows. Missing posts
    /// are not counted.
    pub fn view(&self, category: &str, filename: &str) -> Result<PostView, BlogError> {
        let raw = self.content.read_raw(category, filename)?;
        let document = crate::content::split_document(&raw, filename);

        let views = {
            let mut connection = self.stores.stats.get()?;
            stats::increment(&mut connection, category, filename)?;
            stats::get(&mut connection, category, filename)?
        };
        let comments = self.comments(category, filename)?;
        let (category_name, category_slug) = {
            let mut connection = self.stores.accounts.get()?;
            match category::get_by_folder(&mut connection, category)? {
                Some(found) if found.is_active => (found.name, found.slug),
                _ => (category.to_owned(), category.to_owned()),
            }
        };
        let related_posts = self
            .content
            .list(category)?
            .into_iter()
            .filter(|post| post.filename != filename)
            .collect();
        Ok(PostView {
            category: category.to_owned(),
            filename: filename.to_owned(),
            title: document.title,
            body: document.body,
            views,
            date: first_date(&raw),
            category_name,
            category_slug,
            comments,
            related_posts,
        })
    }

    /// Removes the file, then the view counter and comments. Returns whether a
    /// file existed. The relational rows go even when the file was already gone.
    pub fn delete(&self, category: &str, filename: &str) -> Result<bool, BlogError> {
        let removed = self.content.delete(category, filename)?;
        stats::delete_for_post(&mut *self.stores.stats.get()?, category, filename)?;
        let dropped = comments::delete_for_post(&mut *self.stores.comments.get()?, category, filename)?;
        tracing::info!("deleted post {}/{} ({} comment(s) dropped)", category, filename, dropped);
        Ok(removed)
    }

    pub fn exists(&self, category: &str, filename: &str) -> bool {
        let (category, filename) = (category.trim(), filename.trim());
        !category.is_empty() && !filename.is_empty() && self.content.exists(category, filename)
    }

    pub fn views(&self, category: &str, filename: &str) -> Result<i64, BlogError> {
        stats::get(&mut *self.stores.stats.get()?, category, filename)
    }

    pub fn list(&self, category: &str) -> Result<Vec<PostSummary>, BlogError> {
        self.content.list(category)
    }

    /// Every post of every active category, sorted by category name and then title.
    pub fn list_all(&self) -> Result<Vec<AdminPost>, BlogError> {
        let active = category::list_active(&mut *self.stores.accounts.get()?)?;
        let mut posts = Vec::new();
        for category in active {
            for post in self.content.list(&category.folder)? {
                posts.push(AdminPost {
                    category_folder: category.folder.clone(),
                    category_name: category.name.clone(),
                    category_slug: category.slug.clone(),
                    filename: post.filename,
                    title: post.title,
                });
            }
        }
        posts.sort_by(|a, b| (&a.category_name, &a.title).cmp(&(&b.category_name, &b.title)));
        Ok(posts)
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, BlogError> {
        let folders: Vec<String> = category::list_active(&mut *self.stores.accounts.get()?)?
            .into_iter()
            .map(|category| category.folder)
            .collect();
        self.content.search(query, &folders)
    }

    pub fn comments(&self, category: &str, filename: &str) -> Result<Vec<CommentView>, BlogError> {
        Ok(comments::list(&mut *self.stores.comments.get()?, category, filename)?
            .into_iter()
            .map(CommentView::from)
            .collect())
    }

    /// Adds a comment to an existing post. The body is trimmed first.
    pub fn add_comment(
        &self,
        category: &str,
        filename: &str,
        author_name: &str,
        body: &str,
        timestamp: &str,
    ) -> Result<(), BlogError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(BlogError::validation(ErrorCode::CommentTooShort, "comment is empty"));
        }
        if body.len() > MAX_COMMENT_BYTES {
            return Err(BlogError::validation(
                ErrorCode::CommentTooLong,
                format!("comments are limited to {} bytes", MAX_COMMENT_BYTES),
            ));
        }
        if !self.content.exists(category, filename) {
            return Err(BlogError::NotFound);
        }
        comments::add(&mut *self.stores.comments.get()?, category, filename, author_name, body, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::test_support::Fixture;

    use super::*;

    fn repository(fixture: &Fixture) -> PostRepository {
        PostRepository::new(fixture.stores.clone(), fixture.content.clone())
    }

    #[test]
    fn viewing_a_new_post_counts_the_first_view() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        posts.create("projects", "hello", "Hello", "<p>Hi</p>").unwrap();
        assert_eq!(posts.views("projects", "hello").unwrap(), 0);

        let view = posts.view("projects", "hello").unwrap();
        assert_eq!(view.title, "Hello");
        assert_eq!(view.body, "<p>Hi</p>");
        assert_eq!(view.views, 1);
        assert_eq!(view.category_name, "🛠️ برمجتي");
        assert_eq!(view.category_slug, "projects");
        assert_eq!(view.date, None);
        assert!(view.comments.is_empty());
        assert_eq!(posts.view("projects", "hello").unwrap().views, 2);
    }

    #[test]
    fn missing_posts_are_not_counted() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        assert!(matches!(posts.view("projects", "ghost"), Err(BlogError::NotFound)));
        assert_eq!(posts.views("projects", "ghost").unwrap(), 0);
    }

    #[test]
    fn view_collects_date_related_posts_and_comments() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        posts.create("tutorials", "rust", "Rust", "Published 2024-03-05, revised 2024-04-01").unwrap();
        posts.create("tutorials", "diesel", "Diesel", "body").unwrap();
        posts.create("articles", "other", "Other", "body").unwrap();
        posts.add_comment("tutorials", "rust", "omar", "  nice  ", "2024-03-06 10:00:00").unwrap();

        let view = posts.view("tutorials", "rust").unwrap();
        assert_eq!(view.date.as_deref(), Some("2024-03-05"));
        assert_eq!(view.related_posts, vec![PostSummary { filename: "diesel".into(), title: "Diesel".into() }]);
        assert_eq!(view.comments.len(), 1);
        assert_eq!(view.comments[0].body, "nice");
        assert!(view.comments[0].avatar_url.contains("ui-avatars.com"));
    }

    #[test]
    fn posts_in_unregistered_folders_fall_back_to_the_folder_name() {
        let fixture = Fixture::new();
        fixture.content.write("orphans", "lost", "Lost", "body").unwrap();
        let view = repository(&fixture).view("orphans", "lost").unwrap();
        assert_eq!(view.category_name, "orphans");
        assert_eq!(view.category_slug, "orphans");
    }

    #[test]
    fn create_validates_names_and_category() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        assert!(matches!(posts.create("nowhere", "hello", "Hello", ""), Err(BlogError::NotFound)));
        assert!(matches!(
            posts.create("projects", "../escape", "Hello", ""),
            Err(BlogError::Validation(ErrorCode::InvalidName, _))
        ));
        assert!(matches!(
            posts.create("projects", "hello", "  ", ""),
            Err(BlogError::Validation(ErrorCode::MissingField, _))
        ));
        assert!(!posts.exists("projects", "hello"));
        posts.create("projects", " hello ", " Hello ", "").unwrap();
        assert!(posts.exists("projects", "hello"));
        assert!(!posts.exists("", "hello"));
    }

    #[test]
    fn update_rewrites_existing_posts_only() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        assert!(matches!(posts.update("projects", "hello", "Hello", "body"), Err(BlogError::NotFound)));
        posts.create("projects", "hello", "Hello", "old").unwrap();
        assert!(matches!(
            posts.update("projects", "hello", "", "new"),
            Err(BlogError::Validation(ErrorCode::MissingField, _))
        ));
        posts.update("projects", "hello", "Hello again", "new").unwrap();
        let document = posts.read("projects", "hello").unwrap();
        assert_eq!(document.title, "Hello again");
        assert_eq!(document.body, "new");
    }

    #[test]
    fn delete_cascades_to_views_and_comments() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        posts.create("projects", "hello", "Hello", "body").unwrap();
        posts.create("projects", "kept", "Kept", "body").unwrap();
        posts.view("projects", "hello").unwrap();
        posts.view("projects", "kept").unwrap();
        posts.add_comment("projects", "hello", "omar", "first", "2024-01-01 10:00:00").unwrap();
        posts.add_comment("projects", "kept", "omar", "stays", "2024-01-01 10:00:00").unwrap();

        assert!(posts.delete("projects", "hello").unwrap());
        assert_eq!(posts.views("projects", "hello").unwrap(), 0);
        assert!(posts.comments("projects", "hello").unwrap().is_empty());
        assert!(!posts.exists("projects", "hello"));
        assert_eq!(posts.views("projects", "kept").unwrap(), 1);
        assert_eq!(posts.comments("projects", "kept").unwrap().len(), 1);
        assert!(!posts.delete("projects", "hello").unwrap());
    }

    #[test]
    fn comments_are_validated() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        posts.create("projects", "hello", "Hello", "body").unwrap();
        assert!(matches!(
            posts.add_comment("projects", "hello", "omar", " \n ", "t"),
            Err(BlogError::Validation(ErrorCode::CommentTooShort, _))
        ));
        let long = "x".repeat(MAX_COMMENT_BYTES + 1);
        assert!(matches!(
            posts.add_comment("projects", "hello", "omar", &long, "t"),
            Err(BlogError::Validation(ErrorCode::CommentTooLong, _))
        ));
        assert!(matches!(
            posts.add_comment("projects", "ghost", "omar", "hi", "t"),
            Err(BlogError::NotFound)
        ));
        posts.add_comment("projects", "hello", "omar", &"x".repeat(MAX_COMMENT_BYTES), "t").unwrap();
    }

    #[test]
    fn list_all_sorts_by_category_name_then_title() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        posts.create("tutorials", "b", "Beta", "").unwrap();
        posts.create("tutorials", "a", "Alpha", "").unwrap();
        posts.create("articles", "z", "Zeta", "").unwrap();
        fs::create_dir_all(fixture.content.root().join("hidden")).unwrap();
        fixture.content.write("hidden", "secret", "Secret", "").unwrap();

        let listed: Vec<_> = posts
            .list_all()
            .unwrap()
            .into_iter()
            .map(|post| (post.category_folder, post.title))
            .collect();
        let mut expected = vec![
            ("tutorials".to_owned(), "Alpha".to_owned(), "📚 شروحاتي"),
            ("tutorials".to_owned(), "Beta".to_owned(), "📚 شروحاتي"),
            ("articles".to_owned(), "Zeta".to_owned(), "🧠 مقالاتي"),
        ];
        expected.sort_by(|a, b| (a.2, &a.1).cmp(&(b.2, &b.1)));
        let expected: Vec<_> = expected.into_iter().map(|(folder, title, _)| (folder, title)).collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn search_covers_active_categories_only() {
        let fixture = Fixture::new();
        let posts = repository(&fixture);
        posts.create("projects", "hello", "Hello", "Some Rust code").unwrap();
        posts.create("articles", "rusty", "Rusty nails", "nothing here").unwrap();
        fixture.content.write("hidden", "rust", "Rust", "rust").unwrap();

        let mut found: Vec<_> = posts
            .search("rust")
            .unwrap()
            .into_iter()
            .map(|hit| format!("{}/{}", hit.category, hit.filename))
            .collect();
        found.sort();
        assert_eq!(found, vec!["articles/rusty", "projects/hello"]);
        assert!(posts.search("   ").unwrap().is_empty());
    }
}
