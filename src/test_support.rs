use std::fs;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use tempfile::TempDir;

use crate::config::{Config, MailConfig};
use crate::content::ContentStore;
use crate::database::account::{self, NewUser};
use crate::database::common::{parse_timestamp, Now};
use crate::database::{category, session, Stores};
use crate::models::Role;
use crate::notifier::{Notifier, NotifierError};
use crate::AppState;

pub const BASE_URL: &str = "http://blog.test";

pub fn at(value: &str) -> NaiveDateTime {
    parse_timestamp(value).unwrap()
}

/// Three fresh databases and a content tree under one temporary directory,
/// seeded the same way the server seeds them on startup.
pub struct Fixture {
    pub dir: TempDir,
    pub stores: Stores,
    pub content: ContentStore,
}

impl Fixture {
    pub fn new() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = |name: &str| dir.path().join(name).to_str().unwrap().to_owned();
        let stores = Stores::open(&path("users.db"), &path("comments.db"), &path("stats.db")).unwrap();
        let content = ContentStore::new(dir.path().join("markdown"));
        fs::create_dir_all(content.root()).unwrap();
        let mut connection = stores.accounts.get().unwrap();
        category::seed_defaults(&mut connection, "2024-01-01 00:00:00").unwrap();
        category::ensure_dirs(&mut connection, &content).unwrap();
        Fixture { dir, stores, content }
    }

    pub fn config(&self) -> Config {
        Config {
            bind_address: "127.0.0.1:0".into(),
            accounts_database_url: String::new(),
            comments_database_url: String::new(),
            stats_database_url: String::new(),
            content_dir: self.content.root().to_path_buf(),
            upload_dir: self.dir.path().join("uploads"),
            max_upload_bytes: 1024,
            app_base_url: BASE_URL.into(),
            timezone: chrono_tz::Asia::Riyadh,
            session_lifetime: chrono::Duration::hours(1),
            allowed_origins: Vec::new(),
            mail: MailConfig {
                server: "localhost".into(),
                port: 2525,
                username: String::new(),
                password: String::new(),
                use_tls: false,
                use_ssl: false,
                from_name: "CIT Blog".into(),
                from_addr: "owner@blog.test".into(),
            },
        }
    }

    pub fn app_state(&self, notifier: Arc<dyn Notifier>) -> AppState {
        AppState::new(self.config(), self.stores.clone(), notifier)
    }

    /// A verified user with the given role and a live session. Returns the
    /// user id and the `Authorization` header value for that session.
    pub fn signed_in(&self, username: &str, role: Role) -> (i32, String) {
        let mut connection = self.stores.accounts.get().unwrap();
        let email = format!("{}@blog.test", username);
        let user = account::insert(
            &mut connection,
            NewUser {
                username,
                email: &email,
                password_hash: "unused",
                phone: None,
                created_at: "2024-01-01 00:00:00",
            },
        )
        .unwrap();
        account::mark_email_verified(&mut connection, user.id).unwrap();
        account::set_role(&mut connection, &user, role).unwrap();
        let lifetime = self.config().session_lifetime;
        let token = session::create(&mut connection, user.id, &Now::capture(chrono_tz::UTC), lifetime).unwrap();
        (user.id, format!("Bearer {}", token))
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentMail>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<RecordingNotifier> {
        Arc::new(RecordingNotifier::default())
    }

    pub fn last(&self) -> Option<SentMail> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Token at the end of the last link sent to `to`.
    pub fn last_token_for(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let mail = sent.iter().rev().find(|mail| mail.to == to)?;
        let start = mail.html.find("href=\"")? + "href=\"".len();
        let link = &mail.html[start..];
        let link = &link[..link.find('"')?];
        link.rsplit('/').next().map(str::to_owned)
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotifierError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_owned(),
            subject: subject.to_owned(),
            html: html_body.to_owned(),
        });
        Ok(())
    }
}

pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _to: &str, _subject: &str, _html_body: &str) -> Result<(), NotifierError> {
        Err(NotifierError::NotConfigured)
    }
}
