use indoc::formatdoc;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("MAIL_USERNAME or MAIL_PASSWORD is not set")]
    NotConfigured,
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Delivers transactional email. Sending blocks the caller until the
/// transport answers.
pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotifierError>;
}

pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> SmtpNotifier {
        SmtpNotifier { config }
    }

    fn transport(&self) -> Result<SmtpTransport, NotifierError> {
        let config = &self.config;
        let builder = if config.use_ssl {
            SmtpTransport::relay(&config.server)?
        } else if config.use_tls {
            SmtpTransport::starttls_relay(&config.server)?
        } else {
            SmtpTransport::builder_dangerous(&config.server)
        };
        Ok(builder
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build())
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotifierError> {
        if !self.config.has_credentials() {
            return Err(NotifierError::NotConfigured);
        }
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.sender_address()).parse()?;
        let message = Message::builder()
            .from(from)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_owned())?;
        self.transport()?.send(&message)?;
        tracing::info!("sent \"{}\" to {}", subject, to);
        Ok(())
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub struct Email {
    pub subject: String,
    pub html: String,
}

pub fn verification_email(name: &str, link: &str) -> Email {
    Email {
        subject: "✅ Activate your CIT Blog account".to_owned(),
        html: formatdoc! {r#"
            <html>
              <body style="font-family:Cairo,Arial; text-align:center;">
                <h2>👋 Welcome {name}</h2>
                <p>Thanks for registering. Confirm your email address to finish activating your account:</p>
                <p><a href="{link}" style="background:#16a34a;color:#fff;padding:10px 18px;border-radius:8px;text-decoration:none;">Activate my account</a></p>
                <p style="color:#666;font-size:13px;">This link is valid for 24 hours. If you did not register, ignore this message.</p>
              </body>
            </html>
        "#, name = escape_html(name), link = link},
    }
}

pub fn password_reset_email(username: &str, link: &str) -> Email {
    Email {
        subject: "🔐 Reset your CIT Blog password".to_owned(),
        html: formatdoc! {r#"
            <html>
              <body style="font-family:Cairo,Arial; text-align:center;">
                <h2>🔑 Password reset</h2>
                <p>Hello {username},</p>
                <p>Use the button below to choose a new password. The link is valid for one hour:</p>
                <p><a href="{link}" style="background:#0d6efd;color:#fff;padding:10px 18px;border-radius:8px;text-decoration:none;">Reset password</a></p>
                <p style="color:#666;font-size:13px;">If you did not ask for this, ignore this message and nothing will change.</p>
              </body>
            </html>
        "#, username = escape_html(username), link = link},
    }
}

pub fn contact_email(name: &str, email: &str, message: &str) -> Email {
    Email {
        subject: "📩 New message from the CIT Blog contact form".to_owned(),
        html: formatdoc! {r#"
            <html>
              <body style="font-family:Cairo,Arial;">
                <h3>📩 New contact form message</h3>
                <p><strong>Name:</strong> {name}</p>
                <p><strong>Email:</strong> {email}</p>
                <p><strong>Message:</strong></p>
                <p>{message}</p>
              </body>
            </html>
        "#,
            name = escape_html(name),
            email = escape_html(email),
            message = escape_html(message).replace('\n', "<br>"),
        },
    }
}
