use actix_web::web;
use lettre::{transport::smtp::authentication::Credentials, Message, SmtpTransport, Transport};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use common::{
    access_rules::{AccessRules, SendMail},
    context::Context,
    default_timestamp,
    entities::letter::{CreateLetter, Letter},
    error::{self, AddCode},
};

lazy_static::lazy_static! {
    static ref SMTP_HOST: Option<String> = std::env::var("SMTP_HOST").ok();
    static ref SMTP_USER: Option<String> = std::env::var("SMTP_USER").ok();
    static ref SMTP_PASSWORD: String = std::env::var("SMTP_PASSWORD").unwrap_or_default();
    static ref MAIL_FROM: String =
        std::env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@civic.local".to_string());
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LetterReceipt {
    pub id: String,
    pub sent: bool,
}

fn build_message(letter: &Letter) -> error::Result<Message> {
    let to = letter
        .email
        .parse()
        .map_err(|_| {
            anyhow::anyhow!("email: '{}' is not a valid address", letter.email).code(400)
        })?;
    let from = MAIL_FROM
        .parse()
        .map_err(|_| anyhow::anyhow!("MAIL_FROM is not a valid address").code(500))?;

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(letter.subject.clone())
        .body(letter.message.clone())?)
}

fn transport(host: &str) -> error::Result<SmtpTransport> {
    let mut builder = SmtpTransport::relay(host)?;
    if let Some(user) = SMTP_USER.as_ref() {
        builder = builder.credentials(Credentials::new(user.clone(), SMTP_PASSWORD.clone()));
    }
    Ok(builder.build())
}

pub struct MailService {
    pub context: Context,
}

impl MailService {
    pub fn new(context: Context) -> MailService {
        MailService { context }
    }

    async fn deliver(&self, host: &str, message: Message) -> error::Result<()> {
        let mailer = transport(host)?;
        web::block(move || mailer.send(&message))
            .await
            .map_err(|err| anyhow::anyhow!("Mail worker failed: {}", err).code(500))?
            .map_err(|err| anyhow::anyhow!("SMTP relay refused the letter: {}", err).code(502))?;
        Ok(())
    }

    /// Stores the letter and relays it when SMTP is configured.
    pub async fn send_letter(&self, create: CreateLetter) -> error::Result<LetterReceipt> {
        let auth = self.context.auth();
        if !SendMail.get_access(&auth, ()) {
            return Err(auth.forbidden("Only services can send mail"));
        }

        let letters = self.context.try_get_repository::<Letter>()?;

        let now = default_timestamp();
        let letter = Letter {
            id: ObjectId::new(),
            email: create.email.trim().to_string(),
            message: create.message,
            subject: create.subject,
            sent: false,
            created_at: now,
            last_modified: now,
        };
        let message = build_message(&letter)?;

        letters.insert(&letter).await?;

        let Some(host) = SMTP_HOST.as_ref() else {
            log::info!("SMTP is not configured, letter {} kept unsent", letter.id);
            return Ok(LetterReceipt {
                id: letter.id.to_hex(),
                sent: false,
            });
        };

        self.deliver(host, message).await?;

        let mut sent = letter;
        sent.sent = true;
        let sent = letters.update_one(doc! {"id": sent.id}, &sent).await?;
        log::info!("Letter {} sent to {}", sent.id, sent.email);

        Ok(LetterReceipt {
            id: sent.id.to_hex(),
            sent: true,
        })
    }
}
