use crate::{
    context::Context,
    entities::letter::CreateLetter,
    error,
    services::{MAIL_SERVICE, PROTOCOL},
};

pub async fn send_mail(context: &Context, create_letter: CreateLetter) -> error::Result<()> {
    let Some(mail_service) = MAIL_SERVICE.as_ref() else {
        log::debug!("Mail service not configured, dropping '{}'", create_letter.subject);
        return Ok(());
    };

    context
        .make_request::<CreateLetter>()
        .auth(context.server_auth())
        .post(format!("{}://{}/api/mail", PROTOCOL.as_str(), mail_service))
        .json(&create_letter)
        .send()
        .await?;
    Ok(())
}

/// Fire-and-forget variant for side effects of a request that already succeeded.
pub async fn notify(context: &Context, create_letter: CreateLetter) {
    let email = create_letter.email.clone();
    if let Err(err) = send_mail(context, create_letter).await {
        log::warn!("Failed to send mail to {}: {}", email, err);
    }
}
