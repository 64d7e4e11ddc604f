use mongodb::bson::{oid::ObjectId, Bson};

use common::{
    api::mail::notify,
    context::Context,
    entities::{department::Department, issue::Issue, letter::CreateLetter, user::User},
    error,
    services::{FRONTEND, PROTOCOL},
};

fn issue_link(issue: &Issue) -> String {
    format!("{}://{}/issues/{}", PROTOCOL.as_str(), FRONTEND.as_str(), issue.id)
}

async fn email_of_user(context: &Context, id: ObjectId) -> error::Result<Option<String>> {
    let users = context.try_get_repository::<User>()?;
    Ok(users
        .find("id", &Bson::ObjectId(id))
        .await?
        .map(|user| user.email))
}

async fn email_of_department(context: &Context, id: ObjectId) -> error::Result<Option<String>> {
    let departments = context.try_get_repository::<Department>()?;
    Ok(departments
        .find("id", &Bson::ObjectId(id))
        .await?
        .map(|department| department.email))
}

async fn send_to_user(context: &Context, user: ObjectId, subject: String, message: String) {
    match email_of_user(context, user).await {
        Ok(Some(email)) => {
            notify(
                context,
                CreateLetter {
                    email,
                    subject,
                    message,
                },
            )
            .await
        }
        Ok(None) => log::warn!("No user {} to notify", user),
        Err(err) => log::warn!("Failed to look up user {}: {}", user, err),
    }
}

pub async fn issue_received(context: &Context, issue: &Issue) {
    let message = format!(
        "Thank you for reporting \"{}\". Your issue has been registered with {} priority.\n\n{}",
        issue.title,
        issue.priority.as_str(),
        issue_link(issue),
    );
    send_to_user(
        context,
        issue.reporter,
        format!("Issue received: {}", issue.title),
        message,
    )
    .await;
}

pub async fn status_changed(context: &Context, issue: &Issue, comment: Option<&str>) {
    let mut message = format!(
        "The status of your issue \"{}\" is now {}.",
        issue.title,
        issue.status.as_str(),
    );
    if let Some(comment) = comment {
        message.push_str(&format!("\n\nComment: {}", comment));
    }
    message.push_str(&format!("\n\n{}", issue_link(issue)));

    send_to_user(
        context,
        issue.reporter,
        format!("Issue {}: {}", issue.status.as_str(), issue.title),
        message,
    )
    .await;
}

pub async fn department_assigned(context: &Context, issue: &Issue) {
    let Some(department) = issue.assigned_department else {
        return;
    };

    let email = match email_of_department(context, department).await {
        Ok(Some(email)) => email,
        Ok(None) => {
            log::warn!("No department {} to notify", department);
            return;
        }
        Err(err) => {
            log::warn!("Failed to look up department {}: {}", department, err);
            return;
        }
    };

    let message = format!(
        "A {} priority {} issue has been assigned to your department: \"{}\".\nDeadline: {}\n\n{}",
        issue.priority.as_str(),
        issue.category.as_str(),
        issue.title,
        format_deadline(issue.sla.deadline),
        issue_link(issue),
    );
    notify(
        context,
        CreateLetter {
            email,
            subject: format!("New issue assigned: {}", issue.title),
            message,
        },
    )
    .await;
}

pub async fn new_comment(context: &Context, issue: &Issue, author: ObjectId) {
    if author == issue.reporter {
        return;
    }
    send_to_user(
        context,
        issue.reporter,
        format!("New comment on: {}", issue.title),
        format!(
            "Your issue \"{}\" has a new comment.\n\n{}",
            issue.title,
            issue_link(issue)
        ),
    )
    .await;
}

fn format_deadline(deadline: i64) -> String {
    chrono::NaiveDateTime::from_timestamp_micros(deadline)
        .map(|time| time.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| deadline.to_string())
}
