//! Email bodies

use super::EmailMessage;

fn layout(title: &str, body: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body style="margin: 0; padding: 32px 16px; font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f6f6f4; color: #1a1a1a;">
    <table role="presentation" style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 12px; border: 1px solid #e5e5e5;">
        <tr>
            <td style="padding: 32px;">
                <div style="font-size: 22px; font-weight: 700; margin-bottom: 24px;">Vendly</div>
                {body}
            </td>
        </tr>
    </table>
</body>
</html>"##
    )
}

fn button(href: &str, label: &str) -> String {
    format!(
        r#"<a href="{href}" style="display: inline-block; background: #111111; color: #ffffff; padding: 12px 24px; border-radius: 8px; text-decoration: none; font-weight: 600;">{label}</a>"#
    )
}

/// Minimal escaping for user-supplied text placed in HTML
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Link sent to an admin after sign-up
pub fn verification(to: &str, name: &str, verify_url: &str) -> EmailMessage {
    let body = format!(
        r#"<p>Hi {name},</p>
<p>Confirm your email address to activate your Vendly admin account.</p>
<p>{button}</p>
<p style="color: #737373; font-size: 13px;">If you did not create this account you can ignore this email.</p>"#,
        name = escape(name),
        button = button(verify_url, "Verify email"),
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Verify your Vendly account".to_string(),
        html: layout("Verify your Vendly account", &body),
        template: "verification",
    }
}

/// Magic link for a seller whose store was set up by an admin
pub fn magic_link(to: &str, full_name: &str, store_name: &str, link: &str, ttl_hours: i64) -> EmailMessage {
    let body = format!(
        r#"<p>Hi {name},</p>
<p>Your store <strong>{store}</strong> has been created on Vendly. Sign in to finish setting it up.</p>
<p>{button}</p>
<p style="color: #737373; font-size: 13px;">This link expires in {ttl} hours.</p>"#,
        name = escape(full_name),
        store = escape(store_name),
        button = button(link, "Open my store"),
        ttl = ttl_hours,
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("{} is ready on Vendly", store_name),
        html: layout("Your Vendly store", &body),
        template: "magic_link",
    }
}

/// Sent once self-service onboarding completes
pub fn welcome(to: &str, full_name: &str, store_name: &str, store_url: &str) -> EmailMessage {
    let body = format!(
        r#"<p>Hi {name},</p>
<p>Welcome to Vendly! <strong>{store}</strong> is live.</p>
<p>{button}</p>
<p>Connect Instagram or TikTok from your dashboard to import your profile.</p>"#,
        name = escape(full_name),
        store = escape(store_name),
        button = button(store_url, "Visit your store"),
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Welcome to Vendly, {}", full_name),
        html: layout("Welcome to Vendly", &body),
        template: "welcome",
    }
}
