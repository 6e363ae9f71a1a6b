//! Email bodies
//!
//! Plain string substitution only. Each template has a subject builder, a
//! plain-text fallback and an HTML variant with a `{{LINK}}` placeholder.

use super::Email;

const VERIFICATION_HTML: &str = r#"
<div style="max-width: 500px; margin: auto; font-family: Arial, sans-serif;">
  <h2>Welcome to Kampus</h2>
  <p>Please verify your email address to fully join the community.</p>
  <p><a href="{{LINK}}">Verify email</a></p>
  <p style="font-size: 12px; color: #6b7280;">
    If you did not create this account, you can safely ignore this email.
  </p>
</div>
"#;

const RESET_HTML: &str = r#"
<div style="max-width: 500px; margin: auto; font-family: Arial, sans-serif;">
  <h2>Reset your password</h2>
  <p>We received a request to reset your Kampus password. The link below is valid for 15 minutes.</p>
  <p><a href="{{LINK}}">Reset password</a></p>
  <p style="font-size: 12px; color: #6b7280;">
    If you did not request this, you can safely ignore this email.
  </p>
</div>
"#;

const OAUTH_DELETE_HTML: &str = r#"
<div style="max-width: 500px; margin: auto; font-family: Arial, sans-serif;">
  <h2>Confirm account deletion</h2>
  <p>You asked to delete your Kampus account. This cannot be undone. The link below is valid for 15 minutes.</p>
  <p><a href="{{LINK}}">Delete my account</a></p>
  <p style="font-size: 12px; color: #6b7280;">
    If this was not you, ignore this email and your account stays untouched.
  </p>
</div>
"#;

const WELCOME_HTML: &str = r#"
<div style="max-width: 500px; margin: auto; font-family: Arial, sans-serif;">
  <h2>Welcome to Kampus</h2>
  <p>Your account was created with Google sign-in. You are ready to go.</p>
  <p><a href="{{LINK}}">Open your dashboard</a></p>
</div>
"#;

pub fn verification_email(to: &str, name: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{name}, verify your Kampus email"),
        text: format!("Verify your Kampus email address: {link}"),
        html: Some(VERIFICATION_HTML.replace("{{LINK}}", link)),
    }
}

pub fn reset_email(to: &str, name: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{name}, reset your Kampus password"),
        text: format!("Reset your Kampus password (valid 15 minutes): {link}"),
        html: Some(RESET_HTML.replace("{{LINK}}", link)),
    }
}

pub fn oauth_delete_email(to: &str, name: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{name}, confirm your Kampus account deletion"),
        text: format!("Confirm deleting your Kampus account (valid 15 minutes): {link}"),
        html: Some(OAUTH_DELETE_HTML.replace("{{LINK}}", link)),
    }
}

pub fn welcome_email(to: &str, name: &str, dashboard_link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Welcome to Kampus, {name}!"),
        text: format!("Welcome to Kampus! Open your dashboard: {dashboard_link}"),
        html: Some(WELCOME_HTML.replace("{{LINK}}", dashboard_link)),
    }
}
