use std::time::Duration;

use async_trait::async_trait;
use picam_common::config::NotifyConfig;
use picam_controller::ports::{Notification, Notifier, NotifyError};
use tracing::debug;

/// Sends notifications through the Pushover messages API.
pub struct PushoverNotifier {
    client: reqwest::Client,
    api_url: String,
    user_key: String,
    api_token: String,
}

impl PushoverNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            user_key: config.user_key.clone(),
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let priority = notification.priority.to_string();
        let form = [
            ("token", self.api_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", notification.title.as_str()),
            ("message", notification.message.as_str()),
            ("priority", priority.as_str()),
        ];

        let response = self
            .client
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(title = notification.title, "Pushover accepted notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Form, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Local stand-in for the Pushover API answering with `status`.
    async fn fake_pushover(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route(
                "/1/messages.json",
                post(
                    move |State(received): State<Received>,
                          Form(fields): Form<HashMap<String, String>>| async move {
                        received.lock().unwrap().push(fields);
                        (status, "{}")
                    },
                ),
            )
            .with_state(Arc::clone(&received));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/1/messages.json"), received)
    }

    fn config(api_url: String) -> NotifyConfig {
        NotifyConfig {
            enabled: true,
            api_url,
            user_key: "user".into(),
            api_token: "token".into(),
            ..NotifyConfig::default()
        }
    }

    #[tokio::test]
    async fn posts_form_fields() {
        let (url, received) = fake_pushover(StatusCode::OK).await;
        let notifier = PushoverNotifier::new(&config(url)).unwrap();

        notifier
            .notify(&Notification::new("LED Status", "LED turned off (Off)."))
            .await
            .unwrap();

        let received = received.lock().unwrap();
        let fields = &received[0];
        assert_eq!(fields["token"], "token");
        assert_eq!(fields["user"], "user");
        assert_eq!(fields["title"], "LED Status");
        assert_eq!(fields["message"], "LED turned off (Off).");
        assert_eq!(fields["priority"], "0");
    }

    #[tokio::test]
    async fn rejected_request_is_status_error() {
        let (url, _) = fake_pushover(StatusCode::BAD_REQUEST).await;
        let notifier = PushoverNotifier::new(&config(url)).unwrap();
        let err = notifier
            .notify(&Notification::new("t", "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Status { status: 400, .. }));
    }
}
