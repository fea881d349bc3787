use clap::{Args, Parser, Subcommand};
use slackevent_responder::{
    SignatureVerifier, SigningSecret,
    app::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
};

use crate::config;

#[derive(Args, Debug, Clone)]
pub struct SignArgs {
    /// Raw JSON body to sign
    #[arg(short, long)]
    body: String,

    /// Unix timestamp to sign with, defaults to now
    #[arg(short, long)]
    timestamp: Option<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Receiver endpoint, e.g. http://localhost:8000/slack/events
    #[arg(short, long)]
    url: String,

    /// Raw JSON body to send
    #[arg(short, long)]
    body: String,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Action {
    /// Print the Slack headers for a body
    Sign(SignArgs),
    /// Sign a body and POST it to a running receiver
    Send(SendArgs),
}

/// Developer tools for the Slack events receiver
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct AppArgs {
    #[command(subcommand)]
    pub action: Action,
}

impl AppArgs {
    pub async fn run(&self) -> anyhow::Result<()> {
        let verifier = SignatureVerifier::new(SigningSecret::new(
            config::load()?.slack_signing_secret,
        ));

        match &self.action {
            Action::Sign(SignArgs { body, timestamp }) => {
                let (timestamp, signature) = sign(&verifier, body, *timestamp);

                println!("{TIMESTAMP_HEADER}: {timestamp}");
                println!("{SIGNATURE_HEADER}: {signature}");
                Ok(())
            }
            Action::Send(SendArgs { url, body }) => {
                let (timestamp, signature) = sign(&verifier, body, None);

                let response = reqwest::Client::new()
                    .post(url)
                    .header(TIMESTAMP_HEADER, timestamp)
                    .header(SIGNATURE_HEADER, signature)
                    .header("Content-Type", "application/json")
                    .body(body.clone())
                    .send()
                    .await?;

                println!("{}", response.status());
                println!("{}", response.text().await?);
                Ok(())
            }
        }
    }
}

fn sign(verifier: &SignatureVerifier, body: &str, timestamp: Option<i64>) -> (String, String) {
    let timestamp = timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp())
        .to_string();
    let signature = verifier.sign(&timestamp, body);

    (timestamp, signature)
}
