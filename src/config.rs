use std::time::Duration;

use clap::Parser;

/// Homepage backend
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Discord user whose presence is shown on the page
    #[arg(long, env = "DISCORD_ID", default_value = "121672207800860677")]
    pub discord_id: String,

    /// Base URL of the Lanyard API
    #[arg(long, env = "LANYARD_URL", default_value = "https://api.lanyard.rest")]
    pub lanyard_url: String,

    /// Webhook that receives contact form submissions
    #[arg(
        long,
        env = "DISCORD_WEBHOOK",
        default_value = "https://discord.com/api/webhooks/unset"
    )]
    pub discord_webhook: String,

    /// Turnstile secret, defaults to Cloudflare's always-pass test key
    #[arg(
        long,
        env = "TURNSTILE_SECRET_KEY",
        default_value = "1x0000000000000000000000000000000AA",
        hide_env_values = true
    )]
    pub turnstile_secret_key: String,

    /// Public key for the Turnstile widget on the page
    #[arg(
        long,
        env = "TURNSTILE_SITE_KEY",
        default_value = "1x00000000000000000000AA"
    )]
    pub turnstile_site_key: String,

    #[arg(
        long,
        env = "TURNSTILE_URL",
        default_value = "https://challenges.cloudflare.com/turnstile/v0/siteverify"
    )]
    pub turnstile_url: String,

    /// Shown when the presence data carries no location
    #[arg(long, env = "DEFAULT_LOCATION", default_value = "Canterbury, UK")]
    pub default_location: String,

    /// Timeout for every outbound request, in seconds
    #[arg(long, default_value_t = 5)]
    pub upstream_timeout_sec: u64,
}

impl Args {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_sec)
    }
}
