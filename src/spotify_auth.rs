//! Session lifecycle against the streaming service: lazy token refresh
//! for the scheduled jobs, plus the one-time interactive authorization.

use std::collections::HashSet;
use std::io::stdin;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rspotify::clients::BaseClient;
use rspotify::prelude::OAuthClient;
use rspotify::{scopes, AuthCodeSpotify, ClientError, Credentials, OAuth, Token};
use url::Url;

use crate::config::SpotifyConfig;

/// Seconds an access token stays trusted before the next call refreshes it.
const TOKEN_TTL_SECS: i64 = 3600;

fn playlist_scopes() -> HashSet<String> {
    scopes!(
        "playlist-read-private",
        "playlist-modify-public",
        "playlist-modify-private"
    )
}

fn build_client(config: &SpotifyConfig) -> AuthCodeSpotify {
    let mut oauth = OAuth::default();
    oauth.scopes = playlist_scopes();
    oauth.redirect_uri = config.redirect_uri.clone();

    let creds = Credentials::new(&config.client_id, &config.client_secret);

    // Refreshing stays under the session's control; nothing is cached on disk.
    let client_config = rspotify::Config {
        token_cached: false,
        token_refreshing: false,
        ..Default::default()
    };

    AuthCodeSpotify::with_config(creds, oauth, client_config)
}

/// Authenticated catalog session for one scheduled invocation.
///
/// The long-lived refresh token comes from the environment; the access
/// token is minted lazily on first use and renewed once it is older
/// than an hour.
pub struct SpotifySession {
    client: AuthCodeSpotify,
    refresh_token: String,
    refreshed_at: Option<DateTime<Utc>>,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl SpotifySession {
    pub fn new(config: &SpotifyConfig, refresh_token: String) -> Self {
        Self::with_clock(config, refresh_token, Box::new(Utc::now))
    }

    pub fn with_clock(
        config: &SpotifyConfig,
        refresh_token: String,
        clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self {
            client: build_client(config),
            refresh_token,
            refreshed_at: None,
            clock,
        }
    }

    fn is_stale(&self) -> bool {
        match self.refreshed_at {
            None => true,
            Some(at) => ((self.clock)() - at).num_seconds() > TOKEN_TTL_SECS,
        }
    }

    /// Refreshes the access token if none has been minted for this
    /// session yet or the last one has outlived its hour.
    pub(crate) async fn ensure_fresh(&mut self) -> Result<(), ClientError> {
        if !self.is_stale() {
            return Ok(());
        }
        {
            let mut token = self.client.token.lock().await.unwrap();
            if token.is_none() {
                // Seed only the refresh token; the refresh call below
                // exchanges it for a usable access token.
                *token = Some(Token {
                    access_token: String::new(),
                    expires_in: chrono::Duration::seconds(0),
                    expires_at: None,
                    refresh_token: Some(self.refresh_token.clone()),
                    scopes: playlist_scopes(),
                });
            }
        }
        self.client.refresh_token().await?;
        self.refreshed_at = Some((self.clock)());
        tracing::debug!("access token refreshed");
        Ok(())
    }

    pub(crate) fn api(&self) -> &AuthCodeSpotify {
        &self.client
    }
}

/// One-time interactive authorization. Walks the browser consent flow
/// and prints the refresh token the scheduled jobs need in their
/// environment.
pub async fn login(config: &SpotifyConfig) -> anyhow::Result<()> {
    let spotify = build_client(config);

    let auth_url = spotify.get_authorize_url(true)?;
    if webbrowser::open(&auth_url).is_err() {
        println!("Failed to open the authorization URL. Please visit the URL manually: {auth_url}");
    }

    println!("Enter redirected url:");
    let mut url_input = String::new();
    stdin().read_line(&mut url_input)?;

    let url = Url::parse(url_input.trim()).context("the redirected url did not parse")?;
    let code = url
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .context("the redirected url carries no authorization code")?;

    spotify.request_token(code.trim()).await?;

    let token = spotify.token.lock().await.unwrap();
    match token.as_ref().and_then(|token| token.refresh_token.as_deref()) {
        Some(refresh_token) => {
            println!("Authorization complete. Add this to the environment:");
            println!("SPOTIFY_REFRESH_TOKEN={refresh_token}");
            Ok(())
        }
        None => anyhow::bail!("authorization succeeded but no refresh token was returned"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn config() -> SpotifyConfig {
        SpotifyConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
        }
    }

    #[test]
    fn token_goes_stale_an_hour_after_the_last_refresh() {
        let start = Utc::now();
        let now = Arc::new(Mutex::new(start));
        let clock_now = now.clone();
        let mut session = SpotifySession::with_clock(
            &config(),
            "refresh".to_string(),
            Box::new(move || *clock_now.lock().unwrap()),
        );

        // Never refreshed: the first call must mint a token.
        assert!(session.is_stale());

        session.refreshed_at = Some(start);
        assert!(!session.is_stale());

        *now.lock().unwrap() = start + chrono::Duration::seconds(TOKEN_TTL_SECS);
        assert!(!session.is_stale());

        *now.lock().unwrap() = start + chrono::Duration::seconds(TOKEN_TTL_SECS + 1);
        assert!(session.is_stale());
    }
}
