//! Interactive consent exchange over an operator-facing prompt
//!
//! Prints the consent URL, blocks for one line containing the authorization
//! code, then exchanges it at the token endpoint. Reader and writer are
//! generic so the flow can run against stdin/stderr or in-memory buffers.
//! Process prompts go to stderr; stdout carries the JSON log stream.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin};
use tokio::sync::Mutex;
use tracing::info;

use crate::account::CredentialConfig;
use crate::authorizer::ConsentFlow;
use crate::error::{Error, Result};
use crate::pkce::{build_consent_url, compute_challenge, generate_state, generate_verifier};
use crate::token::{Token, exchange_code};

/// Consent flow reading codes from `R` and writing prompts to `W`.
pub struct PromptConsent<R, W> {
    http_client: reqwest::Client,
    io: Mutex<(R, W)>,
}

/// Consent flow reading from the process's stdin and prompting on stderr.
pub type StdioConsent = PromptConsent<BufReader<Stdin>, Stderr>;

impl StdioConsent {
    pub fn stdio(http_client: reqwest::Client) -> Self {
        Self::new(
            http_client,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stderr(),
        )
    }
}

impl<R, W> PromptConsent<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(http_client: reqwest::Client, reader: R, writer: W) -> Self {
        Self {
            http_client,
            io: Mutex::new((reader, writer)),
        }
    }

    /// Recover the reader and writer.
    pub fn into_parts(self) -> (R, W) {
        self.io.into_inner()
    }

    /// Show the consent URL and read one authorization code.
    async fn prompt_for_code(&self, config: &CredentialConfig, url: &str) -> Result<String> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;

        let prompt = format!(
            "Authorize account '{}' by visiting:\n{url}\nPaste the authorization code: ",
            config.account_id
        );
        writer
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| Error::ConsentInput(format!("writing prompt: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::ConsentInput(format!("writing prompt: {e}")))?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::ConsentInput(e.to_string()))?;
        let code = line.trim();
        if read == 0 || code.is_empty() {
            return Err(Error::ConsentInput("no authorization code entered".into()));
        }
        Ok(code.to_string())
    }
}

impl<R, W> ConsentFlow for PromptConsent<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn authorize<'a>(
        &'a self,
        config: &'a CredentialConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Token>> + Send + 'a>> {
        Box::pin(async move {
            let verifier = generate_verifier();
            let challenge = compute_challenge(&verifier);
            let url = build_consent_url(config, &generate_state(), &challenge)?;

            let code = self.prompt_for_code(config, &url).await?;
            let token = exchange_code(&self.http_client, config, &code, &verifier).await?;
            info!(account_id = %config.account_id, "consent exchange completed");
            Ok(token)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::{start_token_server, test_config};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn reads_code_and_exchanges_it() {
        let (url, recorded) = start_token_server(
            StatusCode::OK,
            r#"{"access_token":"at_new","refresh_token":"rt_new","expires_in":3600}"#,
        )
        .await;
        let config = test_config(&url);
        let consent =
            PromptConsent::new(reqwest::Client::new(), &b"4/0Acode\n"[..], Vec::<u8>::new());

        let token = consent.authorize(&config).await.unwrap();
        assert_eq!(token.access_token, "at_new");
        assert_eq!(token.refresh_token, "rt_new");

        let code_sent = recorded.lock().unwrap()[0]["code"].clone();
        assert_eq!(code_sent, "4/0Acode");

        let (_, written) = consent.into_parts();
        let output = String::from_utf8(written).unwrap();
        assert!(output.contains("Authorize account 'acct-1'"));
        assert!(output.contains("https://accounts.google.com/o/oauth2/auth?"));
        assert!(output.contains("code_challenge_method=S256"));
    }

    #[tokio::test]
    async fn stdio_consent_prompts_on_stderr() {
        let (_stdin, _prompt): (BufReader<Stdin>, Stderr) =
            StdioConsent::stdio(reqwest::Client::new()).into_parts();
    }

    #[tokio::test]
    async fn closed_input_is_a_consent_error() {
        let config = test_config("http://127.0.0.1:9/token");
        let consent = PromptConsent::new(reqwest::Client::new(), &b""[..], Vec::<u8>::new());
        let result = consent.authorize(&config).await;
        assert!(matches!(result, Err(Error::ConsentInput(_))), "got: {result:?}");
    }

    #[tokio::test]
    async fn blank_line_is_a_consent_error() {
        let config = test_config("http://127.0.0.1:9/token");
        let consent = PromptConsent::new(reqwest::Client::new(), &b"   \n"[..], Vec::<u8>::new());
        let result = consent.authorize(&config).await;
        assert!(matches!(result, Err(Error::ConsentInput(_))));
    }

    #[tokio::test]
    async fn answers_multiple_prompts_in_order() {
        let (url, recorded) = start_token_server(
            StatusCode::OK,
            r#"{"access_token":"at","refresh_token":"rt","expires_in":3600}"#,
        )
        .await;
        let config = test_config(&url);
        let consent =
            PromptConsent::new(reqwest::Client::new(), &b"code-1\ncode-2\n"[..], Vec::<u8>::new());

        consent.authorize(&config).await.unwrap();
        consent.authorize(&config).await.unwrap();

        let forms = recorded.lock().unwrap();
        assert_eq!(forms[0]["code"], "code-1");
        assert_eq!(forms[1]["code"], "code-2");
    }
}
