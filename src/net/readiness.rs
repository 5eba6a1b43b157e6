//! Readiness waiting
//!
//! Polls a set of URLs until every one of them answers with any HTTP response.
//! The status code is not inspected: getting a response at all is what
//! proves the listener is accepting requests.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use reqwest::{Client, Url};

use crate::common::{Error, Result};

/// Delay between attempts against a probe that is not answering yet
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Wait until every URL responds, or fail with `Error::Timeout`
pub async fn await_ready(urls: &[String], timeout: Duration) -> Result<()> {
    await_ready_until(urls, timeout, std::future::pending::<()>()).await
}

/// Wait until every URL responds, the deadline passes, or `cancel` resolves
///
/// Pending probes are dropped as soon as the deadline or cancellation fires.
/// An invalid URL is a transport error, reported before any polling starts.
pub async fn await_ready_until<F>(urls: &[String], timeout: Duration, cancel: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let targets = urls
        .iter()
        .map(|u| Url::parse(u).map_err(|e| Error::Transport(format!("invalid probe URL '{}': {}", u, e))))
        .collect::<Result<Vec<_>>>()?;

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::Transport(e.to_string()))?;

    let mut pending: BTreeSet<String> = targets.iter().map(|u| u.to_string()).collect();
    let mut probes: FuturesUnordered<_> = targets
        .into_iter()
        .map(|url| probe(&client, url))
        .collect();

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    tokio::pin!(cancel);

    loop {
        tokio::select! {
            done = probes.next() => match done {
                Some(url) => {
                    tracing::debug!(%url, "Probe answered");
                    pending.remove(url.as_str());
                }
                None => return Ok(()),
            },
            _ = &mut deadline => {
                return Err(Error::Timeout {
                    after: timeout,
                    pending: pending.into_iter().collect::<Vec<_>>().join(", "),
                });
            }
            _ = &mut cancel => return Err(Error::Cancelled),
        }
    }
}

/// Poll one URL until it answers; resolves to the URL it was polling
async fn probe(client: &Client, url: Url) -> Url {
    loop {
        match client.get(url.clone()).send().await {
            Ok(_) => return url,
            Err(e) => {
                tracing::trace!(%url, error = %e, "Probe not ready");
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }
}
