use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::BiolinksError;

pub trait TextFetcher: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, BiolinksError>;
}

#[derive(Clone)]
pub struct HttpTextFetcher {
    client: Client,
}

impl HttpTextFetcher {
    pub fn new() -> Result<Self, BiolinksError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("biolinks/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| BiolinksError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| BiolinksError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl TextFetcher for HttpTextFetcher {
    fn get_text(&self, url: &str) -> Result<String, BiolinksError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| BiolinksError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        if (200..=299).contains(&status) {
            return response
                .text()
                .map_err(|err| BiolinksError::Http(err.to_string()));
        }
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        if (400..=499).contains(&status) {
            return Err(BiolinksError::ClientRequest { status, message });
        }
        if (500..=599).contains(&status) {
            return Err(BiolinksError::ServerRequest { status, message });
        }
        Err(BiolinksError::UnknownRequest { status, message })
    }
}

pub fn fetch_batched(
    fetcher: &dyn TextFetcher,
    base: &str,
    ids: &[String],
    separator: &str,
    max_url_len: usize,
) -> Result<String, BiolinksError> {
    let mut body = String::new();
    let mut start = 0;

    while start < ids.len() {
        let mut end = ids.len();
        loop {
            let joined = ids[start..end].join(separator);
            if base.len() + joined.len() < max_url_len {
                debug!(
                    "fetching ids {}..{} of {} from {base}",
                    start + 1,
                    end,
                    ids.len()
                );
                body.push_str(&fetcher.get_text(&format!("{base}{joined}"))?);
                start = end;
                break;
            }
            end -= 1;
            if end == start {
                return Err(BiolinksError::UrlBudget {
                    id: ids[start].clone(),
                    limit: max_url_len,
                });
            }
        }
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Mutex;

    struct RecordingFetcher {
        urls: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    impl RecordingFetcher {
        fn new() -> Self {
            Self {
                urls: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                urls: Mutex::new(Vec::new()),
                fail_on: Some(call),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl TextFetcher for RecordingFetcher {
        fn get_text(&self, url: &str) -> Result<String, BiolinksError> {
            let mut urls = self.urls.lock().unwrap();
            urls.push(url.to_string());
            if self.fail_on == Some(urls.len()) {
                return Err(BiolinksError::ServerRequest {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let args = url.rsplit('/').next().unwrap_or("");
            Ok(args
                .split('+')
                .map(|id| format!("{id};"))
                .collect::<String>())
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn packs_largest_window_under_budget() {
        let fetcher = RecordingFetcher::new();
        let list = ids(&["aa", "bb", "cc"]);

        let body = fetch_batched(&fetcher, "http://x/", &list, "+", 17).unwrap();

        assert_eq!(fetcher.calls(), vec!["http://x/aa+bb", "http://x/cc"]);
        assert_eq!(body, "aa;bb;cc;");
    }

    #[test]
    fn rendered_urls_stay_strictly_under_budget() {
        let fetcher = RecordingFetcher::new();
        let list = ids(&["aaaa", "bb", "c", "dd", "eee"]);
        let budget = 20;

        fetch_batched(&fetcher, "http://x/", &list, "+", budget).unwrap();

        for url in fetcher.calls() {
            assert!(url.len() < budget, "{url} is over budget");
        }
    }

    #[test]
    fn body_matches_per_id_fetch_order() {
        let list = ids(&["aa", "bb", "cc", "dd"]);

        let batched = RecordingFetcher::new();
        let batched_body = fetch_batched(&batched, "http://x/", &list, "+", 16).unwrap();
        assert!(batched.calls().len() < list.len());

        let single = RecordingFetcher::new();
        let mut singles_body = String::new();
        for id in &list {
            singles_body.push_str(&single.get_text(&format!("http://x/{id}")).unwrap());
        }

        assert_eq!(batched_body, singles_body);
    }

    #[test]
    fn oversize_single_id_is_rejected() {
        let fetcher = RecordingFetcher::new();
        let list = ids(&["this-id-alone-busts-the-budget"]);

        let result = fetch_batched(&fetcher, "http://x/", &list, "+", 20);

        assert_matches!(result, Err(BiolinksError::UrlBudget { limit: 20, .. }));
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn batch_failure_aborts_whole_fetch() {
        let fetcher = RecordingFetcher::failing_on(2);
        let list = ids(&["aa", "bb", "cc"]);

        let result = fetch_batched(&fetcher, "http://x/", &list, "+", 14);

        assert_matches!(result, Err(BiolinksError::ServerRequest { status: 500, .. }));
    }

    #[test]
    fn empty_id_list_issues_no_requests() {
        let fetcher = RecordingFetcher::new();
        let body = fetch_batched(&fetcher, "http://x/", &[], "+", 100).unwrap();
        assert!(body.is_empty());
        assert!(fetcher.calls().is_empty());
    }
}
