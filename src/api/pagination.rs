//! Incremental page loading over link-header and cursor-based responses.
//!
//! Both addressing modes reduce to the same contract: a fetch function takes
//! an optional [`PageToken`] and returns a [`Page`] whose `next` field, when
//! absent, marks the sequence complete. Pages are fetched strictly
//! sequentially, and item order within and across pages is the server's.

use futures::Stream;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::ApiError;
use super::request::{ApiRequest, ApiResponse};

/// Address of the next page in a paginated sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    /// Explicit next-page URL from a `Link` response header or embedded
    /// `next` field.
    Link(Url),
    /// Opaque server-issued cursor, typical of GraphQL connections.
    Cursor(String),
}

/// One page of items plus the address of the next page.
///
/// Absence of `next` means the sequence is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in server-returned order.
    pub items: Vec<T>,
    /// Token addressing the following page, when one exists.
    pub next: Option<PageToken>,
}

impl<T> Page<T> {
    /// A final page carrying the given items.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Loads every page, concatenating items in server order.
///
/// Issues exactly one fetch per page and stops when a page carries no next
/// token or the cancellation token fires between pages.
///
/// # Errors
///
/// Propagates the first fetch error; returns [`ApiError::Cancelled`] when
/// cancellation is observed before a fetch.
pub async fn load_all<T, F, Fut>(
    cancellation: &CancellationToken,
    start: Option<PageToken>,
    mut fetch: F,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(Option<PageToken>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut token = start;
    loop {
        if cancellation.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let page = fetch(token).await?;
        items.extend(page.items);
        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}

/// Returns the first item matching the predicate, fetching no page beyond
/// the one containing the match.
///
/// # Errors
///
/// Propagates the first fetch error; returns [`ApiError::Cancelled`] when
/// cancellation is observed before a fetch.
pub async fn find<T, F, Fut, P>(
    cancellation: &CancellationToken,
    start: Option<PageToken>,
    mut fetch: F,
    mut predicate: P,
) -> Result<Option<T>, ApiError>
where
    F: FnMut(Option<PageToken>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
    P: FnMut(&T) -> bool,
{
    let mut token = start;
    loop {
        if cancellation.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let page = fetch(token).await?;
        if let Some(found) = page.items.into_iter().find(|item| predicate(item)) {
            return Ok(Some(found));
        }
        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(None),
        }
    }
}

/// Lazy page-at-a-time sequence.
///
/// Each page is fetched only when the consumer polls for it, so a consumer
/// that stops early never issues requests for the remaining pages.
pub fn pages<T, F, Fut>(
    cancellation: CancellationToken,
    start: Option<PageToken>,
    mut fetch: F,
) -> impl Stream<Item = Result<Page<T>, ApiError>>
where
    F: FnMut(Option<PageToken>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    // Outer None marks the sequence finished; the inner option is the token
    // for the next fetch (None = first page).
    futures::stream::try_unfold(Some(start), move |state| {
        let pending = state.map(|token| (cancellation.is_cancelled(), fetch(token)));
        async move {
            match pending {
                None => Ok(None),
                Some((true, _)) => Err(ApiError::Cancelled),
                Some((false, fut)) => {
                    let page = fut.await?;
                    let next_state = page.next.clone().map(Some);
                    Ok(Some((page, next_state)))
                }
            }
        }
    })
}

/// Extracts the `rel="next"` target from a `Link` response header.
#[must_use]
pub fn next_link(headers: &HeaderMap) -> Option<Url> {
    let raw = headers.get(http::header::LINK)?.to_str().ok()?;
    parse_next_link(raw)
}

fn parse_next_link(value: &str) -> Option<Url> {
    value.split(',').find_map(|segment| {
        let (target, params) = segment.trim().split_once('>')?;
        let url = target.strip_prefix('<')?;
        let is_next = params
            .split(';')
            .map(str::trim)
            .any(|param| param == "rel=\"next\"" || param == "rel=next");
        if is_next { Url::parse(url).ok() } else { None }
    })
}

/// Builds a GET request whose extraction reads a JSON item array from the
/// body and the next-page URL from the `Link` header.
#[must_use]
pub fn linked_page_request<T>(url: Url) -> ApiRequest<Page<T>>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    ApiRequest::get_with(
        url,
        Box::new(|response: &ApiResponse| {
            let items: Vec<T> = response.json()?;
            let next = next_link(response.headers()).map(PageToken::Link);
            Ok(Page { items, next })
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::TryStreamExt;
    use http::{HeaderMap, HeaderValue};
    use tokio_util::sync::CancellationToken;
    use url::Url;

    use super::{Page, PageToken, find, load_all, next_link, pages};
    use crate::api::error::ApiError;

    fn three_pages(token: Option<PageToken>) -> Result<Page<u32>, ApiError> {
        match token {
            None => Ok(Page {
                items: vec![1, 2],
                next: Some(PageToken::Cursor("b".to_owned())),
            }),
            Some(PageToken::Cursor(cursor)) if cursor == "b" => Ok(Page {
                items: vec![3, 4],
                next: Some(PageToken::Cursor("c".to_owned())),
            }),
            Some(PageToken::Cursor(cursor)) if cursor == "c" => Ok(Page::last(vec![5])),
            other => Err(ApiError::RequestFailed {
                status: 400,
                message: format!("unexpected token: {other:?}"),
            }),
        }
    }

    #[tokio::test]
    async fn load_all_concatenates_pages_in_order() {
        let cancellation = CancellationToken::new();
        let calls = AtomicUsize::new(0);
        let items = load_all(&cancellation, None, |token| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(three_pages(token))
        })
        .await
        .expect("load_all should succeed");

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn load_all_stops_on_cancellation() {
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let error = load_all(&cancellation, None, |token| {
            std::future::ready(three_pages(token))
        })
        .await
        .expect_err("cancelled load should fail");
        assert_eq!(error, ApiError::Cancelled);
    }

    #[tokio::test]
    async fn find_does_not_fetch_beyond_the_match() {
        let cancellation = CancellationToken::new();
        let calls = AtomicUsize::new(0);
        let found = find(
            &cancellation,
            None,
            |token| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(three_pages(token))
            },
            |item| *item == 3,
        )
        .await
        .expect("find should succeed");

        assert_eq!(found, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn find_returns_none_after_the_last_page() {
        let cancellation = CancellationToken::new();
        let found = find(
            &cancellation,
            None,
            |token| std::future::ready(three_pages(token)),
            |item| *item == 42,
        )
        .await
        .expect("find should succeed");
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn pages_stream_is_lazy() {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&calls);
        let stream = pages(CancellationToken::new(), None, move |token| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(three_pages(token))
        });
        futures::pin_mut!(stream);

        let first = stream
            .try_next()
            .await
            .expect("first page should load")
            .expect("first page should exist");
        assert_eq!(first.items, vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pages_stream_terminates_after_the_last_page() {
        let stream = pages(CancellationToken::new(), None, |token| {
            std::future::ready(three_pages(token))
        });
        let collected: Vec<Page<u32>> = stream.try_collect().await.expect("stream should finish");
        assert_eq!(collected.len(), 3);
        assert_eq!(collected.last().map(|page| page.next.clone()), Some(None));
    }

    #[test]
    fn next_link_parses_the_rel_next_segment() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::LINK,
            HeaderValue::from_static(
                "<https://api.github.com/x?page=3>; rel=\"next\", \
                 <https://api.github.com/x?page=5>; rel=\"last\"",
            ),
        );
        let url = next_link(&headers).expect("next link should parse");
        assert_eq!(url.as_str(), "https://api.github.com/x?page=3");
    }

    #[test]
    fn next_link_is_absent_on_the_final_page() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"prev\""),
        );
        assert!(next_link(&headers).is_none());
        assert!(next_link(&HeaderMap::new()).is_none());
    }

    #[test]
    fn next_link_parses_url_with_link_token() {
        let start = Url::parse("https://api.github.com/x?page=2").expect("url");
        assert_eq!(PageToken::Link(start.clone()), PageToken::Link(start));
    }
}
