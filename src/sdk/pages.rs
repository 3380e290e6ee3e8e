use futures::stream::{self, Stream};

use crate::{Page, ParameterStore, Result};

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazily walks a paginated prefix listing.
///
/// Each poll issues one `fetch_by_prefix` call, feeding back the previous
/// page's cursor. The stream ends after the first page without a cursor and
/// stops at the first error. To start over, call `pages` again.
pub fn pages<'a>(
    store: &'a dyn ParameterStore,
    path: &'a str,
    recursive: bool,
) -> impl Stream<Item = Result<Page>> + Send + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = store.fetch_by_prefix(path, recursive, token.as_deref()).await?;
        let next = match page.next_cursor.as_deref() {
            Some(token) if !token.is_empty() => Cursor::Next(token.to_string()),
            _ => Cursor::Done,
        };
        Ok(Some((page, next)))
    })
}
