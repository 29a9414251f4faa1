use std::future::{self, Future};
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tracing::debug;

use super::data::{DataStream, Plain, Variant, module_dir};
use super::error::StreamError;
use crate::channel::{Core, Reader};

/// Variant of streams carrying text chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Text;

impl Variant for Text {
    fn origin(&self) -> &Path {
        module_dir(file!())
    }
}

/// Stream of strings with text-specific operators
pub type StringStream = DataStream<String, Text>;

impl DataStream<String, Text> {
    /// Re-chunk the text on `separator`
    ///
    /// Chunks are concatenated before splitting, so a separator spanning two
    /// chunks is still found. Trailing text after the last separator is
    /// emitted at the end if non-empty. An empty separator leaves the chunks
    /// as they are.
    pub fn split(self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        let out = self.derive::<String>();

        match self.core.claim_reader() {
            Ok(reader) => {
                tokio::spawn(split_chunks(reader, out.core.clone(), separator));
            }
            Err(err) => out.core.fail(err),
        }
        out
    }

    pub fn append(self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.map(move |chunk| future::ready(Ok(chunk + &suffix)))
    }

    pub fn prepend(self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.map(move |chunk| future::ready(Ok(format!("{prefix}{chunk}"))))
    }

    /// Turn every chunk into a value, leaving the text variant
    pub fn parse<U, F, Fut>(self, f: F) -> DataStream<U>
    where
        U: Send + 'static,
        F: Fn(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, StreamError>> + Send + 'static,
    {
        self.map(f).into_variant(Plain)
    }
}

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    /// Render every item as text
    pub fn stringify<F>(self, f: F) -> StringStream
    where
        F: Fn(T) -> String + Send + 'static,
    {
        self.map(move |item| future::ready(Ok(f(item))))
            .into_variant(Text)
    }
}

async fn split_chunks(mut reader: Reader<String>, out: Arc<Core<String>>, separator: String) {
    let mut rest = String::new();
    let mut pieces: u64 = 0;

    while let Some(next) = reader.next().await {
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(err) => {
                if out.raise(err).await.is_ok() {
                    out.end();
                }
                return;
            }
        };

        if separator.is_empty() {
            if out.send(chunk).await.is_err() {
                return;
            }
            continue;
        }

        rest.push_str(&chunk);
        while let Some(at) = rest.find(&separator) {
            let piece = rest[..at].to_string();
            rest.replace_range(..at + separator.len(), "");
            if out.send(piece).await.is_err() {
                return;
            }
            pieces += 1;
        }
    }

    if !rest.is_empty() && out.send(rest).await.is_err() {
        return;
    }
    debug!(output = out.id(), pieces, "Split finished");
    out.end();
}
